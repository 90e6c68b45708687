//! Converts the raw result table into the requested output format.

use super::annotation::{build_document, DocumentInfo};
use super::error::ConversionError;
use super::jobs::OutputFormat;
use super::records::{parse_table, OutputRecord};
use super::xml::Document;
use chrono::{DateTime, Local};
use serde_json::{json, Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct OutputTranscoder {
    template: Document,
    author: String,
}

impl OutputTranscoder {
    pub fn new(template: Document, author: impl Into<String>) -> Self {
        Self {
            template,
            author: author.into(),
        }
    }

    /// Reads and parses the annotation template once.
    pub async fn load(template_path: &Path, author: &str) -> Result<Self, ConversionError> {
        let text = fs::read_to_string(template_path).await.map_err(|e| {
            ConversionError::Template(format!("{}: {}", template_path.display(), e))
        })?;
        Ok(Self::new(Document::parse(&text)?, author))
    }

    /// Writes `raw_table` out as `format` next to it and returns the written path.
    /// The raw table is removed once the new document is on disk.
    pub async fn transcode(
        &self,
        raw_table: &Path,
        format: OutputFormat,
        source: &Path,
    ) -> Result<PathBuf, ConversionError> {
        if format == OutputFormat::Table {
            return if fs::try_exists(raw_table).await? {
                Ok(raw_table.to_path_buf())
            } else {
                Err(ConversionError::MissingTable(raw_table.to_path_buf()))
            };
        }

        let text = match fs::read_to_string(raw_table).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConversionError::MissingTable(raw_table.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let records = parse_table(&text)?;

        let written = if format == OutputFormat::Json {
            let path = raw_table.with_extension("json");
            let body = serde_json::to_string_pretty(&render_json(&records))?;
            fs::write(&path, body).await?;
            path
        } else {
            let info = DocumentInfo::new(&self.author, source);
            let doc = build_document(&self.template, &records, &info)?;
            let dir = raw_table.parent().unwrap_or_else(|| Path::new("."));
            let path = annotation_path(dir, &stem(source), Local::now()).await?;
            fs::write(&path, doc.to_xml()).await?;
            path
        };

        fs::remove_file(raw_table).await?;
        tracing::debug!(raw = %raw_table.display(), output = %written.display(), "raw table converted");
        Ok(written)
    }
}

/// One object per record identifier, in row order. Values keep their raw text.
pub fn render_json(records: &[OutputRecord]) -> Value {
    let mut object = Map::new();
    for record in records {
        object.insert(
            record.id.clone(),
            json!({
                "TIER": record.tier,
                "START_TIME": record.start,
                "END_TIME": record.end,
                "TYPE": record.kind,
            }),
        );
    }
    Value::Object(object)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("output"))
}

/// `<stem>_<YYYYMMDDTHHMMSS>.eaf`, with `_<n>` appended if that name is taken.
pub async fn annotation_path(
    dir: &Path,
    stem: &str,
    now: DateTime<Local>,
) -> Result<PathBuf, ConversionError> {
    let base = format!("{}_{}", stem, now.format("%Y%m%dT%H%M%S"));
    let mut candidate = dir.join(format!("{}.eaf", base));
    let mut n = 2;
    while fs::try_exists(&candidate).await? {
        candidate = dir.join(format!("{}_{}.eaf", base, n));
        n += 1;
    }
    Ok(candidate)
}
