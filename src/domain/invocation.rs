//! Command lines for the external analysis and plotting programs.

use super::jobs::{JobRecord, OutputFormat};
use std::fmt;
use std::path::Path;

/// A program and its positional arguments, passed without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

fn bracketed(ids: &[u32]) -> String {
    let joined: Vec<String> = ids.iter().map(u32::to_string).collect();
    format!("[{}]", joined.join(","))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl Invocation {
    /// `<script> <threshold> <min> <gap> <input> <scratch> <output> .csv -kpl [..] -kpr [..] -kpb [..]`
    ///
    /// The table is always requested; other formats are derived from it afterwards.
    pub fn analysis(interpreter: &str, script: &Path, record: &JobRecord) -> Self {
        let config = &record.config;
        let args = vec![
            path_arg(script),
            config.threshold.to_string(),
            config.min_cutoff.to_string(),
            config.gap_cutoff.to_string(),
            path_arg(&record.file),
            path_arg(record.scratch_dir()),
            path_arg(&record.output_dir),
            OutputFormat::Table.extension().to_string(),
            "-kpl".to_string(),
            bracketed(&config.keypoints.left),
            "-kpr".to_string(),
            bracketed(&config.keypoints.right),
            "-kpb".to_string(),
            bracketed(&config.keypoints.body),
        ];
        Self {
            program: interpreter.to_string(),
            args,
        }
    }

    /// `<plotter> <plot-dir> <scratch>`
    pub fn plot(interpreter: &str, plotter: &Path, plot_dir: &Path, scratch: &Path) -> Self {
        Self {
            program: interpreter.to_string(),
            args: vec![path_arg(plotter), path_arg(plot_dir), path_arg(scratch)],
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(|c: char| matches!(c, ' ' | '/' | '[')) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::{JobConfig, Keypoints};
    use std::path::PathBuf;

    fn record(scratch: tempfile::TempDir) -> JobRecord {
        let config = JobConfig {
            threshold: 0.3,
            min_cutoff: 4,
            gap_cutoff: 2,
            keypoints: Keypoints {
                left: vec![4, 8],
                right: vec![],
                body: vec![0],
            },
            format: OutputFormat::Annotation,
        };
        JobRecord::new(
            PathBuf::from("/videos/clip.mp4"),
            config,
            PathBuf::from("/out"),
            scratch,
        )
    }

    #[test]
    fn test_analysis_arguments() {
        let record = record(tempfile::tempdir().unwrap());
        let scratch = record.scratch_dir().to_string_lossy().into_owned();
        let invocation = Invocation::analysis("python", Path::new("spudnig.py"), &record);

        assert_eq!(invocation.program, "python");
        assert_eq!(
            invocation.args,
            vec![
                "spudnig.py",
                "0.3",
                "4",
                "2",
                "/videos/clip.mp4",
                scratch.as_str(),
                "/out",
                ".csv",
                "-kpl",
                "[4,8]",
                "-kpr",
                "[]",
                "-kpb",
                "[0]",
            ]
        );
    }

    #[test]
    fn test_display_quotes_paths_and_lists() {
        let record = record(tempfile::tempdir().unwrap());
        let rendered = Invocation::analysis("python", Path::new("spudnig.py"), &record).to_string();
        assert!(rendered.starts_with("python spudnig.py 0.3 4 2 \"/videos/clip.mp4\""));
        assert!(rendered.ends_with("\"/out\" .csv -kpl \"[4,8]\" -kpr \"[]\" -kpb \"[0]\""));
    }
}
