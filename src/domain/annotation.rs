//! Builds annotation interchange documents (ELAN `.eaf`) from detected movements.

use super::error::ConversionError;
use super::records::{time_slots, OutputRecord};
use super::xml::{Document, Element, Node};
use std::path::Path;

/// Tier the movement annotations are inserted into.
pub const MOVEMENT_TIER: &str = "Movements";

/// Values substituted into the template's header placeholders.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub author: String,
    pub date: String,
    pub media_url: String,
}

impl DocumentInfo {
    pub fn new(author: &str, media: &Path) -> Self {
        Self {
            author: author.to_string(),
            date: chrono::Local::now().to_rfc3339(),
            media_url: file_uri(media),
        }
    }
}

/// `file:///` form of a local path, with forward slashes.
pub fn file_uri(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    format!("file:///{}", path.trim_start_matches('/'))
}

fn named<'a>(name: &'a str) -> impl Fn(&Element) -> bool + 'a {
    move |el: &Element| el.name == name
}

/// Fills a parsed template with one time slot pair and one annotation per record.
pub fn build_document(
    template: &Document,
    records: &[OutputRecord],
    info: &DocumentInfo,
) -> Result<Document, ConversionError> {
    let pairs = time_slots(records)?;
    let mut doc = template.clone();

    if doc.root.name != "ANNOTATION_DOCUMENT" {
        return Err(ConversionError::TemplateMarker("ANNOTATION_DOCUMENT"));
    }
    doc.root.set_attr("AUTHOR", info.author.as_str());
    doc.root.set_attr("DATE", info.date.as_str());

    doc.root
        .find_mut(&named("MEDIA_DESCRIPTOR"))
        .ok_or(ConversionError::TemplateMarker("MEDIA_DESCRIPTOR"))?
        .set_attr("MEDIA_URL", info.media_url.as_str());

    if let Some(property) = doc.root.find_mut(&|el: &Element| {
        el.name == "PROPERTY" && el.attr("NAME") == Some("lastUsedAnnotationId")
    }) {
        property.children = vec![Node::Text(records.len().to_string())];
    }

    let slots = pairs
        .iter()
        .flat_map(|pair| [pair.start, pair.end])
        .map(|slot| {
            Node::Element(
                Element::new("TIME_SLOT")
                    .with_attr("TIME_SLOT_ID", slot.slot_ref())
                    .with_attr("TIME_VALUE", slot.millis.to_string()),
            )
        })
        .collect();
    doc.root
        .find_mut(&named("TIME_ORDER"))
        .ok_or(ConversionError::TemplateMarker("TIME_ORDER"))?
        .prepend_children(slots);

    let annotations = records
        .iter()
        .zip(&pairs)
        .enumerate()
        .map(|(index, (record, pair))| {
            let alignable = Element::new("ALIGNABLE_ANNOTATION")
                .with_attr("ANNOTATION_ID", format!("a{}", index + 1))
                .with_attr("TIME_SLOT_REF1", pair.start.slot_ref())
                .with_attr("TIME_SLOT_REF2", pair.end.slot_ref())
                .with_child(Node::Element(
                    Element::new("ANNOTATION_VALUE").with_child(Node::Text(record.kind.clone())),
                ));
            Node::Element(Element::new("ANNOTATION").with_child(Node::Element(alignable)))
        })
        .collect();
    doc.root
        .find_mut(&|el: &Element| el.name == "TIER" && el.attr("TIER_ID") == Some(MOVEMENT_TIER))
        .ok_or(ConversionError::TemplateMarker("TIER_ID=\"Movements\""))?
        .prepend_children(annotations);

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::parse_table;
    use std::collections::HashSet;

    const TEMPLATE: &str = include_str!("../../templates/BlankTemplate.eaf");

    fn info() -> DocumentInfo {
        DocumentInfo {
            author: "Me".to_string(),
            date: "2024-05-01T10:00:00+00:00".to_string(),
            media_url: file_uri(Path::new("/videos/clip.mp4")),
        }
    }

    fn table(rows: usize) -> Vec<OutputRecord> {
        let text: String = (0..rows)
            .map(|i| format!("{i},Movements,0:00:{:02}.500,0:00:{:02}.250,movement\n", i, i + 1))
            .collect();
        parse_table(&text).unwrap()
    }

    #[test]
    fn test_file_uri() {
        assert_eq!(file_uri(Path::new("/videos/clip.mp4")), "file:///videos/clip.mp4");
        assert_eq!(file_uri(Path::new("C:\\videos\\clip.mp4")), "file:///C:/videos/clip.mp4");
    }

    #[test]
    fn test_header_placeholders() {
        let template = Document::parse(TEMPLATE).unwrap();
        let doc = build_document(&template, &table(1), &info()).unwrap();

        assert_eq!(doc.root.attr("AUTHOR"), Some("Me"));
        assert_eq!(doc.root.attr("DATE"), Some("2024-05-01T10:00:00+00:00"));
        let media = doc.root.find(&named("MEDIA_DESCRIPTOR")).unwrap();
        assert_eq!(media.attr("MEDIA_URL"), Some("file:///videos/clip.mp4"));
    }

    #[test]
    fn test_slots_and_annotations_for_n_rows() {
        let template = Document::parse(TEMPLATE).unwrap();
        for n in [0usize, 1, 4, 12] {
            let doc = build_document(&template, &table(n), &info()).unwrap();

            let order = doc.root.find(&named("TIME_ORDER")).unwrap();
            let ids: Vec<String> = order
                .elements("TIME_SLOT")
                .map(|slot| slot.attr("TIME_SLOT_ID").unwrap().to_string())
                .collect();
            let expected: Vec<String> = (1..=2 * n).map(|i| format!("ts{i}")).collect();
            assert_eq!(ids, expected);

            let known: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let tier = doc
                .root
                .find(&|el: &Element| el.attr("TIER_ID") == Some(MOVEMENT_TIER))
                .unwrap();
            let blocks: Vec<&Element> = tier.elements("ANNOTATION").collect();
            assert_eq!(blocks.len(), n);
            for (index, block) in blocks.iter().enumerate() {
                let alignable = block.elements("ALIGNABLE_ANNOTATION").next().unwrap();
                let first = alignable.attr("TIME_SLOT_REF1").unwrap();
                let second = alignable.attr("TIME_SLOT_REF2").unwrap();
                assert!(known.contains(first) && known.contains(second));
                assert_eq!(first, format!("ts{}", 2 * index + 1));
                assert_eq!(second, format!("ts{}", 2 * index + 2));
            }
        }
    }

    #[test]
    fn test_slot_times_in_millis() {
        let template = Document::parse(TEMPLATE).unwrap();
        let doc = build_document(&template, &table(2), &info()).unwrap();
        let order = doc.root.find(&named("TIME_ORDER")).unwrap();
        let values: Vec<&str> = order
            .elements("TIME_SLOT")
            .map(|slot| slot.attr("TIME_VALUE").unwrap())
            .collect();
        assert_eq!(values, vec!["500", "1250", "1500", "2250"]);
    }

    #[test]
    fn test_missing_tier_marker() {
        let template = Document::parse(
            r#"<ANNOTATION_DOCUMENT><HEADER><MEDIA_DESCRIPTOR/></HEADER><TIME_ORDER/></ANNOTATION_DOCUMENT>"#,
        )
        .unwrap();
        let err = build_document(&template, &table(1), &info()).unwrap_err();
        assert!(matches!(err, ConversionError::TemplateMarker(_)));
    }
}
