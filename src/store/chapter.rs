//! `chapter.xml`: paragraphs and photos of one chapter.
//!
//! ```xml
//! <chapter>
//!   <paragraph thumb_size="2">
//!     <date visible="true">2024-03-05</date>
//!     <title>Morning</title>
//!     <context>Fog over the river.</context>
//!     <location visible="true">Arashiyama</location>
//!     <photo file="dawn.jpg" orient="landscape" thumb_size="2">First light</photo>
//!     <photo file="bridge.jpg" orient="landscape" thumb_size="2"/>
//!   </paragraph>
//! </chapter>
//! ```

use super::StoreError;
use super::xml::{self, XmlWriter};
use crate::model::{ChapterBody, DEFAULT_THUMB_SIZE, Orientation, Paragraph, Photo};
use chrono::NaiveDate;
use std::io;
use std::path::Path;

/// Parse a chapter file. Paragraphs without a date get `default_date`
/// (the album's first date).
pub fn parse_chapter(
    text: &str,
    path: &Path,
    default_date: NaiveDate,
) -> Result<ChapterBody, StoreError> {
    let doc = xml::parse_document(text, path)?;
    let root = xml::root_element(&doc, "chapter", path)?;

    let paragraphs = xml::children(root, "paragraph")
        .map(|node| {
            let mut para = Paragraph::new(default_date);
            para.thumb_size = xml::parse_u32(node.attribute("thumb_size"), DEFAULT_THUMB_SIZE);
            if let Some(date) = xml::child(node, "date") {
                para.date_visible = xml::parse_bool(date.attribute("visible"), true);
                let text = xml::inner_text(date);
                if !text.trim().is_empty() {
                    para.date = xml::parse_date(&text, path)?;
                }
            }
            para.title = xml::child_text(node, "title");
            para.text = xml::child_text(node, "context");
            if let Some(location) = xml::child(node, "location") {
                para.location_visible = xml::parse_bool(location.attribute("visible"), false);
                para.location = xml::inner_text(location);
            }
            para.photos = xml::children(node, "photo")
                .map(|p| {
                    let file = p.attribute("file").unwrap_or_default();
                    if file.is_empty() {
                        return Err(StoreError::Parse {
                            path: path.to_path_buf(),
                            message: "photo has no file attribute".to_string(),
                        });
                    }
                    let orientation = match p.attribute("orient") {
                        None => Orientation::default(),
                        Some(value) => Orientation::parse(value).ok_or_else(|| {
                            StoreError::Parse {
                                path: path.to_path_buf(),
                                message: format!("photo {file:?} has unknown orientation {value:?}"),
                            }
                        })?,
                    };
                    let mut photo = Photo::new(file, orientation);
                    photo.thumb_size = xml::parse_u32(p.attribute("thumb_size"), DEFAULT_THUMB_SIZE);
                    photo.description = xml::inner_text(p);
                    Ok(photo)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(para)
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(ChapterBody { paragraphs })
}

pub fn write_chapter(body: &ChapterBody) -> io::Result<Vec<u8>> {
    let mut w = XmlWriter::new()?;
    w.start("chapter", &[])?;
    for para in &body.paragraphs {
        let thumb_size = para.thumb_size.to_string();
        w.start("paragraph", &[("thumb_size", thumb_size.as_str())])?;
        w.element_with_text(
            "date",
            &[("visible", xml::bool_str(para.date_visible))],
            &para.date.format(xml::DATE_FORMAT).to_string(),
        )?;
        w.optional("title", &para.title)?;
        w.optional("context", &para.text)?;
        if !para.location.is_empty() || para.location_visible {
            w.element_with_text(
                "location",
                &[("visible", xml::bool_str(para.location_visible))],
                &para.location,
            )?;
        }
        for photo in &para.photos {
            let thumb_size = photo.thumb_size.to_string();
            w.element_with_text(
                "photo",
                &[
                    ("file", photo.file.as_str()),
                    ("orient", photo.orientation.as_str()),
                    ("thumb_size", thumb_size.as_str()),
                ],
                &photo.description,
            )?;
        }
        w.end("paragraph")?;
    }
    w.end("chapter")?;
    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roundtrip(body: &ChapterBody) -> ChapterBody {
        let text = String::from_utf8(write_chapter(body).unwrap()).unwrap();
        parse_chapter(&text, Path::new("chapter.xml"), date(2000, 1, 1)).unwrap()
    }

    #[test]
    fn roundtrip_paragraphs_and_photos() {
        let mut para = Paragraph::new(date(2024, 3, 6));
        para.title = "Morning".into();
        para.text = "Fog\nover the river".into();
        para.location = "Arashiyama".into();
        para.location_visible = true;
        para.date_visible = false;
        let mut photo = Photo::new("dawn.jpg", Orientation::Landscape);
        photo.description = "First light & tea".into();
        para.photos.push(photo);
        para.photos.push(Photo::new("gate.png", Orientation::Portrait));
        para.recompute_thumb_size();
        para.photos[0].thumb_size = para.thumb_size;

        let body = ChapterBody {
            paragraphs: vec![para, Paragraph::new(date(2024, 3, 7))],
        };
        assert_eq!(roundtrip(&body), body);
    }

    #[test]
    fn empty_values_are_sparse() {
        let body = ChapterBody {
            paragraphs: vec![Paragraph::new(date(2024, 3, 6))],
        };
        let text = String::from_utf8(write_chapter(&body).unwrap()).unwrap();
        assert!(text.contains(r#"<date visible="true">2024-03-06</date>"#));
        assert!(!text.contains("<title"));
        assert!(!text.contains("<context"));
        assert!(!text.contains("<location"));
    }

    #[test]
    fn paragraph_without_date_uses_default() {
        let text = r#"<chapter><paragraph><photo file="a.jpg"/></paragraph></chapter>"#;
        let body = parse_chapter(text, Path::new("chapter.xml"), date(2024, 1, 2)).unwrap();
        let para = &body.paragraphs[0];
        assert_eq!(para.date, date(2024, 1, 2));
        assert_eq!(para.thumb_size, DEFAULT_THUMB_SIZE);
        assert_eq!(para.photos[0].orientation, Orientation::Landscape);
        assert_eq!(para.photos[0].thumb_size, DEFAULT_THUMB_SIZE);
    }

    #[test]
    fn unknown_orientation_is_parse_error() {
        let text = r#"<chapter><paragraph><photo file="a.jpg" orient="square"/></paragraph></chapter>"#;
        let err = parse_chapter(text, Path::new("chapter.xml"), date(2024, 1, 2)).unwrap_err();
        assert!(err.to_string().contains("unknown orientation"));
    }

    #[test]
    fn photo_without_file_is_parse_error() {
        let text = r#"<chapter><paragraph><photo orient="portrait"/></paragraph></chapter>"#;
        assert!(parse_chapter(text, Path::new("chapter.xml"), date(2024, 1, 2)).is_err());
    }
}
