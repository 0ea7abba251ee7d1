//! `album.xml`: album header fields, preface, cover editor and chapter list.
//!
//! ```xml
//! <album identifier="6f1c...">
//!   <title>Kyoto</title>
//!   <firstdate>2024-03-05</firstdate>
//!   <text>Three days of rain.</text>
//!   <cover_editor>
//!     <font>Ariel</font>
//!     <textsize>48</textsize>
//!     <textcolor>#FFFFFF</textcolor>
//!     <bgindex>0</bgindex>
//!   </cover_editor>
//!   <chapters>
//!     <chapter dir="ch001" photos="12">Arrival</chapter>
//!   </chapters>
//! </album>
//! ```
//!
//! Only the chapter *headers* are stored here; chapter content lives in each
//! chapter's own `chapter.xml`.

use super::StoreError;
use super::xml::{self, XmlWriter};
use crate::model::{AlbumBody, AlbumHeader, Chapter, CoverConfig, DateRange, Rgb};
use std::io;
use std::path::Path;

/// Everything `album.xml` holds. `dir` and `filename` are not stored in the
/// file and come back empty; the caller fills them in.
#[derive(Debug, Clone)]
pub struct AlbumFile {
    pub header: AlbumHeader,
    pub body: AlbumBody,
}

pub fn parse_album(text: &str, path: &Path) -> Result<AlbumFile, StoreError> {
    let doc = xml::parse_document(text, path)?;
    let root = xml::root_element(&doc, "album", path)?;

    let first = xml::child_date(root, "firstdate", path)?.ok_or_else(|| StoreError::Parse {
        path: path.to_path_buf(),
        message: "album has no firstdate".to_string(),
    })?;
    let last = xml::child_date(root, "lastdate", path)?.unwrap_or(first);

    let mut header = AlbumHeader::new(root.attribute("identifier").unwrap_or_default(), "", first);
    header.dates = DateRange::new(first, last);
    header.title = xml::child_text(root, "title");
    header.location = xml::child_text(root, "location");
    header.author = xml::child_text(root, "author");
    header.cover = xml::child_text(root, "cover");

    let mut cover = CoverConfig::default();
    if let Some(editor) = xml::child(root, "cover_editor") {
        if let Some(font) = xml::child(editor, "font") {
            cover.font = xml::inner_text(font);
        }
        cover.style = xml::parse_u32(xml::child(editor, "style").and_then(|n| n.text()), 0);
        cover.text_size = xml::parse_u32(
            xml::child(editor, "textsize").and_then(|n| n.text()),
            cover.text_size,
        );
        if let Some(color) = xml::child(editor, "textcolor").and_then(|n| n.text()) {
            cover.text_color = Rgb::parse_hex(color).ok_or_else(|| StoreError::Parse {
                path: path.to_path_buf(),
                message: format!("invalid text color {color:?}"),
            })?;
        }
        cover.background = xml::parse_u32(xml::child(editor, "bgindex").and_then(|n| n.text()), 0);
        cover.raw = xml::child_text(editor, "raw");
    }

    let chapters = match xml::child(root, "chapters") {
        Some(list) => xml::children(list, "chapter")
            .map(|node| {
                let dir = node.attribute("dir").unwrap_or_default();
                if dir.is_empty() {
                    return Err(StoreError::Parse {
                        path: path.to_path_buf(),
                        message: "chapter has no dir attribute".to_string(),
                    });
                }
                let photos = xml::parse_u32(node.attribute("photos"), 0) as usize;
                Ok(Chapter::from_header(xml::inner_text(node), dir, photos))
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(AlbumFile {
        header,
        body: AlbumBody {
            text: xml::child_text(root, "text"),
            cover,
            chapters,
        },
    })
}

pub fn write_album(header: &AlbumHeader, body: &AlbumBody) -> io::Result<Vec<u8>> {
    let mut w = XmlWriter::new()?;
    w.start("album", &[("identifier", header.identifier.as_str())])?;
    w.optional("title", &header.title)?;
    w.date("firstdate", header.dates.first())?;
    if !header.dates.is_single_day() {
        w.date("lastdate", header.dates.last())?;
    }
    w.optional("location", &header.location)?;
    w.optional("author", &header.author)?;
    w.optional("text", &body.text)?;
    w.optional("cover", &header.cover)?;

    let cover = &body.cover;
    w.start("cover_editor", &[])?;
    w.optional("font", &cover.font)?;
    if cover.style != 0 {
        w.element_with_text("style", &[], &cover.style.to_string())?;
    }
    w.element_with_text("textsize", &[], &cover.text_size.to_string())?;
    w.element_with_text("textcolor", &[], &cover.text_color.to_hex())?;
    w.element_with_text("bgindex", &[], &cover.background.to_string())?;
    w.optional("raw", &cover.raw)?;
    w.end("cover_editor")?;

    w.start("chapters", &[])?;
    for chapter in &body.chapters {
        let photos = chapter.photo_count().to_string();
        let mut attrs = vec![("dir", chapter.dir())];
        if chapter.photo_count() > 0 {
            attrs.push(("photos", photos.as_str()));
        }
        w.element_with_text("chapter", &attrs, chapter.title())?;
    }
    w.end("chapters")?;
    w.end("album")?;
    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roundtrip(header: &AlbumHeader, body: &AlbumBody) -> AlbumFile {
        let text = String::from_utf8(write_album(header, body).unwrap()).unwrap();
        parse_album(&text, Path::new("album.xml")).unwrap()
    }

    #[test]
    fn roundtrip_all_fields() {
        let mut header = AlbumHeader::new("id-1", "", date(2024, 3, 5));
        header.dates = DateRange::new(date(2024, 3, 5), date(2024, 3, 9));
        header.title = "Kyoto".into();
        header.location = "Japan".into();
        header.author = "Mei".into();
        header.cover = "ch001/dawn.jpg".into();
        let body = AlbumBody {
            text: "Line one\nLine <two>".into(),
            cover: CoverConfig {
                font: "Georgia".into(),
                style: 2,
                text_size: 36,
                text_color: Rgb(0x10, 0x20, 0x30),
                background: 3,
                raw: "ch001/raw.jpg".into(),
            },
            chapters: vec![
                Chapter::from_header("Arrival", "ch001", 12),
                Chapter::from_header("Empty", "ch002", 0),
            ],
        };

        let file = roundtrip(&header, &body);
        assert_eq!(file.header, header);
        assert_eq!(file.body.text, body.text);
        assert_eq!(file.body.cover, body.cover);
        let chapters: Vec<_> = file
            .body
            .chapters
            .iter()
            .map(|c| (c.title(), c.dir(), c.photo_count(), c.is_loaded()))
            .collect();
        assert_eq!(
            chapters,
            vec![("Arrival", "ch001", 12, false), ("Empty", "ch002", 0, false)]
        );
    }

    #[test]
    fn defaults_are_sparse() {
        let header = AlbumHeader::new("id-1", "", date(2024, 3, 5));
        let body = AlbumBody {
            chapters: vec![Chapter::from_header("Empty", "ch001", 0)],
            ..AlbumBody::default()
        };
        let text = String::from_utf8(write_album(&header, &body).unwrap()).unwrap();
        assert!(!text.contains("<lastdate"));
        assert!(!text.contains("<text>"));
        assert!(text.contains("<textsize>"));
        assert!(!text.contains("<style"));
        assert!(!text.contains("<raw"));
        assert!(!text.contains("photos="));
        assert!(text.contains("<textcolor>#FFFFFF</textcolor>"));

        let file = roundtrip(&header, &body);
        assert_eq!(file.body.cover, CoverConfig::default());
    }

    #[test]
    fn missing_cover_editor_uses_defaults() {
        let text = r#"<album identifier="x"><firstdate>2024-01-02</firstdate></album>"#;
        let file = parse_album(text, Path::new("album.xml")).unwrap();
        assert_eq!(file.body.cover, CoverConfig::default());
        assert!(file.body.chapters.is_empty());
    }

    #[test]
    fn invalid_color_is_parse_error() {
        let text = r#"<album><firstdate>2024-01-02</firstdate>
            <cover_editor><textcolor>red</textcolor></cover_editor></album>"#;
        let err = parse_album(text, Path::new("album.xml")).unwrap_err();
        assert!(err.to_string().contains("invalid text color"));
    }

    #[test]
    fn bad_firstdate_is_date_error() {
        let text = r#"<album><firstdate>05/03/2024</firstdate></album>"#;
        let err = parse_album(text, Path::new("album.xml")).unwrap_err();
        assert!(matches!(err, StoreError::Date { .. }));
    }
}
