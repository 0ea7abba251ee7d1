//! `albums.xml`: the list of album headers under a data root.
//!
//! ```xml
//! <albums>
//!   <album identifier="6f1c..." dir="lq3k9z1a">
//!     <title>Kyoto</title>
//!     <firstdate>2024-03-05</firstdate>
//!     <lastdate>2024-03-09</lastdate>
//!     <location>Japan</location>
//!     <author>Mei</author>
//!     <cover>ch001/dawn.jpg</cover>
//!     <filename>kyoto.epub</filename>
//!   </album>
//! </albums>
//! ```

use super::StoreError;
use super::xml::{self, XmlWriter};
use crate::model::{AlbumHeader, DateRange};
use std::io;
use std::path::Path;

pub fn parse_registry(text: &str, path: &Path) -> Result<Vec<AlbumHeader>, StoreError> {
    let doc = xml::parse_document(text, path)?;
    let root = xml::root_element(&doc, "albums", path)?;
    xml::children(root, "album")
        .map(|node| {
            let identifier = node.attribute("identifier").unwrap_or_default();
            let dir = node.attribute("dir").unwrap_or_default();
            if dir.is_empty() {
                return Err(StoreError::Parse {
                    path: path.to_path_buf(),
                    message: format!("album {identifier:?} has no dir attribute"),
                });
            }
            let first = xml::child_date(node, "firstdate", path)?.ok_or_else(|| {
                StoreError::Parse {
                    path: path.to_path_buf(),
                    message: format!("album {dir:?} has no firstdate"),
                }
            })?;
            let last = xml::child_date(node, "lastdate", path)?.unwrap_or(first);

            let mut header = AlbumHeader::new(identifier, dir, first);
            header.dates = DateRange::new(first, last);
            header.title = xml::child_text(node, "title");
            header.location = xml::child_text(node, "location");
            header.author = xml::child_text(node, "author");
            header.cover = xml::child_text(node, "cover");
            header.filename = xml::child_text(node, "filename");
            Ok(header)
        })
        .collect()
}

pub fn write_registry<'a>(
    headers: impl IntoIterator<Item = &'a AlbumHeader>,
) -> io::Result<Vec<u8>> {
    let mut w = XmlWriter::new()?;
    w.start("albums", &[])?;
    for header in headers {
        w.start(
            "album",
            &[
                ("identifier", header.identifier.as_str()),
                ("dir", header.dir.as_str()),
            ],
        )?;
        w.optional("title", &header.title)?;
        w.date("firstdate", header.dates.first())?;
        if !header.dates.is_single_day() {
            w.date("lastdate", header.dates.last())?;
        }
        w.optional("location", &header.location)?;
        w.optional("author", &header.author)?;
        w.optional("cover", &header.cover)?;
        w.optional("filename", &header.filename)?;
        w.end("album")?;
    }
    w.end("albums")?;
    Ok(w.finish())
}
