//! Shared XML plumbing for the three document files.
//!
//! Writing goes through [`XmlWriter`], a thin layer over `quick_xml::Writer`
//! that knows the sparse-emission rule: empty text elements are skipped.
//! Reading uses `roxmltree` and the small lookup helpers below.

use super::StoreError;
use chrono::NaiveDate;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use roxmltree::{Document, Node};
use std::io;
use std::path::Path;

/// Date format used in every document file.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

fn write_failed(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

impl XmlWriter {
    pub fn new() -> io::Result<Self> {
        let mut inner = Writer::new_with_indent(Vec::new(), b' ', 2);
        inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_failed)?;
        Ok(Self { inner })
    }

    fn element<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        start
    }

    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.inner
            .write_event(Event::Start(Self::element(name, attrs)))
            .map_err(write_failed)
    }

    pub fn end(&mut self, name: &str) -> io::Result<()> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_failed)
    }

    /// `<name attrs>text</name>`, or `<name attrs/>` when `text` is empty.
    pub fn element_with_text(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> io::Result<()> {
        if text.is_empty() {
            return self
                .inner
                .write_event(Event::Empty(Self::element(name, attrs)))
                .map_err(write_failed);
        }
        self.start(name, attrs)?;
        self.inner
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_failed)?;
        self.end(name)
    }

    /// Sparse field: nothing is written for an empty value.
    pub fn optional(&mut self, name: &str, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.element_with_text(name, &[], text)
    }

    pub fn date(&mut self, name: &str, date: NaiveDate) -> io::Result<()> {
        self.element_with_text(name, &[], &date.format(DATE_FORMAT).to_string())
    }

    pub fn finish(self) -> Vec<u8> {
        let mut bytes = self.inner.into_inner();
        bytes.push(b'\n');
        bytes
    }
}

pub(crate) fn parse_document<'i>(text: &'i str, path: &Path) -> Result<Document<'i>, StoreError> {
    Document::parse(text).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// The document root, checked against the expected element name.
pub(crate) fn root_element<'a, 'i>(
    doc: &'a Document<'i>,
    name: &str,
    path: &Path,
) -> Result<Node<'a, 'i>, StoreError> {
    let root = doc.root_element();
    if root.has_tag_name(name) {
        Ok(root)
    } else {
        Err(StoreError::Parse {
            path: path.to_path_buf(),
            message: format!(
                "expected <{name}> root element, found <{}>",
                root.tag_name().name()
            ),
        })
    }
}

pub(crate) fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(name))
}

pub(crate) fn children<'a, 'i>(
    node: Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |n| n.has_tag_name(name))
}

/// Concatenated text content of a node and its descendants.
pub(crate) fn inner_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Text of a named child, empty when the child is absent.
pub(crate) fn child_text(node: Node, name: &str) -> String {
    child(node, name).map(inner_text).unwrap_or_default()
}

pub(crate) fn parse_date(value: &str, path: &Path) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|source| StoreError::Date {
        path: path.to_path_buf(),
        value: value.to_string(),
        source,
    })
}

/// Date of a named child, `None` when the child is absent or empty.
pub(crate) fn child_date(
    node: Node,
    name: &str,
    path: &Path,
) -> Result<Option<NaiveDate>, StoreError> {
    let text = child_text(node, name);
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_date(&text, path).map(Some)
}

pub(crate) fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("true") => true,
        Some(v) if v.eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}

pub(crate) fn parse_u32(value: Option<&str>, default: u32) -> u32 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
