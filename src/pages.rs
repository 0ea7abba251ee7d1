//! Page generation.
//!
//! Pure builders turning loaded model entities into page text. Nothing here
//! touches the filesystem; the pipeline decides which pages are stale and
//! writes what these functions return.
//!
//! ## Generated Pages
//!
//! | Page | File | Source |
//! |------|------|--------|
//! | Title / preface | `title.xhtml` | album header + preface text |
//! | Table of contents | `toc.xhtml` | chapter list |
//! | Chapter | `ch001.xhtml` | chapter body |
//! | Photo viewer | `ch001/dawn.view.xhtml` | one photo |
//! | Landing frameset | `index.html` | album title |
//!
//! ## XHTML vs HTML
//!
//! E-book readers parse the `.xhtml` pages as XML, so they are assembled as
//! text with explicit `<br />`/`<img ... />` forms and every piece of user
//! text passed through [`naming::escape`]. The frameset is plain HTML and is
//! rendered with [maud](https://maud.lambda.xyz/), using an [`Escaped`]
//! wrapper so user text goes through the same escape as the XHTML pages.

use crate::config::AppConfig;
use crate::model::{AlbumBody, AlbumHeader, ChapterBody, DateRange, Orientation, Photo};
use crate::naming::{self, escape};
use crate::store::THUMBS_DIR;
use chrono::NaiveDate;
use maud::{DOCTYPE, Markup, Render, html};
use std::fmt::Write;

pub const TITLE_PAGE: &str = "title.xhtml";
pub const TOC_PAGE: &str = "toc.xhtml";
pub const FRAMESET_PAGE: &str = "index.html";

// Stylesheet hrefs relative to the page that links them.
const STYLE_HREF: &str = "style.css";
const VIEWER_HREF: &str = "../viewer.css";

/// Text rendered through [`naming::escape`] inside maud templates.
pub struct Escaped<'a>(pub &'a str);

impl Render for Escaped<'_> {
    fn render_to(&self, buffer: &mut String) {
        buffer.push_str(&escape(self.0));
    }
}

/// Format a date with a strftime pattern, falling back to ISO 8601 when the
/// pattern cannot be rendered.
pub fn format_date(date: NaiveDate, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(pattern)).is_err() {
        return date.format("%Y-%m-%d").to_string();
    }
    out
}

/// Single date when the range is one day, otherwise `first – last`.
pub fn format_date_range(range: &DateRange, pattern: &str) -> String {
    if range.is_single_day() {
        format_date(range.first(), pattern)
    } else {
        format!(
            "{} – {}",
            format_date(range.first(), pattern),
            format_date(range.last(), pattern)
        )
    }
}

/// Escape text and turn every line break (`\r\n`, `\r`, `\n`) into `<br />`.
pub fn escape_multiline(text: &str) -> String {
    escape(text)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "<br />")
}

/// CSS class of a photo block: `landscape`, `portrait2x`, `landscape4x`, ...
pub fn photo_class(orientation: Orientation, multiplier: u32) -> String {
    if multiplier <= 1 {
        orientation.as_str().to_string()
    } else {
        format!("{}{}x", orientation.as_str(), multiplier)
    }
}

/// Wrap body markup in the XHTML skeleton shared by every page.
///
/// `body` is inserted verbatim; `title` is escaped.
pub fn base_document(title: &str, css: &str, language: &str, body: &str) -> String {
    let mut doc = String::with_capacity(body.len() + 512);
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    doc.push_str("<!DOCTYPE html>\n");
    let _ = writeln!(
        doc,
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"{}\">",
        escape(language)
    );
    doc.push_str("<head>\n");
    doc.push_str(
        "    <meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" />\n",
    );
    let _ = writeln!(
        doc,
        "    <link rel=\"stylesheet\" href=\"{}\" type=\"text/css\" />",
        escape(css)
    );
    let _ = writeln!(doc, "    <title>{}</title>", escape(title));
    doc.push_str("</head>\n<body>\n");
    doc.push_str(body);
    doc.push_str("</body>\n</html>\n");
    doc
}

fn page_title<'a>(title: &'a str, config: &'a AppConfig) -> &'a str {
    if title.trim().is_empty() {
        &config.labels.untitled
    } else {
        title
    }
}

/// `title.xhtml`: title, author, date range, location and preface.
pub fn render_title_page(header: &AlbumHeader, body: &AlbumBody, config: &AppConfig) -> String {
    let mut out = String::new();
    if !header.title.is_empty() {
        let _ = writeln!(
            out,
            "    <h1 class=\"title\" style=\"text-align: center\">{}</h1>",
            escape(&header.title)
        );
    }
    if !header.author.is_empty() {
        let _ = writeln!(
            out,
            "    <p class=\"author\" style=\"text-align: center\">{}</p>",
            escape(&header.author)
        );
    }
    let _ = write!(
        out,
        "    <p class=\"datetime\" style=\"text-align: center\">{}",
        escape(&format_date_range(&header.dates, &config.book.date_format))
    );
    if !header.location.is_empty() {
        let _ = write!(
            out,
            "<br /><span class=\"locat\">{}</span>",
            escape(&header.location)
        );
    }
    out.push_str("</p>\n");
    if !body.text.is_empty() {
        let _ = writeln!(
            out,
            "    <p class=\"introduction\">{}</p>",
            escape_multiline(&body.text)
        );
    }
    base_document(
        page_title(&header.title, config),
        STYLE_HREF,
        &config.book.language,
        &out,
    )
}

/// `toc.xhtml`: preface first, then one link per chapter in document order.
///
/// `chapters` yields `(dir, title)` pairs.
pub fn render_toc_page<'a>(
    chapters: impl IntoIterator<Item = (&'a str, &'a str)>,
    config: &AppConfig,
) -> String {
    let label = &config.labels.table_of_contents;
    let mut out = String::new();
    let _ = writeln!(out, "    <h1>{}</h1>", escape(label));
    out.push_str("    <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str("    <ol style=\"list-style-type: none\">\n");
    let _ = writeln!(
        out,
        "        <li class=\"toc\"><a href=\"{TITLE_PAGE}\" target=\"viewer\">{}</a></li>",
        escape(&config.labels.preface)
    );
    for (dir, title) in chapters {
        let _ = writeln!(
            out,
            "        <li class=\"toc\"><a href=\"{}\" target=\"viewer\">{}</a></li>",
            escape(&naming::chapter_page_name(dir)),
            escape(title)
        );
    }
    out.push_str("    </ol>\n    </nav>\n");
    base_document(label, STYLE_HREF, &config.book.language, &out)
}

/// Date and location line of a paragraph, `None` when both are hidden.
fn datetime_line(date: Option<&str>, location: Option<&str>, at: &str) -> Option<String> {
    let mut line = String::new();
    match (date, location) {
        (None, None) => return None,
        (Some(d), None) => line.push_str(&escape(d)),
        (None, Some(l)) => {
            let _ = write!(line, "<span class=\"locat\">{}</span>", escape(l));
        }
        (Some(d), Some(l)) => {
            let _ = write!(
                line,
                "{}  {}  <span class=\"locat\">{}</span>",
                escape(d),
                escape(at),
                escape(l)
            );
        }
    }
    Some(line)
}

/// `<dir>.xhtml`: chapter title, then each paragraph with its photo blocks.
pub fn render_chapter_page(
    dir: &str,
    title: &str,
    body: &ChapterBody,
    config: &AppConfig,
) -> String {
    let mut out = String::new();
    if !title.is_empty() {
        let _ = writeln!(out, "    <h1 class=\"title\">{}</h1>", escape(title));
    }
    for paragraph in &body.paragraphs {
        out.push_str("    <div class=\"paragraph\">\n");
        if !paragraph.title.is_empty() {
            let _ = writeln!(out, "    <h2>{}</h2>", escape(&paragraph.title));
        }

        let date = paragraph
            .date_visible
            .then(|| format_date(paragraph.date, &config.book.date_format));
        let location = paragraph
            .location_visible
            .then_some(paragraph.location.as_str());
        if let Some(line) = datetime_line(date.as_deref(), location, &config.labels.at) {
            let _ = writeln!(out, "    <p class=\"datetime\">{line}</p>");
        }

        if !paragraph.text.is_empty() {
            let _ = writeln!(out, "    <p>{}</p>", escape_multiline(&paragraph.text));
        }

        for photo in &paragraph.photos {
            let href = escape(&format!("{dir}/{}", naming::photo_page_name(&photo.file)));
            let thumb = escape(&format!("{dir}/{THUMBS_DIR}/{}", photo.file));
            let _ = writeln!(
                out,
                "    <div class=\"{}\">",
                photo_class(photo.orientation, paragraph.thumb_size)
            );
            let _ = writeln!(
                out,
                "        <a href=\"{href}\"><img src=\"{thumb}\" alt=\"\" /></a>"
            );
            if !photo.description.is_empty() {
                let _ = writeln!(
                    out,
                    "        <span><a href=\"{href}\">{}</a></span>",
                    escape(&photo.description)
                );
            }
            out.push_str("    </div>\n");
        }
        out.push_str("</div>\n");
    }
    base_document(
        page_title(title, config),
        STYLE_HREF,
        &config.book.language,
        &out,
    )
}

/// `<dir>/<stem>.view.xhtml`: one full-bleed photo with its caption.
pub fn render_photo_page(photo: &Photo, config: &AppConfig) -> String {
    let title = if photo.description.is_empty() {
        &photo.file
    } else {
        &photo.description
    };
    let mut out = String::new();
    out.push_str("<div class=\"fullscreenimage\">\n");
    let _ = writeln!(out, "    <img src=\"{}\" alt=\"\" />", escape(&photo.file));
    if !photo.description.is_empty() {
        out.push_str("    <div class=\"toolbar\">\n");
        let _ = writeln!(out, "        <span>{}</span>", escape(&photo.description));
        out.push_str("    </div>\n");
    }
    out.push_str("</div>\n");
    base_document(title, VIEWER_HREF, &config.book.language, &out)
}

/// `index.html`: toc on the left, pages on the right.
pub fn render_frameset(header: &AlbumHeader, config: &AppConfig) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(Escaped(&config.book.language)) {
            head {
                meta http-equiv="Content-Type" content="text/html; charset=utf-8";
                title { (Escaped(page_title(&header.title, config))) }
            }
            frameset cols="20%,*" {
                frame name="toc" src=(TOC_PAGE);
                frame name="viewer" src=(TITLE_PAGE);
            }
        }
    }
}
