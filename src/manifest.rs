//! E-book package document, navigation map and archive entry lists.
//!
//! [`plan_package`] computes every resource of a loaded album once, as plain
//! data ([`PackagePlan`]). The two XML renderers and the tests read that plan
//! instead of recomputing ids, so the manifest, the spine and the nav map
//! cannot disagree.
//!
//! ## Manifest ids
//!
//! | Resource | id | href |
//! |----------|----|------|
//! | album.xml | `album_xml` | `album.xml` |
//! | landing frameset | `frames` | `index.html` |
//! | chapter page | `ch001` | `ch001.xhtml` |
//! | chapter.xml | `ch001_xml` | `ch001/chapter.xml` |
//! | photo | `ch001_dawn` | `ch001/dawn.jpg` |
//! | photo page | `ch001_dawn_xhtml` | `ch001/dawn.view.xhtml` |
//! | thumbnail | `ch001_dawnt` | `ch001/thumbs/dawn.jpg` |
//!
//! Per-photo items carry `fallback` pointing at their chapter's page item.
//! Ids are passed through [`naming::manifest_id`] and made unique, so an odd
//! photo name (`xml.jpg`) gets a suffixed id rather than a duplicate.

use crate::assets::{CONTAINER_FILE, MIMETYPE_FILE, STYLE_FILE, VIEWER_FILE};
use crate::config::AppConfig;
use crate::model::{Album, AlbumHeader, ChapterBody};
use crate::naming;
use crate::package::PackageEntry;
use crate::pages::{FRAMESET_PAGE, TITLE_PAGE, TOC_PAGE};
use crate::store::xml::{DATE_FORMAT, XmlWriter};
use crate::store::{ALBUM_FILE, CHAPTER_FILE, CONTENT_ROOT, Store, THUMBS_DIR};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io;
use std::path::Path;

pub const PACKAGE_FILE: &str = "content.opf";
pub const NCX_FILE: &str = "toc.ncx";

const XHTML: &str = "application/xhtml+xml";
const CSS: &str = "text/css";
const XML: &str = "application/xml";
const NCX: &str = "application/x-dtbncx+xml";

const FRAMES_ID: &str = "frames";
const HTML: &str = "text/html";
const COVER_PAGE_ID: &str = "cover";
const COVER_IMAGE_ID: &str = "cover-image";
const TOC_ID: &str = "toc";
const NCX_ID: &str = "ncx";

/// A loaded chapter as the manifest and the pipeline see it.
#[derive(Debug, Clone, Copy)]
pub struct ChapterView<'a> {
    pub dir: &'a str,
    pub title: &'a str,
    pub body: &'a ChapterBody,
}

/// Views over every chapter, or `None` when the album or any chapter body is
/// not loaded.
pub fn chapter_views(album: &Album) -> Option<Vec<ChapterView<'_>>> {
    album.body()?;
    album
        .chapters()
        .iter()
        .map(|c| {
            Some(ChapterView {
                dir: c.dir(),
                title: c.title(),
                body: c.body()?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: &'static str,
    pub properties: Option<&'static str>,
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavPoint {
    pub id: String,
    pub play_order: usize,
    pub label: String,
    pub src: String,
}

/// Everything the package document and the nav map declare.
#[derive(Debug, Clone, Default)]
pub struct PackagePlan {
    pub items: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub nav_points: Vec<NavPoint>,
    /// Id of the item flagged as cover image, if any.
    pub cover_image: Option<String>,
}

#[derive(Default)]
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn claim(&mut self, parts: &[&str]) -> String {
        let base = naming::manifest_id(parts);
        let mut id = base.clone();
        let mut n = 1u32;
        while !self.used.insert(id.clone()) {
            id = format!("{base}-{n}");
            n += 1;
        }
        id
    }
}

fn item(id: String, href: impl Into<String>, media_type: &'static str) -> ManifestItem {
    ManifestItem {
        id,
        href: href.into(),
        media_type,
        properties: None,
        fallback: None,
    }
}

/// Compute the manifest, spine and nav map of an album.
///
/// `cover` is the cover image path relative to the content root, passed only
/// when the file exists. A cover that is also one of the photos is flagged on
/// that photo's item instead of being declared twice.
pub fn plan_package(
    chapters: &[ChapterView<'_>],
    cover: Option<&str>,
    config: &AppConfig,
) -> PackagePlan {
    let mut ids = IdAllocator::default();
    let mut plan = PackagePlan::default();

    for fixed in [
        COVER_PAGE_ID,
        COVER_IMAGE_ID,
        TOC_ID,
        NCX_ID,
        FRAMES_ID,
        "album_xml",
        "stylesheet",
        "viewer",
    ] {
        ids.used.insert(fixed.to_string());
    }
    plan.items.push(item("album_xml".into(), ALBUM_FILE, XML));
    plan.items.push(item(NCX_ID.into(), NCX_FILE, NCX));
    plan.items.push(item("stylesheet".into(), STYLE_FILE, CSS));
    plan.items.push(item("viewer".into(), VIEWER_FILE, CSS));
    plan.items.push(item(FRAMES_ID.into(), FRAMESET_PAGE, HTML));
    plan.items.push(item(COVER_PAGE_ID.into(), TITLE_PAGE, XHTML));

    let cover_is_photo = cover.is_some_and(|c| {
        chapters.iter().any(|ch| {
            ch.body
                .photos()
                .any(|p| c == format!("{}/{}", ch.dir, p.file))
        })
    });
    if let Some(cover) = cover.filter(|_| !cover_is_photo) {
        let mut cover_item = item(COVER_IMAGE_ID.into(), cover, naming::photo_media_type(cover));
        cover_item.properties = Some("cover-image");
        plan.items.push(cover_item);
        plan.cover_image = Some(COVER_IMAGE_ID.to_string());
    }

    let mut toc_item = item(TOC_ID.into(), TOC_PAGE, XHTML);
    toc_item.properties = Some("nav");
    plan.items.push(toc_item);

    plan.spine.push(SpineItem {
        idref: COVER_PAGE_ID.into(),
        linear: true,
    });
    plan.spine.push(SpineItem {
        idref: TOC_ID.into(),
        linear: true,
    });
    plan.nav_points.push(NavPoint {
        id: COVER_PAGE_ID.into(),
        play_order: 1,
        label: config.labels.preface.clone(),
        src: TITLE_PAGE.into(),
    });
    plan.nav_points.push(NavPoint {
        id: TOC_ID.into(),
        play_order: 2,
        label: config.labels.table_of_contents.clone(),
        src: TOC_PAGE.into(),
    });

    for (n, chapter) in chapters.iter().enumerate() {
        let dir = chapter.dir;
        let page_id = ids.claim(&[dir]);
        plan.items
            .push(item(page_id.clone(), naming::chapter_page_name(dir), XHTML));
        plan.items.push(item(
            ids.claim(&[dir, "xml"]),
            format!("{dir}/{CHAPTER_FILE}"),
            XML,
        ));
        plan.spine.push(SpineItem {
            idref: page_id.clone(),
            linear: true,
        });
        let label = if chapter.title.trim().is_empty() {
            config.labels.untitled.clone()
        } else {
            chapter.title.to_string()
        };
        plan.nav_points.push(NavPoint {
            id: page_id.clone(),
            play_order: n + 3,
            label,
            src: naming::chapter_page_name(dir),
        });

        for photo in chapter.body.photos() {
            let stem = naming::file_stem(&photo.file);
            let href = format!("{dir}/{}", photo.file);
            let with_fallback = |mut it: ManifestItem| {
                it.fallback = Some(page_id.clone());
                it
            };

            let mut image = with_fallback(item(
                ids.claim(&[dir, stem]),
                href.as_str(),
                naming::photo_media_type(&photo.file),
            ));
            if cover_is_photo && cover == Some(href.as_str()) {
                image.properties = Some("cover-image");
                plan.cover_image = Some(image.id.clone());
            }
            let page = with_fallback(item(
                ids.claim(&[dir, stem, "xhtml"]),
                format!("{dir}/{}", naming::photo_page_name(&photo.file)),
                XHTML,
            ));
            let thumb = with_fallback(item(
                ids.claim(&[dir, &format!("{stem}t")]),
                format!("{dir}/{THUMBS_DIR}/{}", photo.file),
                naming::photo_media_type(&photo.file),
            ));
            plan.spine.push(SpineItem {
                idref: page.id.clone(),
                linear: false,
            });
            plan.items.extend([image, page, thumb]);
        }
    }
    plan
}

fn display_title<'a>(header: &'a AlbumHeader, config: &'a AppConfig) -> &'a str {
    if header.title.trim().is_empty() {
        &config.labels.untitled
    } else {
        &header.title
    }
}

/// `content.opf`: EPUB 3 package document.
pub fn render_package_document(
    header: &AlbumHeader,
    plan: &PackagePlan,
    config: &AppConfig,
    modified: DateTime<Utc>,
) -> io::Result<Vec<u8>> {
    let mut w = XmlWriter::new()?;
    w.start(
        "package",
        &[
            ("xmlns", "http://www.idpf.org/2007/opf"),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("version", "3.0"),
            ("xml:lang", config.book.language.as_str()),
            ("unique-identifier", "EPB-UUID"),
        ],
    )?;

    w.start("metadata", &[])?;
    w.element_with_text(
        "dc:identifier",
        &[("id", "EPB-UUID")],
        &format!("urn:uuid:{}", header.identifier),
    )?;
    w.element_with_text(
        "dc:title",
        &[("id", "pub-title")],
        display_title(header, config),
    )?;
    w.element_with_text(
        "dc:date",
        &[],
        &header.dates.first().format(DATE_FORMAT).to_string(),
    )?;
    w.element_with_text(
        "meta",
        &[("property", "dcterms:modified")],
        &modified.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )?;
    if let Some(cover) = &plan.cover_image {
        w.element_with_text("meta", &[("name", "cover"), ("content", cover.as_str())], "")?;
    }
    if !header.author.trim().is_empty() {
        w.element_with_text("dc:creator", &[("id", "author")], &header.author)?;
        w.element_with_text("dc:publisher", &[], &header.author)?;
    }
    w.element_with_text(
        "dc:language",
        &[("id", "pub-language")],
        &config.book.language,
    )?;
    w.end("metadata")?;

    w.start("manifest", &[])?;
    for it in &plan.items {
        let mut attrs: Vec<(&str, &str)> = vec![
            ("id", it.id.as_str()),
            ("href", it.href.as_str()),
            ("media-type", it.media_type),
        ];
        if let Some(props) = it.properties {
            attrs.push(("properties", props));
        }
        if let Some(fallback) = &it.fallback {
            attrs.push(("fallback", fallback.as_str()));
        }
        w.element_with_text("item", &attrs, "")?;
    }
    w.end("manifest")?;

    w.start("spine", &[("toc", NCX_ID)])?;
    for entry in &plan.spine {
        let mut attrs = vec![("idref", entry.idref.as_str())];
        if !entry.linear {
            attrs.push(("linear", "no"));
        }
        w.element_with_text("itemref", &attrs, "")?;
    }
    w.end("spine")?;

    w.end("package")?;
    Ok(w.finish())
}

/// Href of the item flagged `cover-image` in an existing package document.
///
/// Unreadable documents declare nothing.
pub fn declared_cover_image(text: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(text).ok()?;
    doc.descendants()
        .filter(|n| n.has_tag_name("item"))
        .find(|n| {
            n.attribute("properties")
                .is_some_and(|p| p.split_whitespace().any(|t| t == "cover-image"))
        })
        .and_then(|n| n.attribute("href"))
        .map(str::to_string)
}

/// `toc.ncx`: navigation map with sequential play order.
pub fn render_ncx(
    header: &AlbumHeader,
    plan: &PackagePlan,
    config: &AppConfig,
) -> io::Result<Vec<u8>> {
    let mut w = XmlWriter::new()?;
    w.start(
        "ncx",
        &[
            ("xmlns", "http://www.daisy.org/z3986/2005/ncx/"),
            ("version", "2005-1"),
        ],
    )?;

    w.start("head", &[])?;
    let uid = format!("urn:uuid:{}", header.identifier);
    for (name, content) in [
        ("dtb:uid", uid.as_str()),
        ("dtb:depth", "1"),
        ("dtb:totalPageCount", "0"),
        ("dtb:maxPageNumber", "0"),
    ] {
        w.element_with_text("meta", &[("name", name), ("content", content)], "")?;
    }
    w.end("head")?;

    w.start("docTitle", &[])?;
    w.element_with_text("text", &[], display_title(header, config))?;
    w.end("docTitle")?;
    w.start("docAuthor", &[])?;
    w.element_with_text("text", &[], &header.author)?;
    w.end("docAuthor")?;

    w.start("navMap", &[])?;
    for point in &plan.nav_points {
        let order = point.play_order.to_string();
        w.start("navPoint", &[("id", point.id.as_str()), ("playOrder", order.as_str())])?;
        w.start("navLabel", &[])?;
        w.element_with_text("text", &[], &point.label)?;
        w.end("navLabel")?;
        w.element_with_text("content", &[("src", point.src.as_str())], "")?;
        w.end("navPoint")?;
    }
    w.end("navMap")?;

    w.end("ncx")?;
    Ok(w.finish())
}

// =========================================================================
// Archive entry lists
// =========================================================================

fn push_chapters(
    entries: &mut Vec<PackageEntry>,
    content: &Path,
    prefix: &str,
    chapters: &[ChapterView<'_>],
    with_xml: bool,
) {
    for chapter in chapters {
        let dir = chapter.dir;
        let page = naming::chapter_page_name(dir);
        entries.push(PackageEntry::deflated(
            format!("{prefix}{page}"),
            content.join(&page),
        ));
        let chapter_dir = content.join(dir);
        if with_xml {
            entries.push(PackageEntry::deflated(
                format!("{prefix}{dir}/{CHAPTER_FILE}"),
                chapter_dir.join(CHAPTER_FILE),
            ));
        }
        for photo in chapter.body.photos() {
            let view = naming::photo_page_name(&photo.file);
            entries.push(PackageEntry::stored(
                format!("{prefix}{dir}/{}", photo.file),
                chapter_dir.join(&photo.file),
            ));
            entries.push(PackageEntry::deflated(
                format!("{prefix}{dir}/{view}"),
                chapter_dir.join(&view),
            ));
            entries.push(PackageEntry::stored(
                format!("{prefix}{dir}/{THUMBS_DIR}/{}", photo.file),
                chapter_dir.join(THUMBS_DIR).join(&photo.file),
            ));
        }
    }
}

/// Ordered entries of the e-book container.
///
/// `cover` as for [`plan_package`]; a cover that is also a photo is packed
/// once, with its chapter.
pub fn ebook_entries(
    store: &Store,
    album_dir: &str,
    chapters: &[ChapterView<'_>],
    cover: Option<&str>,
) -> Vec<PackageEntry> {
    let root = store.album_root(album_dir);
    let content = store.content_root(album_dir);
    let prefix = format!("{CONTENT_ROOT}/");

    let mut entries = vec![
        PackageEntry::stored(MIMETYPE_FILE, root.join(MIMETYPE_FILE)),
        PackageEntry::deflated(CONTAINER_FILE, root.join(CONTAINER_FILE)),
    ];
    for file in [
        PACKAGE_FILE,
        NCX_FILE,
        ALBUM_FILE,
        FRAMESET_PAGE,
        TOC_PAGE,
        TITLE_PAGE,
        STYLE_FILE,
        VIEWER_FILE,
    ] {
        entries.push(PackageEntry::deflated(
            format!("{prefix}{file}"),
            content.join(file),
        ));
    }
    if let Some(cover) = cover {
        let name = format!("{prefix}{cover}");
        let packed_with_chapter = chapters.iter().any(|ch| {
            ch.body
                .photos()
                .any(|p| cover == format!("{}/{}", ch.dir, p.file))
        });
        if !packed_with_chapter {
            entries.push(PackageEntry::deflated(name, content.join(cover)));
        }
    }
    push_chapters(&mut entries, &content, &prefix, chapters, true);
    entries
}

/// Ordered entries of the website zip: pages, styles and media, no XML.
pub fn website_entries(
    store: &Store,
    album_dir: &str,
    chapters: &[ChapterView<'_>],
) -> Vec<PackageEntry> {
    let content = store.content_root(album_dir);
    let mut entries: Vec<PackageEntry> = [FRAMESET_PAGE, TOC_PAGE, TITLE_PAGE, STYLE_FILE, VIEWER_FILE]
        .into_iter()
        .map(|file| PackageEntry::deflated(file, content.join(file)))
        .collect();
    push_chapters(&mut entries, &content, "", chapters, false);
    entries
}
