//! Incremental build of an album into a website folder or an e-book.
//!
//! ## Steps
//!
//! 1. Save pending edits, load every chapter body, restore missing static assets.
//! 2. Regenerate each derived page whose sources are newer (see [`crate::stale`]):
//!
//!    | Page | Sources |
//!    |------|---------|
//!    | `title.xhtml`, `toc.xhtml` | `album.xml` |
//!    | `index.html` | `album.xml` |
//!    | `ch001.xhtml` | `ch001/chapter.xml`, `album.xml` |
//!    | `ch001/*.view.xhtml` | `ch001/chapter.xml` |
//!    | `content.opf`, `toc.ncx` (e-book) | `album.xml`, every `chapter.xml` |
//!
//!    `content.opf` is also rewritten when the cover it declares is no longer
//!    the cover on disk.
//!
//! 3. Zip: always for the e-book, for the website only when an output path is
//!    given.
//!
//! Chapters are processed in document order and the first failure stops the
//! build, so every page before it is already current and the next run picks
//! up where this one stopped.
//!
//! ## Progress
//!
//! Callers running the build on a worker thread pass a
//! `Sender<BuildEvent>` and render events as they arrive. A dropped receiver
//! is ignored.

use crate::assets::ensure_static_assets;
use crate::config::AppConfig;
use crate::manifest::{
    self, ChapterView, NCX_FILE, PACKAGE_FILE, chapter_views, plan_package,
};
use crate::model::Album;
use crate::naming;
use crate::package::{self, PackageError};
use crate::pages::{self, FRAMESET_PAGE, TITLE_PAGE, TOC_PAGE};
use crate::stale;
use crate::store::{Store, StoreError, write_atomic};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("album {0} has chapters that could not be loaded")]
    NotLoaded(String),
}

/// What a build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Pages in the album's content folder, optionally zipped.
    Website,
    /// EPUB container.
    #[serde(rename = "ebook")]
    EbookContainer,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Archive path. Defaults to `<data_root>/<dir>.epub` for the e-book;
    /// the website is only zipped when set.
    pub output: Option<PathBuf>,
    /// Regenerate every page regardless of staleness.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Current,
    Written,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    ChapterStarted {
        index: usize,
        title: String,
        photo_count: usize,
    },
    /// `path` is relative to the content root; `chapter` is the 1-based
    /// index of the chapter the page belongs to.
    Page {
        path: String,
        status: PageStatus,
        chapter: Option<usize>,
    },
    Packaged { path: PathBuf, entries: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub target: OutputKind,
    /// Content root holding the generated pages.
    pub folder: PathBuf,
    pub pages_written: usize,
    pub pages_current: usize,
    pub archive: Option<PathBuf>,
    pub entries: usize,
}

/// Default e-book path for an album: `<data_root>/<dir>.epub`.
pub fn default_ebook_path(store: &Store, album_dir: &str) -> PathBuf {
    store.data_root().join(format!("{album_dir}.epub"))
}

struct Regenerator<'a> {
    content: PathBuf,
    force: bool,
    progress: Option<&'a Sender<BuildEvent>>,
    chapter: Option<usize>,
    written: usize,
    current: usize,
}

impl Regenerator<'_> {
    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = self.progress {
            let _ = tx.send(event);
        }
    }

    /// Write `rel` from `render` when it is stale against any of `sources`.
    fn page<F>(&mut self, rel: &str, sources: &[&Path], render: F) -> Result<PageStatus, BuildError>
    where
        F: FnOnce() -> io::Result<Vec<u8>>,
    {
        self.page_unless_current(rel, sources, false, render)
    }

    /// As [`Self::page`], also writing when `outdated` is set.
    fn page_unless_current<F>(
        &mut self,
        rel: &str,
        sources: &[&Path],
        outdated: bool,
        render: F,
    ) -> Result<PageStatus, BuildError>
    where
        F: FnOnce() -> io::Result<Vec<u8>>,
    {
        let path = self.content.join(rel);
        let status = if self.force
            || outdated
            || stale::is_stale_any(&path, sources.iter().copied())
        {
            let bytes = render().map_err(|source| BuildError::Io {
                path: path.clone(),
                source,
            })?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| BuildError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            write_atomic(&path, &bytes)?;
            tracing::info!(page = rel, "wrote page");
            self.written += 1;
            PageStatus::Written
        } else {
            tracing::debug!(page = rel, "page is current");
            self.current += 1;
            PageStatus::Current
        };
        self.emit(BuildEvent::Page {
            path: rel.to_string(),
            status,
            chapter: self.chapter,
        });
        Ok(status)
    }
}

/// Cover path relative to the content root when the file exists.
fn existing_cover<'a>(album: &'a Album, content: &Path) -> Option<&'a str> {
    let cover = album.header().cover.as_str();
    if cover.is_empty() {
        return None;
    }
    if content.join(cover).is_file() {
        Some(cover)
    } else {
        tracing::warn!(album = %album.dir(), cover, "cover file missing, building without it");
        None
    }
}

/// Whether an existing package document declares a different cover than
/// `cover`. The cover file itself is not a staleness source: a deleted cover
/// leaves nothing newer behind.
fn cover_changed(package: &Path, cover: Option<&str>) -> bool {
    match fs::read_to_string(package) {
        Ok(text) => manifest::declared_cover_image(&text).as_deref() != cover,
        Err(_) => false,
    }
}

/// Build `album` for `kind`.
pub fn build(
    store: &Store,
    album: &mut Album,
    config: &AppConfig,
    kind: OutputKind,
    options: &BuildOptions,
    progress: Option<Sender<BuildEvent>>,
) -> Result<BuildReport, BuildError> {
    if album.needs_save() {
        store.save_album(album)?;
    }
    store.load_all(album)?;
    ensure_static_assets(store, album.dir())?;

    let album: &Album = album;
    let dir = album.dir();
    let header = album.header();
    let body = album
        .body()
        .ok_or_else(|| BuildError::NotLoaded(dir.to_string()))?;
    let chapters = chapter_views(album).ok_or_else(|| BuildError::NotLoaded(dir.to_string()))?;

    let content = store.content_root(dir);
    let album_xml_path = store.album_file(dir);
    let album_xml: &Path = &album_xml_path;
    let chapter_xmls: Vec<PathBuf> = chapters
        .iter()
        .map(|c| store.chapter_file(dir, c.dir))
        .collect();

    tracing::info!(album = %dir, target = ?kind, chapters = chapters.len(), "building");
    let mut regen = Regenerator {
        content: content.clone(),
        force: options.force,
        progress: progress.as_ref(),
        chapter: None,
        written: 0,
        current: 0,
    };

    regen.page(TITLE_PAGE, &[album_xml], || {
        Ok(pages::render_title_page(header, body, config).into_bytes())
    })?;
    regen.page(TOC_PAGE, &[album_xml], || {
        let entries = chapters.iter().map(|c| (c.dir, c.title));
        Ok(pages::render_toc_page(entries, config).into_bytes())
    })?;
    regen.page(FRAMESET_PAGE, &[album_xml], || {
        Ok(pages::render_frameset(header, config).into_string().into_bytes())
    })?;

    for (n, (chapter, chapter_xml)) in chapters.iter().zip(&chapter_xmls).enumerate() {
        regenerate_chapter(&mut regen, n + 1, chapter, chapter_xml, album_xml, config)?;
    }
    regen.chapter = None;

    let cover = existing_cover(album, &content);
    if kind == OutputKind::EbookContainer {
        let mut sources: Vec<&Path> = vec![album_xml];
        sources.extend(chapter_xmls.iter().map(PathBuf::as_path));
        let plan = plan_package(&chapters, cover, config);
        let outdated = cover_changed(&content.join(PACKAGE_FILE), cover);
        regen.page_unless_current(PACKAGE_FILE, &sources, outdated, || {
            manifest::render_package_document(header, &plan, config, Utc::now())
        })?;
        regen.page(NCX_FILE, &sources, || {
            manifest::render_ncx(header, &plan, config)
        })?;
    }

    let archive = match (kind, &options.output) {
        (OutputKind::EbookContainer, output) => Some(
            output
                .clone()
                .unwrap_or_else(|| default_ebook_path(store, dir)),
        ),
        (OutputKind::Website, output) => output.clone(),
    };

    let mut entries = 0;
    if let Some(path) = &archive {
        let list = match kind {
            OutputKind::EbookContainer => manifest::ebook_entries(store, dir, &chapters, cover),
            OutputKind::Website => manifest::website_entries(store, dir, &chapters),
        };
        entries = package::write_archive(&list, path).inspect_err(|e| {
            if let PackageError::MissingSource { entry, .. } = e {
                tracing::warn!(album = %dir, entry = %entry, "file missing from disk, archive not written");
            }
        })?;
        regen.emit(BuildEvent::Packaged {
            path: path.clone(),
            entries,
        });
    }

    Ok(BuildReport {
        target: kind,
        folder: content,
        pages_written: regen.written,
        pages_current: regen.current,
        archive,
        entries,
    })
}

fn regenerate_chapter(
    regen: &mut Regenerator<'_>,
    index: usize,
    chapter: &ChapterView<'_>,
    chapter_xml: &Path,
    album_xml: &Path,
    config: &AppConfig,
) -> Result<(), BuildError> {
    regen.emit(BuildEvent::ChapterStarted {
        index,
        title: chapter.title.to_string(),
        photo_count: chapter.body.photo_count(),
    });
    regen.chapter = Some(index);
    let dir = chapter.dir;
    regen.page(
        &naming::chapter_page_name(dir),
        &[chapter_xml, album_xml],
        || Ok(pages::render_chapter_page(dir, chapter.title, chapter.body, config).into_bytes()),
    )?;
    for photo in chapter.body.photos() {
        let rel = format!("{dir}/{}", naming::photo_page_name(&photo.file));
        regen.page(&rel, &[chapter_xml], || {
            Ok(pages::render_photo_page(photo, config).into_bytes())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Orientation;
    use crate::test_helpers::{sample_album, setup_store, write_to_disk};
    use std::io::Read;
    use std::sync::mpsc;
    use std::time::Duration;

    fn website(store: &Store, album: &mut Album) -> BuildReport {
        build(
            store,
            album,
            &AppConfig::default(),
            OutputKind::Website,
            &BuildOptions::default(),
            None,
        )
        .unwrap()
    }

    // =========================================================================
    // Regeneration
    // =========================================================================

    #[test]
    fn first_build_writes_every_page() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);

        let report = website(&store, &mut album);
        // title, toc, index, 2 chapters, 3 photo pages
        assert_eq!(report.pages_written, 8);
        assert_eq!(report.pages_current, 0);
        assert!(report.archive.is_none());

        let content = store.content_root("abc");
        for page in [
            "title.xhtml",
            "toc.xhtml",
            "index.html",
            "ch001.xhtml",
            "ch002.xhtml",
            "ch001/a.view.xhtml",
            "ch001/b.view.xhtml",
            "ch002/c.view.xhtml",
        ] {
            assert!(content.join(page).is_file(), "missing {page}");
        }
        assert!(!content.join("content.opf").exists());
    }

    #[test]
    fn second_build_is_a_no_op() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        website(&store, &mut album);

        let report = website(&store, &mut album);
        assert_eq!(report.pages_written, 0);
        assert_eq!(report.pages_current, 8);
    }

    #[test]
    fn chapter_edit_rebuilds_only_that_chapter() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        website(&store, &mut album);

        std::thread::sleep(Duration::from_millis(50));
        album.chapter_mut(1).unwrap().edit(|b| {
            b.paragraphs[0].photos[0].description = "Fushimi".into();
        });
        let report = website(&store, &mut album);
        assert_eq!(report.pages_written, 2);
        let page = fs::read_to_string(store.content_root("abc").join("ch002/c.view.xhtml")).unwrap();
        assert!(page.contains("Fushimi"));
    }

    #[test]
    fn deleted_page_is_regenerated() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        website(&store, &mut album);

        fs::remove_file(store.content_root("abc").join("toc.xhtml")).unwrap();
        let report = website(&store, &mut album);
        assert_eq!(report.pages_written, 1);
    }

    #[test]
    fn force_rewrites_current_pages() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        website(&store, &mut album);

        let options = BuildOptions {
            force: true,
            ..BuildOptions::default()
        };
        let report = build(
            &store,
            &mut album,
            &AppConfig::default(),
            OutputKind::Website,
            &options,
            None,
        )
        .unwrap();
        assert_eq!(report.pages_written, 8);
    }

    #[test]
    fn two_landscapes_render_as_2x() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        website(&store, &mut album);

        let page = fs::read_to_string(store.content_root("abc").join("ch001.xhtml")).unwrap();
        assert_eq!(page.matches("class=\"landscape2x\"").count(), 2);
        let chapter = album.chapter(0).unwrap().body().unwrap();
        assert!(chapter.photos().all(|p| p.orientation == Orientation::Landscape));
    }

    #[test]
    fn pending_edits_are_saved_first() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        album.set_title("Kyoto Again");
        website(&store, &mut album);

        assert!(!album.needs_save());
        let xml = fs::read_to_string(store.album_file("abc")).unwrap();
        assert!(xml.contains("Kyoto Again"));
        let title = fs::read_to_string(store.content_root("abc").join("title.xhtml")).unwrap();
        assert!(title.contains("Kyoto Again"));
    }

    // =========================================================================
    // Progress
    // =========================================================================

    #[test]
    fn events_follow_document_order() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);

        let (tx, rx) = mpsc::channel();
        build(
            &store,
            &mut album,
            &AppConfig::default(),
            OutputKind::Website,
            &BuildOptions::default(),
            Some(tx),
        )
        .unwrap();
        let events: Vec<BuildEvent> = rx.into_iter().collect();
        let pages: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                BuildEvent::Page { path, .. } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            pages,
            vec![
                "title.xhtml",
                "toc.xhtml",
                "index.html",
                "ch001.xhtml",
                "ch001/a.view.xhtml",
                "ch001/b.view.xhtml",
                "ch002.xhtml",
                "ch002/c.view.xhtml",
            ]
        );
        assert!(matches!(
            &events[3],
            BuildEvent::ChapterStarted { index: 1, photo_count: 2, .. }
        ));
    }

    // =========================================================================
    // Packaging
    // =========================================================================

    #[test]
    fn ebook_goes_to_default_path() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);

        let report = build(
            &store,
            &mut album,
            &AppConfig::default(),
            OutputKind::EbookContainer,
            &BuildOptions::default(),
            None,
        )
        .unwrap();
        let path = default_ebook_path(&store, "abc");
        assert_eq!(report.archive.as_deref(), Some(path.as_path()));
        // title, toc, index, 2 chapters, 3 photo pages, content.opf, toc.ncx
        assert_eq!(report.pages_written, 10);
        assert_eq!(report.entries, 23);
        assert!(store.content_root("abc").join("index.html").is_file());

        let mut archive = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
        let mut first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        let mut text = String::new();
        first.read_to_string(&mut text).unwrap();
        assert_eq!(text, "application/epub+zip");
    }

    fn ebook(store: &Store, album: &mut Album) -> BuildReport {
        build(
            store,
            album,
            &AppConfig::default(),
            OutputKind::EbookContainer,
            &BuildOptions::default(),
            None,
        )
        .unwrap()
    }

    fn archived_package_document(store: &Store) -> (Vec<String>, String) {
        let path = default_ebook_path(store, "abc");
        let mut archive = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
        let names = archive.file_names().map(String::from).collect();
        let mut opf = String::new();
        archive
            .by_name("EPUB/content.opf")
            .unwrap()
            .read_to_string(&mut opf)
            .unwrap();
        (names, opf)
    }

    #[test]
    fn deleted_cover_is_dropped_from_package_document() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        let cover = store.content_root("abc").join("cover.jpg");
        fs::write(&cover, b"jpeg").unwrap();
        album.set_cover_file("cover.jpg");

        ebook(&store, &mut album);
        let (names, opf) = archived_package_document(&store);
        assert!(names.iter().any(|n| n == "EPUB/cover.jpg"));
        assert!(opf.contains(r#"href="cover.jpg""#));

        fs::remove_file(&cover).unwrap();
        let report = ebook(&store, &mut album);
        assert_eq!(report.pages_written, 1);
        let (names, opf) = archived_package_document(&store);
        assert!(!names.iter().any(|n| n == "EPUB/cover.jpg"));
        assert!(!opf.contains("cover.jpg"));
        assert!(!opf.contains("cover-image"));
        assert!(!opf.contains(r#"name="cover""#));
    }

    #[test]
    fn restored_cover_is_declared_again() {
        let (_tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        album.set_cover_file("cover.jpg");

        ebook(&store, &mut album);
        let (_, opf) = archived_package_document(&store);
        assert!(!opf.contains("cover-image"));

        fs::write(store.content_root("abc").join("cover.jpg"), b"jpeg").unwrap();
        let report = ebook(&store, &mut album);
        assert_eq!(report.pages_written, 1);
        let (names, opf) = archived_package_document(&store);
        assert!(names.iter().any(|n| n == "EPUB/cover.jpg"));
        assert!(opf.contains(r#"properties="cover-image""#));

        let report = ebook(&store, &mut album);
        assert_eq!(report.pages_written, 0);
    }

    #[test]
    fn website_zip_only_with_output() {
        let (tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);

        let output = tmp.path().join("site.zip");
        let options = BuildOptions {
            output: Some(output.clone()),
            ..BuildOptions::default()
        };
        let report = build(
            &store,
            &mut album,
            &AppConfig::default(),
            OutputKind::Website,
            &options,
            None,
        )
        .unwrap();
        assert_eq!(report.entries, 16);
        let archive = zip::ZipArchive::new(fs::File::open(&output).unwrap()).unwrap();
        assert!(archive.file_names().all(|n| n != "mimetype" && !n.ends_with(".xml")));
    }

    #[test]
    fn missing_photo_keeps_previous_archive() {
        let (tmp, store) = setup_store();
        let mut album = sample_album("abc");
        write_to_disk(&store, &mut album);
        fs::remove_file(store.chapter_dir("abc", "ch002").join("c.png")).unwrap();

        let output = tmp.path().join("book.epub");
        fs::write(&output, b"previous").unwrap();
        let options = BuildOptions {
            output: Some(output.clone()),
            ..BuildOptions::default()
        };
        let err = build(
            &store,
            &mut album,
            &AppConfig::default(),
            OutputKind::EbookContainer,
            &options,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Package(PackageError::MissingSource { .. })
        ));
        assert_eq!(fs::read(&output).unwrap(), b"previous");
    }

    #[test]
    fn report_serializes_target_name() {
        let report = BuildReport {
            target: OutputKind::EbookContainer,
            folder: PathBuf::from("/data/abc/EPUB"),
            pages_written: 1,
            pages_current: 2,
            archive: None,
            entries: 0,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["target"], "ebook");
        assert_eq!(json["pages_current"], 2);
    }
}
