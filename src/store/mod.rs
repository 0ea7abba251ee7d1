//! The on-disk document store.
//!
//! ## Layout
//!
//! ```text
//! <data_root>/
//! ├── albums.xml                 # registry of album headers
//! ├── config.toml                # optional, see crate::config
//! ├── Thumbs/
//! │   └── <dir>.jpg              # album list thumbnails
//! └── <dir>/                     # one directory per album
//!     ├── mimetype
//!     ├── META-INF/container.xml
//!     └── EPUB/                  # content root
//!         ├── album.xml
//!         ├── style.css, viewer.css
//!         ├── title.xhtml, toc.xhtml, index.html, ch001.xhtml   (derived)
//!         └── ch001/
//!             ├── chapter.xml
//!             ├── dawn.jpg, dawn.view.xhtml
//!             └── thumbs/dawn.jpg
//! ```
//!
//! ## Loading
//!
//! The registry yields header-only albums. [`Store::load_album_body`] reads
//! `album.xml` and attaches a body whose chapters are again header-only;
//! [`Store::load_chapter_body`] reads one `chapter.xml`.
//!
//! ## Saving
//!
//! Every file is written through [`write_atomic`]: a temp file in the target
//! directory that replaces the target only once fully written. Saving an
//! album first saves each dirty chapter; the first failure aborts the save
//! and the album stays dirty.

mod album;
mod chapter;
mod lifecycle;
mod registry;
pub(crate) mod xml;

pub use album::{AlbumFile, parse_album, write_album};
pub use chapter::{parse_chapter, write_chapter};
pub use lifecycle::NewAlbum;
pub use registry::{parse_registry, write_registry};

use crate::model::{Album, AlbumHeader, Chapter, Registry};
use chrono::NaiveDate;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const REGISTRY_FILE: &str = "albums.xml";
pub const ALBUM_FILE: &str = "album.xml";
pub const CHAPTER_FILE: &str = "chapter.xml";
pub const CONTENT_ROOT: &str = "EPUB";
pub const THUMBS_DIR: &str = "thumbs";
pub const LIST_THUMBS_DIR: &str = "Thumbs";

/// The four failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Io,
    Conflict,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{}: file not found", path.display())]
    NotFound { path: PathBuf },
    #[error("{}: XML error: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("{}: invalid date {value:?}: {source}", path.display())]
    Date {
        path: PathBuf,
        value: String,
        source: chrono::ParseError,
    },
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}: already exists", path.display())]
    Conflict { path: PathBuf },
    #[error("{}: not an album archive: {message}", path.display())]
    InvalidArchive { path: PathBuf, message: String },
    #[error("album {dir:?}: {what} is not loaded")]
    NotLoaded { dir: String, what: String },
    #[error("album {dir:?} has no chapter #{index}")]
    NoSuchChapter { dir: String, index: usize },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } | StoreError::NoSuchChapter { .. } => ErrorKind::NotFound,
            StoreError::Parse { .. }
            | StoreError::Date { .. }
            | StoreError::InvalidArchive { .. } => ErrorKind::Parse,
            StoreError::Io { .. } | StoreError::NotLoaded { .. } => ErrorKind::Io,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub(crate) fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Write `bytes` to a temp file beside `path`, then move it over `path`.
///
/// A failure at any step leaves the previous content of `path` untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    tmp.write_all(bytes).map_err(io_error(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_error(path))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(io_error(path))?;
    }
    tmp.persist(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Handle to a data root. Cheap to clone; holds no open files.
#[derive(Debug, Clone)]
pub struct Store {
    data_root: PathBuf,
}

impl Store {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_root.join(REGISTRY_FILE)
    }

    pub fn album_root(&self, album_dir: &str) -> PathBuf {
        self.data_root.join(album_dir)
    }

    pub fn content_root(&self, album_dir: &str) -> PathBuf {
        self.album_root(album_dir).join(CONTENT_ROOT)
    }

    pub fn album_file(&self, album_dir: &str) -> PathBuf {
        self.content_root(album_dir).join(ALBUM_FILE)
    }

    pub fn chapter_dir(&self, album_dir: &str, chapter_dir: &str) -> PathBuf {
        self.content_root(album_dir).join(chapter_dir)
    }

    pub fn chapter_file(&self, album_dir: &str, chapter_dir: &str) -> PathBuf {
        self.chapter_dir(album_dir, chapter_dir).join(CHAPTER_FILE)
    }

    pub fn thumbs_dir(&self, album_dir: &str, chapter_dir: &str) -> PathBuf {
        self.chapter_dir(album_dir, chapter_dir).join(THUMBS_DIR)
    }

    pub fn list_thumbnail(&self, album_dir: &str) -> PathBuf {
        self.data_root
            .join(LIST_THUMBS_DIR)
            .join(format!("{album_dir}.jpg"))
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Read album headers from a registry file. A missing file is an empty list.
    pub fn load_album_headers(path: &Path) -> Result<Vec<AlbumHeader>> {
        match read_text(path) {
            Ok(text) => parse_registry(&text, path),
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!(path = %path.display(), "no registry file, starting empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn load_registry(&self) -> Result<Registry> {
        let headers = Self::load_album_headers(&self.registry_path())?;
        Ok(Registry::new(
            headers.into_iter().map(Album::from_header).collect(),
        ))
    }

    pub fn save_registry(&self, registry: &mut Registry) -> Result<()> {
        let path = self.registry_path();
        fs::create_dir_all(&self.data_root).map_err(io_error(&self.data_root))?;
        let bytes =
            write_registry(registry.albums().iter().map(Album::header)).map_err(io_error(&path))?;
        write_atomic(&path, &bytes)?;
        registry.mark_saved();
        tracing::info!(path = %path.display(), albums = registry.len(), "saved registry");
        Ok(())
    }

    // =========================================================================
    // Album
    // =========================================================================

    /// Parse `album.xml` and attach the body. No-op when already loaded.
    ///
    /// Header fields found in the file replace the registry's copy unless the
    /// album carries unsaved edits.
    pub fn load_album_body(&self, album: &mut Album) -> Result<()> {
        if album.is_loaded() {
            return Ok(());
        }
        let path = self.album_file(album.dir());
        let text = read_text(&path)?;
        let AlbumFile { header, body } = parse_album(&text, &path)?;
        if !album.is_dirty() {
            let current = album.header_mut();
            let refreshed = AlbumHeader {
                dir: current.dir.clone(),
                filename: current.filename.clone(),
                ..header
            };
            if *current != refreshed {
                tracing::debug!(album = %refreshed.dir, "registry header out of date, refreshing");
                *current = refreshed;
                album.mark_header_changed();
            }
        }
        album.attach_body(body);
        Ok(())
    }

    /// Save dirty chapters, then `album.xml` if anything changed.
    pub fn save_album(&self, album: &mut Album) -> Result<()> {
        if !album.is_loaded() {
            self.load_album_body(album)?;
        }
        let dir = album.dir().to_string();
        for chapter in album.chapters_mut() {
            if chapter.is_dirty() && chapter.is_loaded() {
                self.save_chapter(&dir, chapter)?;
            }
        }
        if !album.needs_save() {
            return Ok(());
        }
        let path = self.album_file(&dir);
        let body = album.body().ok_or_else(|| StoreError::NotLoaded {
            dir: dir.clone(),
            what: "album body".to_string(),
        })?;
        let bytes = write_album(album.header(), body).map_err(io_error(&path))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        write_atomic(&path, &bytes)?;
        album.mark_saved();
        tracing::info!(path = %path.display(), "saved album");
        Ok(())
    }

    // =========================================================================
    // Chapter
    // =========================================================================

    /// Parse a chapter's `chapter.xml` and attach the body. No-op when loaded.
    pub fn load_chapter_body(
        &self,
        album_dir: &str,
        chapter: &mut Chapter,
        default_date: NaiveDate,
    ) -> Result<()> {
        if chapter.is_loaded() {
            return Ok(());
        }
        let path = self.chapter_file(album_dir, chapter.dir());
        let text = read_text(&path)?;
        let body = parse_chapter(&text, &path, default_date)?;
        chapter.attach_body(body);
        Ok(())
    }

    /// Load the album body and every chapter body.
    pub fn load_all(&self, album: &mut Album) -> Result<()> {
        self.load_album_body(album)?;
        let dir = album.dir().to_string();
        let default_date = album.header().dates.first();
        for chapter in album.chapters_mut() {
            self.load_chapter_body(&dir, chapter, default_date)?;
        }
        Ok(())
    }

    pub fn save_chapter(&self, album_dir: &str, chapter: &mut Chapter) -> Result<()> {
        let path = self.chapter_file(album_dir, chapter.dir());
        let body = chapter.body().ok_or_else(|| StoreError::NotLoaded {
            dir: album_dir.to_string(),
            what: format!("chapter {}", chapter.dir()),
        })?;
        let bytes = write_chapter(body).map_err(io_error(&path))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        write_atomic(&path, &bytes)?;
        chapter.mark_saved();
        tracing::info!(path = %path.display(), "saved chapter");
        Ok(())
    }
}
