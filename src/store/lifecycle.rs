//! Creating, renaming and deleting albums and chapters on disk.
//!
//! Each operation keeps the model and the filesystem in step and saves the
//! affected files before returning, so a crash between operations never
//! leaves a registry entry pointing at a missing directory.

use super::{
    ALBUM_FILE, CONTENT_ROOT, Result, Store, StoreError, THUMBS_DIR, io_error, parse_album,
    remove_file_if_exists,
};
use crate::assets;
use crate::model::{Album, AlbumBody, AlbumHeader, Chapter, ChapterBody, Paragraph, Registry};
use crate::naming;
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::Path;

/// Fields a new album starts with.
#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub title: String,
    pub author: String,
    pub location: String,
    pub date: NaiveDate,
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn no_such_chapter(album: &Album, index: usize) -> StoreError {
    StoreError::NoSuchChapter {
        dir: album.dir().to_string(),
        index,
    }
}

impl Store {
    /// A fresh album directory name that does not exist yet.
    fn fresh_album_dir(&self, registry: &Registry) -> String {
        let mut stamp = chrono::Utc::now().timestamp_millis();
        loop {
            let dir = naming::album_dir_name(stamp);
            if registry.find(&dir).is_none() && !self.album_root(&dir).exists() {
                return dir;
            }
            stamp += 1;
        }
    }

    /// Create an album with one empty chapter and register it.
    ///
    /// Returns the album's index in the registry.
    pub fn create_album(
        &self,
        registry: &mut Registry,
        new: NewAlbum,
        chapter_title: &str,
    ) -> Result<usize> {
        let dir = self.fresh_album_dir(registry);
        assets::ensure_static_assets(self, &dir)?;

        let mut header = AlbumHeader::new(uuid::Uuid::new_v4().to_string(), &dir, new.date);
        header.title = new.title;
        header.author = new.author;
        header.location = new.location;

        let first_chapter = naming::chapter_dir_name(1);
        let thumbs = self.thumbs_dir(&dir, &first_chapter);
        fs::create_dir_all(&thumbs).map_err(io_error(&thumbs))?;
        let chapter = Chapter::new(
            chapter_title,
            first_chapter,
            ChapterBody {
                paragraphs: vec![Paragraph::new(new.date)],
            },
        );
        let mut album = Album::new(
            header,
            AlbumBody {
                chapters: vec![chapter],
                ..AlbumBody::default()
            },
        );
        self.save_album(&mut album)?;

        let index = registry.push(album);
        self.save_registry(registry)?;
        tracing::info!(album = %dir, "created album");
        Ok(index)
    }

    /// Delete an album directory, its list thumbnail and its registry entry.
    pub fn delete_album(&self, registry: &mut Registry, index: usize) -> Result<Album> {
        let dir = match registry.album(index) {
            Some(album) => album.dir().to_string(),
            None => {
                return Err(StoreError::NotFound {
                    path: self.registry_path(),
                });
            }
        };
        remove_dir_if_exists(&self.album_root(&dir))?;
        remove_file_if_exists(&self.list_thumbnail(&dir))?;
        let album = registry.remove(index).ok_or_else(|| StoreError::NotFound {
            path: self.album_root(&dir),
        })?;
        self.save_registry(registry)?;
        tracing::info!(album = %dir, "deleted album");
        Ok(album)
    }

    /// Append a chapter in the first free `chNNN` directory.
    pub fn create_chapter(&self, album: &mut Album, title: &str) -> Result<usize> {
        self.load_album_body(album)?;
        let dir = (1u32..)
            .map(naming::chapter_dir_name)
            .find(|d| {
                album.find_chapter(d).is_none() && !self.chapter_dir(album.dir(), d).exists()
            })
            .unwrap_or_else(|| naming::chapter_dir_name(album.chapters().len() as u32 + 1));

        let thumbs = self.thumbs_dir(album.dir(), &dir);
        fs::create_dir_all(&thumbs).map_err(io_error(&thumbs))?;
        let body = ChapterBody {
            paragraphs: vec![Paragraph::new(album.header().dates.first())],
        };
        let index = album
            .push_chapter(Chapter::new(title, &dir, body))
            .ok_or_else(|| StoreError::NotLoaded {
                dir: album.dir().to_string(),
                what: "album body".to_string(),
            })?;
        self.save_album(album)?;
        tracing::info!(album = %album.dir(), chapter = %dir, "created chapter");
        Ok(index)
    }

    /// Move a chapter to a new directory name.
    ///
    /// Fails with [`StoreError::Conflict`] when the target already exists on
    /// disk; the original directory is untouched in that case. The derived
    /// chapter page is removed so the next build regenerates it.
    pub fn rename_chapter(&self, album: &mut Album, index: usize, new_dir: &str) -> Result<()> {
        self.load_album_body(album)?;
        let album_dir = album.dir().to_string();
        let old_dir = album
            .chapter(index)
            .ok_or_else(|| no_such_chapter(album, index))?
            .dir()
            .to_string();
        let new_dir = naming::safe_name(new_dir.trim());
        if new_dir == old_dir {
            return Ok(());
        }

        let target = self.chapter_dir(&album_dir, &new_dir);
        if new_dir.is_empty() || target.exists() || album.find_chapter(&new_dir).is_some() {
            return Err(StoreError::Conflict { path: target });
        }

        let source = self.chapter_dir(&album_dir, &old_dir);
        fs::rename(&source, &target).map_err(io_error(&source))?;
        let content = self.content_root(&album_dir);
        remove_file_if_exists(&content.join(naming::chapter_page_name(&old_dir)))?;

        if let Some(chapter) = album.chapter_mut(index) {
            chapter.set_dir(&new_dir);
        }
        let old_prefix = format!("{old_dir}/");
        if let Some(rest) = album.header().cover.strip_prefix(&old_prefix) {
            let cover = format!("{new_dir}/{rest}");
            album.set_cover_file(cover);
        }
        album.edit_cover(|cover| {
            if let Some(rest) = cover.raw.strip_prefix(&old_prefix) {
                cover.raw = format!("{new_dir}/{rest}");
            }
        });
        self.save_album(album)?;
        tracing::info!(album = %album_dir, from = %old_dir, to = %new_dir, "renamed chapter");
        Ok(())
    }

    /// Remove a chapter, its directory and its derived page.
    pub fn delete_chapter(&self, album: &mut Album, index: usize) -> Result<Chapter> {
        self.load_album_body(album)?;
        let album_dir = album.dir().to_string();
        let chapter_dir = album
            .chapter(index)
            .ok_or_else(|| no_such_chapter(album, index))?
            .dir()
            .to_string();
        let content = self.content_root(&album_dir);
        remove_file_if_exists(&content.join(naming::chapter_page_name(&chapter_dir)))?;
        remove_dir_if_exists(&self.chapter_dir(&album_dir, &chapter_dir))?;
        let chapter = album
            .remove_chapter(index)
            .ok_or_else(|| no_such_chapter(album, index))?;
        self.save_album(album)?;
        tracing::info!(album = %album_dir, chapter = %chapter_dir, "deleted chapter");
        Ok(chapter)
    }

    /// Remove a paragraph and delete its photos, photo pages and thumbnails.
    pub fn remove_paragraph(
        &self,
        album: &mut Album,
        chapter_index: usize,
        paragraph_index: usize,
    ) -> Result<Paragraph> {
        self.load_album_body(album)?;
        let album_dir = album.dir().to_string();
        let default_date = album.header().dates.first();
        let chapter = album
            .chapter_mut(chapter_index)
            .ok_or_else(|| StoreError::NoSuchChapter {
                dir: album_dir.clone(),
                index: chapter_index,
            })?;
        self.load_chapter_body(&album_dir, chapter, default_date)?;

        let chapter_path = self.chapter_dir(&album_dir, chapter.dir());
        let removed = chapter
            .edit(|body| {
                (paragraph_index < body.paragraphs.len())
                    .then(|| body.paragraphs.remove(paragraph_index))
            })
            .flatten()
            .ok_or_else(|| StoreError::NotFound {
                path: chapter_path.join(super::CHAPTER_FILE),
            })?;

        for photo in &removed.photos {
            remove_file_if_exists(&chapter_path.join(&photo.file))?;
            remove_file_if_exists(&chapter_path.join(naming::photo_page_name(&photo.file)))?;
            remove_file_if_exists(&chapter_path.join(THUMBS_DIR).join(&photo.file))?;
        }
        self.save_album(album)?;
        Ok(removed)
    }

    /// Import an album from an e-book archive produced by this tool.
    ///
    /// The archive must contain `EPUB/album.xml`. It is extracted into a new
    /// album directory, which is removed again if registration fails.
    pub fn import_album(&self, registry: &mut Registry, archive: &Path) -> Result<usize> {
        let file = fs::File::open(archive).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: archive.to_path_buf(),
                }
            } else {
                StoreError::Io {
                    path: archive.to_path_buf(),
                    source,
                }
            }
        })?;
        let invalid = |message: String| StoreError::InvalidArchive {
            path: archive.to_path_buf(),
            message,
        };
        let mut zip = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;
        let album_entry = format!("{CONTENT_ROOT}/{ALBUM_FILE}");
        if zip.by_name(&album_entry).is_err() {
            return Err(invalid(format!("missing {album_entry}")));
        }

        let dir = self.fresh_album_dir(registry);
        let root = self.album_root(&dir);
        fs::create_dir_all(&root).map_err(io_error(&root))?;
        let registered = zip
            .extract(&root)
            .map_err(|e| invalid(e.to_string()))
            .and_then(|()| self.register_extracted(registry, &dir, archive));
        match registered {
            Ok(index) => {
                tracing::info!(album = %dir, archive = %archive.display(), "imported album");
                Ok(index)
            }
            Err(e) => {
                if let Err(cleanup) = remove_dir_if_exists(&root) {
                    tracing::warn!(error = %cleanup, "could not remove partial import");
                }
                Err(e)
            }
        }
    }

    fn register_extracted(&self, registry: &mut Registry, dir: &str, archive: &Path) -> Result<usize> {
        assets::ensure_static_assets(self, dir)?;
        let path = self.album_file(dir);
        let text = super::read_text(&path)?;
        let parsed = parse_album(&text, &path)?;

        let mut header = parsed.header;
        header.dir = dir.to_string();
        header.filename = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if header.identifier.is_empty()
            || registry
                .albums()
                .iter()
                .any(|a| a.header().identifier == header.identifier)
        {
            header.identifier = uuid::Uuid::new_v4().to_string();
        }

        let mut album = Album::new(header, parsed.body);
        self.save_album(&mut album)?;
        let index = registry.push(album);
        self.save_registry(registry)?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Orientation, Photo};
    use crate::store::ErrorKind;
    use crate::test_helpers::date;
    use std::io::Write;
    use tempfile::TempDir;

    fn new_album() -> NewAlbum {
        NewAlbum {
            title: "Kyoto".into(),
            author: "Mei".into(),
            location: "Japan".into(),
            date: date(2024, 3, 5),
        }
    }

    fn setup() -> (TempDir, Store, Registry, usize) {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let mut registry = Registry::default();
        let index = store
            .create_album(&mut registry, new_album(), "(New Chapter)")
            .unwrap();
        (tmp, store, registry, index)
    }

    // =========================================================================
    // Albums
    // =========================================================================

    #[test]
    fn create_album_writes_layout_and_registry() {
        let (_tmp, store, registry, index) = setup();
        let album = registry.album(index).unwrap();
        let dir = album.dir();

        assert!(store.album_root(dir).join("mimetype").exists());
        assert!(store.album_root(dir).join("META-INF/container.xml").exists());
        assert!(store.content_root(dir).join("style.css").exists());
        assert!(store.album_file(dir).exists());
        assert!(store.chapter_file(dir, "ch001").exists());
        assert!(store.thumbs_dir(dir, "ch001").is_dir());
        assert!(!registry.needs_save());
        assert_eq!(album.chapter(0).unwrap().title(), "(New Chapter)");

        let reloaded = store.load_registry().unwrap();
        assert_eq!(reloaded.albums()[0].header().identifier, album.header().identifier);
        assert_eq!(album.header().identifier.len(), 36);
    }

    #[test]
    fn delete_album_removes_directory() {
        let (_tmp, store, mut registry, index) = setup();
        let dir = registry.album(index).unwrap().dir().to_string();
        store.delete_album(&mut registry, index).unwrap();
        assert!(!store.album_root(&dir).exists());
        assert!(store.load_registry().unwrap().is_empty());
    }

    // =========================================================================
    // Chapters
    // =========================================================================

    #[test]
    fn create_chapter_uses_first_free_dir() {
        let (_tmp, store, mut registry, index) = setup();
        let album = registry.album_mut(index).unwrap();
        let dir = album.dir().to_string();
        fs::create_dir_all(store.chapter_dir(&dir, "ch002")).unwrap();

        let i = store.create_chapter(album, "Second").unwrap();
        assert_eq!(album.chapter(i).unwrap().dir(), "ch003");
        assert!(store.chapter_file(&dir, "ch003").exists());
        assert!(!album.needs_save());
    }

    #[test]
    fn rename_chapter_conflict_leaves_original() {
        let (_tmp, store, mut registry, index) = setup();
        let album = registry.album_mut(index).unwrap();
        let dir = album.dir().to_string();
        store.create_chapter(album, "Second").unwrap();

        let err = store.rename_chapter(album, 0, "ch002").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(store.chapter_file(&dir, "ch001").exists());
        assert_eq!(album.chapter(0).unwrap().dir(), "ch001");
    }

    #[test]
    fn rename_chapter_moves_cover_paths() {
        let (_tmp, store, mut registry, index) = setup();
        let album = registry.album_mut(index).unwrap();
        let dir = album.dir().to_string();
        fs::write(store.chapter_dir(&dir, "ch001").join("a.jpg"), b"jpeg").unwrap();
        album.set_cover_file("ch001/a.jpg");
        album.edit_cover(|cover| cover.raw = "ch001/a.jpg".to_string());

        store.rename_chapter(album, 0, "arrival").unwrap();
        assert_eq!(album.header().cover, "arrival/a.jpg");
        let raw = album.body().unwrap().cover.raw.clone();
        assert_eq!(raw, "arrival/a.jpg");
        assert!(store.content_root(&dir).join(&raw).is_file());
    }

    #[test]
    fn rename_chapter_moves_directory_and_drops_page() {
        let (_tmp, store, mut registry, index) = setup();
        let album = registry.album_mut(index).unwrap();
        let dir = album.dir().to_string();
        let page = store.content_root(&dir).join("ch001.xhtml");
        fs::write(&page, "old").unwrap();
        album.set_cover_file("ch001/dawn.jpg");

        store.rename_chapter(album, 0, "arrival").unwrap();
        assert!(!page.exists());
        assert!(store.chapter_file(&dir, "arrival").exists());
        assert!(!store.chapter_dir(&dir, "ch001").exists());
        assert_eq!(album.chapter(0).unwrap().dir(), "arrival");
        assert_eq!(album.header().cover, "arrival/dawn.jpg");

        let mut reloaded = Album::from_header(album.header().clone());
        store.load_album_body(&mut reloaded).unwrap();
        assert_eq!(reloaded.chapter(0).unwrap().dir(), "arrival");
    }

    #[test]
    fn delete_chapter_removes_folder_and_page() {
        let (_tmp, store, mut registry, index) = setup();
        let album = registry.album_mut(index).unwrap();
        let dir = album.dir().to_string();
        let page = store.content_root(&dir).join("ch001.xhtml");
        fs::write(&page, "old").unwrap();

        store.delete_chapter(album, 0).unwrap();
        assert!(!page.exists());
        assert!(!store.chapter_dir(&dir, "ch001").exists());
        assert!(album.chapters().is_empty());
    }

    #[test]
    fn remove_paragraph_deletes_photo_files() {
        let (_tmp, store, mut registry, index) = setup();
        let album = registry.album_mut(index).unwrap();
        let dir = album.dir().to_string();
        let chapter_path = store.chapter_dir(&dir, "ch001");
        for f in ["a.jpg", "a.view.xhtml", "thumbs/a.jpg"] {
            fs::write(chapter_path.join(f), b"x").unwrap();
        }
        album.chapter_mut(0).unwrap().edit(|b| {
            b.paragraphs[0]
                .photos
                .push(Photo::new("a.jpg", Orientation::Landscape))
        });

        let removed = store.remove_paragraph(album, 0, 0).unwrap();
        assert_eq!(removed.photos.len(), 1);
        assert!(!chapter_path.join("a.jpg").exists());
        assert!(!chapter_path.join("a.view.xhtml").exists());
        assert!(!chapter_path.join("thumbs/a.jpg").exists());
        assert_eq!(album.chapter(0).unwrap().photo_count(), 0);
    }

    // =========================================================================
    // Import
    // =========================================================================

    #[test]
    fn import_rejects_archive_without_album_xml() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path().join("data"));
        let archive = tmp.path().join("book.epub");
        let mut zip = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        zip.start_file("mimetype", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.finish().unwrap();

        let mut registry = Registry::default();
        let err = store.import_album(&mut registry, &archive).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArchive { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn import_missing_archive_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let mut registry = Registry::default();
        let err = store
            .import_album(&mut registry, &tmp.path().join("nope.epub"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
