//! High-level photo operations.
//!
//! These functions combine the model, the store and a backend: they decide
//! which files to copy and which thumbnails to render, call the backend,
//! and leave the chapter dirty for the caller (or save it themselves where
//! noted).
//!
//! ## Thumbnail bookkeeping
//!
//! Each [`Photo`] remembers the multiplier its thumbnail was rendered at.
//! Adding or removing photos changes the paragraph's multiplier, which makes
//! every other photo in that paragraph outdated. [`refresh_thumbnails`]
//! re-renders exactly those.

use super::backend::{BackendError, ImageBackend, ResizeParams};
use super::calculations::{album_list_dimensions, cover_dimensions, thumbnail_dimensions};
use crate::config::ThumbnailsConfig;
use crate::model::{Album, EditingContext, Orientation, Paragraph, Photo};
use crate::naming;
use crate::store::{LIST_THUMBS_DIR, Store, StoreError, THUMBS_DIR};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{}: {source}", path.display())]
    Backend {
        path: PathBuf,
        source: BackendError,
    },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no {0} selected")]
    NoSelection(&'static str),
    #[error("{0:?} is not a photo in this chapter")]
    NoSuchPhoto(String),
    #[error("{}: not a JPEG or PNG image", .0.display())]
    Unsupported(PathBuf),
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// Rendered cover image, relative to the content root.
pub const COVER_FILE: &str = "cover.jpg";

/// Outcome of [`import_photos`].
#[derive(Debug, Default)]
pub struct ImportReport {
    /// File names the photos were stored under, in import order.
    pub imported: Vec<String>,
    /// Inputs rejected for their extension.
    pub skipped: Vec<PathBuf>,
    /// Inputs that failed to copy, identify or thumbnail.
    pub failed: Vec<(PathBuf, String)>,
}

/// Plan a thumbnail render without executing it.
pub fn plan_thumbnail(
    chapter_path: &Path,
    photo: &Photo,
    multiplier: u32,
    config: &ThumbnailsConfig,
) -> ResizeParams {
    let (width, height) = thumbnail_dimensions(photo.orientation, multiplier, config);
    ResizeParams {
        source: chapter_path.join(&photo.file),
        output: chapter_path.join(THUMBS_DIR).join(&photo.file),
        width,
        height,
        crop: true,
    }
}

/// Render every outdated thumbnail of a paragraph.
///
/// A photo's recorded multiplier is updated only when its render succeeds,
/// so failures stay outdated and are retried next time. Returns the indices
/// that failed with their errors.
fn render_outdated(
    paragraph: &mut Paragraph,
    chapter_path: &Path,
    backend: &impl ImageBackend,
    config: &ThumbnailsConfig,
) -> Vec<(usize, BackendError)> {
    let multiplier = paragraph.recompute_thumb_size();
    let mut failures = Vec::new();
    for index in paragraph.outdated_thumbnails() {
        let photo = &mut paragraph.photos[index];
        let params = plan_thumbnail(chapter_path, photo, multiplier, config);
        match backend.resize(&params) {
            Ok(()) => {
                tracing::debug!(photo = %photo.file, multiplier, "rendered thumbnail");
                photo.thumb_size = multiplier;
            }
            Err(e) => failures.push((index, e)),
        }
    }
    failures
}

/// Copy photos into the selected paragraph and render their thumbnails.
///
/// `ctx.chapter` is required. `ctx.paragraph` picks the target paragraph;
/// without it the last paragraph is used (a new one is appended to an empty
/// chapter). Only jpg/jpeg/png inputs are accepted. Each photo is copied
/// under a unique name, its orientation read from its dimensions, and a
/// photo whose thumbnail cannot be rendered is deleted again. The album is
/// saved before returning.
pub fn import_photos(
    store: &Store,
    album: &mut Album,
    ctx: EditingContext,
    files: &[PathBuf],
    backend: &impl ImageBackend,
    config: &ThumbnailsConfig,
) -> Result<ImportReport> {
    let chapter_index = ctx.chapter.ok_or(ImportError::NoSelection("chapter"))?;
    store.load_album_body(album)?;
    let album_dir = album.dir().to_string();
    let default_date = album.header().dates.first();
    let chapter = album
        .chapter_mut(chapter_index)
        .ok_or(StoreError::NoSuchChapter {
            dir: album_dir.clone(),
            index: chapter_index,
        })?;
    store.load_chapter_body(&album_dir, chapter, default_date)?;

    let chapter_path = store.chapter_dir(&album_dir, chapter.dir());
    let thumbs = chapter_path.join(THUMBS_DIR);
    fs::create_dir_all(&thumbs).map_err(|source| ImportError::Io {
        path: thumbs.clone(),
        source,
    })?;

    let mut report = ImportReport::default();
    let outcome = chapter.edit(|body| -> Result<()> {
        if body.paragraphs.is_empty() {
            body.paragraphs.push(Paragraph::new(default_date));
        }
        let paragraph_index = match ctx.paragraph {
            Some(index) if index < body.paragraphs.len() => index,
            Some(_) => return Err(ImportError::NoSelection("paragraph")),
            None => body.paragraphs.len() - 1,
        };
        let paragraph = &mut body.paragraphs[paragraph_index];

        let mut added = Vec::new();
        for source in files {
            if !naming::is_supported_photo(source) {
                tracing::warn!(path = %source.display(), "skipping unsupported file");
                report.skipped.push(source.clone());
                continue;
            }
            match copy_photo(&chapter_path, source, backend) {
                Ok(mut photo) => {
                    // Forces a render in render_outdated.
                    photo.thumb_size = 0;
                    added.push((source.clone(), photo.file.clone()));
                    paragraph.photos.push(photo);
                }
                Err(e) => report.failed.push((source.clone(), e.to_string())),
            }
        }

        let failures = render_outdated(paragraph, &chapter_path, backend, config);
        let mut dropped = Vec::new();
        for (index, error) in failures {
            let file = paragraph.photos[index].file.clone();
            match added.iter().find(|(_, name)| *name == file) {
                Some((source, _)) => {
                    report.failed.push((source.clone(), error.to_string()));
                    dropped.push(file);
                }
                None => {
                    tracing::warn!(photo = %file, error = %error, "thumbnail refresh failed");
                }
            }
        }
        if !dropped.is_empty() {
            for file in &dropped {
                let path = chapter_path.join(file);
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove photo");
                }
            }
            paragraph.photos.retain(|p| !dropped.contains(&p.file));
            // The multiplier may have moved back; re-render what that outdated.
            for (_, error) in render_outdated(paragraph, &chapter_path, backend, config) {
                tracing::warn!(error = %error, "thumbnail refresh failed");
            }
        }

        report.imported = added
            .into_iter()
            .map(|(_, file)| file)
            .filter(|file| !dropped.contains(file))
            .collect();
        Ok(())
    });
    match outcome {
        Some(result) => result?,
        None => {
            return Err(StoreError::NotLoaded {
                dir: album_dir,
                what: "chapter body".to_string(),
            }
            .into());
        }
    }

    store.save_album(album)?;
    tracing::info!(
        album = %album_dir,
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "imported photos"
    );
    Ok(report)
}

/// Copy one photo into the chapter directory and identify it.
///
/// The copy is removed again when the backend cannot read it.
fn copy_photo(chapter_path: &Path, source: &Path, backend: &impl ImageBackend) -> Result<Photo> {
    let original = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".to_string());
    let file = naming::unique_file_name(chapter_path, &original);
    let target = chapter_path.join(&file);
    fs::copy(source, &target).map_err(|e| ImportError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    match backend.identify(&target) {
        Ok(dims) => Ok(Photo::new(
            file,
            Orientation::from_dimensions(dims.width, dims.height),
        )),
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&target) {
                tracing::warn!(path = %target.display(), error = %cleanup, "could not remove photo");
            }
            Err(ImportError::Backend {
                path: source.to_path_buf(),
                source: e,
            })
        }
    }
}

/// Re-render outdated thumbnails in every chapter of an album.
///
/// Returns the number of thumbnails rendered. Failures are logged and the
/// affected photos stay outdated. Chapters that changed are saved.
pub fn refresh_thumbnails(
    store: &Store,
    album: &mut Album,
    backend: &impl ImageBackend,
    config: &ThumbnailsConfig,
) -> Result<usize> {
    store.load_all(album)?;
    let album_dir = album.dir().to_string();
    let mut rendered = 0;
    for chapter in album.chapters_mut() {
        let needs_work = chapter.body().is_some_and(|b| {
            b.paragraphs.iter().any(|p| {
                let mut recomputed = p.clone();
                recomputed.recompute_thumb_size();
                recomputed.thumb_size != p.thumb_size
                    || !recomputed.outdated_thumbnails().is_empty()
            })
        });
        if !needs_work {
            continue;
        }
        let chapter_path = store.chapter_dir(&album_dir, chapter.dir());
        let thumbs = chapter_path.join(THUMBS_DIR);
        fs::create_dir_all(&thumbs).map_err(|source| ImportError::Io {
            path: thumbs.clone(),
            source,
        })?;
        chapter.edit(|body| {
            for paragraph in &mut body.paragraphs {
                let outdated = {
                    let mut recomputed = paragraph.clone();
                    recomputed.recompute_thumb_size();
                    recomputed.outdated_thumbnails().len()
                };
                let failures = render_outdated(paragraph, &chapter_path, backend, config);
                rendered += outdated - failures.len();
                for (index, error) in failures {
                    tracing::warn!(
                        photo = %paragraph.photos[index].file,
                        error = %error,
                        "thumbnail refresh failed"
                    );
                }
            }
        });
    }
    store.save_album(album)?;
    tracing::info!(album = %album_dir, rendered, "refreshed thumbnails");
    Ok(rendered)
}

/// Remove a photo from a paragraph and delete its file, page and thumbnail.
///
/// The paragraph's other thumbnails may become outdated; call
/// [`refresh_thumbnails`] afterwards. The album is saved.
pub fn remove_photo(store: &Store, album: &mut Album, ctx: EditingContext) -> Result<Photo> {
    let chapter_index = ctx.chapter.ok_or(ImportError::NoSelection("chapter"))?;
    let paragraph_index = ctx.paragraph.ok_or(ImportError::NoSelection("paragraph"))?;
    let photo_index = ctx.photo.ok_or(ImportError::NoSelection("photo"))?;
    store.load_album_body(album)?;
    let album_dir = album.dir().to_string();
    let default_date = album.header().dates.first();
    let chapter = album
        .chapter_mut(chapter_index)
        .ok_or(StoreError::NoSuchChapter {
            dir: album_dir.clone(),
            index: chapter_index,
        })?;
    store.load_chapter_body(&album_dir, chapter, default_date)?;
    let chapter_path = store.chapter_dir(&album_dir, chapter.dir());

    let removed = chapter
        .edit(|body| {
            let paragraph = body.paragraphs.get_mut(paragraph_index)?;
            if photo_index >= paragraph.photos.len() {
                return None;
            }
            let photo = paragraph.photos.remove(photo_index);
            paragraph.recompute_thumb_size();
            Some(photo)
        })
        .flatten()
        .ok_or(ImportError::NoSelection("photo"))?;

    for path in [
        chapter_path.join(&removed.file),
        chapter_path.join(naming::photo_page_name(&removed.file)),
        chapter_path.join(THUMBS_DIR).join(&removed.file),
    ] {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(ImportError::Io { path, source }),
        }
    }
    store.save_album(album)?;
    tracing::info!(album = %album_dir, photo = %removed.file, "removed photo");
    Ok(removed)
}

/// Choose a photo as the album's cover source (`<chapter dir>/<file>`) and
/// refresh the list thumbnail from it. The album is saved.
pub fn set_cover_source(
    store: &Store,
    album: &mut Album,
    chapter_index: usize,
    file: &str,
    backend: &impl ImageBackend,
    config: &ThumbnailsConfig,
) -> Result<()> {
    store.load_album_body(album)?;
    let album_dir = album.dir().to_string();
    let chapter_dir = album
        .chapter(chapter_index)
        .ok_or(StoreError::NoSuchChapter {
            dir: album_dir.clone(),
            index: chapter_index,
        })?
        .dir()
        .to_string();
    if !store.chapter_dir(&album_dir, &chapter_dir).join(file).is_file() {
        return Err(ImportError::NoSuchPhoto(file.to_string()));
    }
    let raw = format!("{chapter_dir}/{file}");
    album.edit_cover(|cover| cover.raw = raw);
    store.save_album(album)?;
    refresh_album_thumbnail(store, album, backend, config)?;
    Ok(())
}

/// Crop `source` into the album's cover image and refresh the list thumbnail
/// from it. The album is saved.
///
/// A failed render leaves the album untouched.
pub fn set_cover_image(
    store: &Store,
    album: &mut Album,
    source: &Path,
    backend: &impl ImageBackend,
    config: &ThumbnailsConfig,
) -> Result<()> {
    if !naming::is_supported_photo(source) {
        return Err(ImportError::Unsupported(source.to_path_buf()));
    }
    store.load_album_body(album)?;
    let content = store.content_root(album.dir());
    fs::create_dir_all(&content).map_err(|e| ImportError::Io {
        path: content.clone(),
        source: e,
    })?;
    let (width, height) = cover_dimensions(config);
    let params = ResizeParams {
        source: source.to_path_buf(),
        output: content.join(COVER_FILE),
        width,
        height,
        crop: true,
    };
    backend.resize(&params).map_err(|e| ImportError::Backend {
        path: source.to_path_buf(),
        source: e,
    })?;

    album.set_cover_file(COVER_FILE);
    store.save_album(album)?;
    tracing::info!(album = %album.dir(), "rendered cover image");
    refresh_album_thumbnail(store, album, backend, config)?;
    Ok(())
}

/// Forget the album's cover and cover source, deleting the rendered cover
/// image and the list thumbnail. The album is saved.
///
/// A cover inside a chapter folder is one of the photos and stays on disk.
/// Returns `false` when the album had no cover.
pub fn remove_cover(store: &Store, album: &mut Album) -> Result<bool> {
    store.load_album_body(album)?;
    let cover = album.header().cover.clone();
    let raw = album.body().map(|b| b.cover.raw.clone()).unwrap_or_default();
    if cover.trim().is_empty() && raw.trim().is_empty() {
        return Ok(false);
    }

    let mut doomed = vec![store.list_thumbnail(album.dir())];
    if !cover.trim().is_empty() && !cover.contains('/') {
        doomed.push(store.content_root(album.dir()).join(&cover));
    }
    for path in doomed {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(ImportError::Io { path, source }),
        }
    }

    album.set_cover_file("");
    album.edit_cover(|c| c.raw.clear());
    store.save_album(album)?;
    tracing::info!(album = %album.dir(), "removed cover");
    Ok(true)
}

/// Render `Thumbs/<dir>.jpg` for the album list.
///
/// The source is the rendered cover file when the album has one, otherwise
/// the raw cover photo. Returns `false` when neither exists.
pub fn refresh_album_thumbnail(
    store: &Store,
    album: &Album,
    backend: &impl ImageBackend,
    config: &ThumbnailsConfig,
) -> Result<bool> {
    let content = store.content_root(album.dir());
    let raw = album.body().map(|b| b.cover.raw.as_str()).unwrap_or("");
    let source = [album.header().cover.as_str(), raw]
        .into_iter()
        .filter(|rel| !rel.trim().is_empty())
        .map(|rel| content.join(rel))
        .find(|path| path.is_file());
    let Some(source) = source else {
        tracing::debug!(album = %album.dir(), "no cover to render a list thumbnail from");
        return Ok(false);
    };

    let list_dir = store.data_root().join(LIST_THUMBS_DIR);
    fs::create_dir_all(&list_dir).map_err(|e| ImportError::Io {
        path: list_dir.clone(),
        source: e,
    })?;
    let (width, height) = album_list_dimensions(config);
    let params = ResizeParams {
        source: source.clone(),
        output: store.list_thumbnail(album.dir()),
        width,
        height,
        crop: true,
    };
    backend
        .resize(&params)
        .map_err(|e| ImportError::Backend { path: source, source: e })?;
    tracing::info!(album = %album.dir(), "rendered album list thumbnail");
    Ok(true)
}
