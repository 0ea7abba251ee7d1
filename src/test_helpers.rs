//! Shared test utilities for the album-press test suite.
//!
//! Provides a small two-chapter album fixture, a way to materialize it in a
//! temp data root, and lookup helpers that panic with a clear message on miss.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let (tmp, store) = setup_store();
//! let mut album = sample_album("abc");
//! write_to_disk(&store, &mut album);
//!
//! let chapter = find_chapter(&album, "ch002");
//! assert_eq!(chapter.title(), "Temples");
//! ```

use chrono::NaiveDate;
use std::fs;
use tempfile::TempDir;

use crate::assets::ensure_static_assets;
use crate::model::{
    Album, AlbumBody, AlbumHeader, Chapter, ChapterBody, DateRange, Orientation, Paragraph, Photo,
};
use crate::package::PackageEntry;
use crate::store::Store;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Empty data root in a fresh temp directory.
pub fn setup_store() -> (TempDir, Store) {
    let tmp = TempDir::new().unwrap();
    let store = Store::new(tmp.path().join("data"));
    (tmp, store)
}

fn paragraph(photos: &[(&str, Orientation)]) -> Paragraph {
    let mut para = Paragraph::new(date(2024, 3, 5));
    for (file, orientation) in photos {
        para.photos.push(Photo::new(*file, *orientation));
    }
    para.recompute_thumb_size();
    for photo in &mut para.photos {
        photo.thumb_size = para.thumb_size;
    }
    para
}

/// Loaded album with two chapters:
///
/// - `ch001` "Arrival": `a.jpg`, `b.jpg` (two landscapes)
/// - `ch002` "Temples": `c.png` (portrait)
pub fn sample_album(dir: &str) -> Album {
    let mut header = AlbumHeader::new("3f2c9a7e-0000-4000-8000-000000000001", dir, date(2024, 3, 5));
    header.title = "Kyoto".into();
    header.author = "Mei".into();
    header.location = "Japan".into();
    header.dates = DateRange::new(date(2024, 3, 5), date(2024, 3, 9));

    let arrival = Chapter::new(
        "Arrival",
        "ch001",
        ChapterBody {
            paragraphs: vec![paragraph(&[
                ("a.jpg", Orientation::Landscape),
                ("b.jpg", Orientation::Landscape),
            ])],
        },
    );
    let temples = Chapter::new(
        "Temples",
        "ch002",
        ChapterBody {
            paragraphs: vec![paragraph(&[("c.png", Orientation::Portrait)])],
        },
    );
    Album::new(
        header,
        AlbumBody {
            text: "Spring trip.".into(),
            chapters: vec![arrival, temples],
            ..AlbumBody::default()
        },
    )
}

/// Save the album and create its static assets, photos and thumbnails.
pub fn write_to_disk(store: &Store, album: &mut Album) {
    store.save_album(album).unwrap();
    ensure_static_assets(store, album.dir()).unwrap();
    let album_dir = album.dir().to_string();
    for chapter in album.chapters() {
        let thumbs = store.thumbs_dir(&album_dir, chapter.dir());
        fs::create_dir_all(&thumbs).unwrap();
        let dir = store.chapter_dir(&album_dir, chapter.dir());
        for photo in chapter.body().unwrap().photos() {
            fs::write(dir.join(&photo.file), b"photo").unwrap();
            fs::write(thumbs.join(&photo.file), b"thumb").unwrap();
        }
    }
}

// =========================================================================
// Lookups; panic with a clear message on miss
// =========================================================================

/// Find a chapter by directory name. Panics if not found.
pub fn find_chapter<'a>(album: &'a Album, dir: &str) -> &'a Chapter {
    album
        .chapters()
        .iter()
        .find(|c| c.dir() == dir)
        .unwrap_or_else(|| {
            let dirs: Vec<&str> = album.chapters().iter().map(Chapter::dir).collect();
            panic!("chapter '{dir}' not found. Available: {dirs:?}")
        })
}

/// Archive names in order.
pub fn entry_names(entries: &[PackageEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}
