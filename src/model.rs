//! The in-memory album document.
//!
//! ```text
//! Registry ──owns──> Album ──owns──> Chapter ──owns──> Paragraph ──owns──> Photo
//!                      │                │
//!                      └─ body: Option  └─ body: Option   (lazily loaded)
//! ```
//!
//! Albums and chapters exist in two states. The *header* (titles, dates,
//! directory names, cached photo count) is always present because it comes
//! from the parent's file. The *body* is `None` until the store parses the
//! entity's own XML file.
//!
//! ## Dirty tracking
//!
//! Each entity records which file must be rewritten:
//!
//! | Flag | Set by | File to rewrite |
//! |------|--------|-----------------|
//! | `Chapter::dirty` | [`Chapter::edit`] | `chapter.xml` |
//! | `Chapter::header_changed` | title, dir or photo count change | `album.xml` |
//! | `Album::dirty` | any album setter | `album.xml` |
//! | `Album::header_changed` | title, dates, author, location, cover | `albums.xml` |
//! | `Registry::modified` | album added or removed | `albums.xml` |
//!
//! Children never point at their parents. Instead the parents aggregate:
//! [`Album::needs_save`] and [`Registry::needs_save`] walk their children.

use chrono::NaiveDate;

/// Thumbnail multiplier a paragraph starts with before any photo is added.
pub const DEFAULT_THUMB_SIZE: u32 = 4;

/// Photo orientation, fixed at import time from pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    /// Portrait only when strictly taller than wide; squares are landscape.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    /// Layout blocks the photo occupies in a paragraph row.
    pub fn blocks(self) -> u32 {
        match self {
            Orientation::Landscape => 2,
            Orientation::Portrait => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "landscape" => Some(Orientation::Landscape),
            "portrait" => Some(Orientation::Portrait),
            _ => None,
        }
    }
}

/// Map a paragraph's layout block count to its thumbnail multiplier.
///
/// A row is 8 units wide and should show two thumbnails per visual row:
/// `blocks < 3 → 4`, `3..5 → 2`, `≥ 5 → 1`.
pub fn thumbnail_multiplier(blocks: u32) -> u32 {
    match blocks {
        0..=2 => 4,
        3..=4 => 2,
        _ => 1,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    /// File name inside the chapter directory.
    pub file: String,
    pub orientation: Orientation,
    /// Multiplier the current thumbnail was rendered with.
    pub thumb_size: u32,
    pub description: String,
}

impl Photo {
    pub fn new(file: impl Into<String>, orientation: Orientation) -> Self {
        Self {
            file: file.into(),
            orientation,
            thumb_size: DEFAULT_THUMB_SIZE,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub title: String,
    pub location: String,
    pub location_visible: bool,
    pub date: NaiveDate,
    pub date_visible: bool,
    pub text: String,
    /// Derived from the photos, see [`Paragraph::recompute_thumb_size`].
    pub thumb_size: u32,
    pub photos: Vec<Photo>,
}

impl Paragraph {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            title: String::new(),
            location: String::new(),
            location_visible: false,
            date,
            date_visible: true,
            text: String::new(),
            thumb_size: DEFAULT_THUMB_SIZE,
            photos: Vec::new(),
        }
    }

    pub fn layout_blocks(&self) -> u32 {
        self.photos.iter().map(|p| p.orientation.blocks()).sum()
    }

    /// Recompute the multiplier from the current photos and return it.
    pub fn recompute_thumb_size(&mut self) -> u32 {
        self.thumb_size = thumbnail_multiplier(self.layout_blocks());
        self.thumb_size
    }

    /// Indices of photos whose thumbnail was rendered at another multiplier.
    pub fn outdated_thumbnails(&self) -> Vec<usize> {
        self.photos
            .iter()
            .enumerate()
            .filter(|(_, p)| p.thumb_size != self.thumb_size)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Lazily loaded content of a chapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterBody {
    pub paragraphs: Vec<Paragraph>,
}

impl ChapterBody {
    pub fn photo_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.photos.len()).sum()
    }

    pub fn photos(&self) -> impl Iterator<Item = &Photo> {
        self.paragraphs.iter().flat_map(|p| p.photos.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Chapter {
    title: String,
    dir: String,
    photo_count: usize,
    body: Option<ChapterBody>,
    dirty: bool,
    header_changed: bool,
}

impl Chapter {
    /// Header-only chapter, as listed in `album.xml`.
    pub fn from_header(title: impl Into<String>, dir: impl Into<String>, photo_count: usize) -> Self {
        Self {
            title: title.into(),
            dir: dir.into(),
            photo_count,
            body: None,
            dirty: false,
            header_changed: false,
        }
    }

    /// Brand-new chapter with a loaded body. Starts dirty.
    pub fn new(title: impl Into<String>, dir: impl Into<String>, body: ChapterBody) -> Self {
        Self {
            title: title.into(),
            dir: dir.into(),
            photo_count: body.photo_count(),
            body: Some(body),
            dirty: true,
            header_changed: true,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn photo_count(&self) -> usize {
        self.photo_count
    }

    pub fn body(&self) -> Option<&ChapterBody> {
        self.body.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn header_changed(&self) -> bool {
        self.header_changed
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.header_changed = true;
    }

    pub(crate) fn set_dir(&mut self, dir: impl Into<String>) {
        self.dir = dir.into();
        self.header_changed = true;
    }

    /// Install a body parsed from disk. The cached count is left alone so a
    /// stale count stays visible until the next edit recounts it.
    pub(crate) fn attach_body(&mut self, body: ChapterBody) {
        self.body = Some(body);
    }

    /// Mutate paragraphs and photos. Returns `None` when the body is not loaded.
    ///
    /// Marks the chapter dirty and re-derives the cached photo count.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut ChapterBody) -> R) -> Option<R> {
        let body = self.body.as_mut()?;
        let result = f(body);
        let count = body.photo_count();
        if count != self.photo_count {
            self.photo_count = count;
            self.header_changed = true;
        }
        self.dirty = true;
        Some(result)
    }

    /// Re-derive the cached photo count from the loaded body.
    pub fn recount_photos(&mut self) -> usize {
        if let Some(count) = self.body.as_ref().map(ChapterBody::photo_count) {
            if count != self.photo_count {
                self.photo_count = count;
                self.header_changed = true;
            }
        }
        self.photo_count
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_header_saved(&mut self) {
        self.header_changed = false;
    }
}

/// 24-bit color stored as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xFF, 0xFF, 0xFF);

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Settings of the cover editor. Stored only; no rendering happens here.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverConfig {
    pub font: String,
    pub style: u32,
    pub text_size: u32,
    pub text_color: Rgb,
    pub background: u32,
    /// Raw photo chosen as cover source, relative to the content root.
    pub raw: String,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            font: "Ariel".to_string(),
            style: 0,
            text_size: 48,
            text_color: Rgb::WHITE,
            background: 0,
            raw: String::new(),
        }
    }
}

/// Inclusive album date range with `last >= first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    first: NaiveDate,
    last: NaiveDate,
}

impl DateRange {
    /// A `last` before `first` is clamped up to `first`.
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            first,
            last: last.max(first),
        }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn is_single_day(&self) -> bool {
        self.first == self.last
    }

    /// Move the start. The end follows when it would fall before it.
    pub fn set_first(&mut self, first: NaiveDate) {
        self.first = first;
        self.last = self.last.max(first);
    }

    /// Move the end, never before the start.
    pub fn set_last(&mut self, last: NaiveDate) {
        self.last = last.max(self.first);
    }

    /// Grow the end to cover `date`. Returns whether the range changed.
    pub fn extend_to(&mut self, date: NaiveDate) -> bool {
        if date > self.last {
            self.last = date;
            true
        } else {
            false
        }
    }
}

/// Always-present summary of an album, as stored in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumHeader {
    pub identifier: String,
    pub dir: String,
    pub title: String,
    pub author: String,
    pub location: String,
    pub dates: DateRange,
    /// Cover image relative to the content root, empty when none.
    pub cover: String,
    /// Archive the album was imported from, empty when created here.
    pub filename: String,
}

impl AlbumHeader {
    pub fn new(identifier: impl Into<String>, dir: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            identifier: identifier.into(),
            dir: dir.into(),
            title: String::new(),
            author: String::new(),
            location: String::new(),
            dates: DateRange::single(date),
            cover: String::new(),
            filename: String::new(),
        }
    }
}

/// Lazily loaded content of an album.
#[derive(Debug, Clone, Default)]
pub struct AlbumBody {
    /// Preface shown on the title page.
    pub text: String,
    pub cover: CoverConfig,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone)]
pub struct Album {
    header: AlbumHeader,
    body: Option<AlbumBody>,
    dirty: bool,
    header_changed: bool,
}

impl Album {
    /// Header-only album, as listed in the registry.
    pub fn from_header(header: AlbumHeader) -> Self {
        Self {
            header,
            body: None,
            dirty: false,
            header_changed: false,
        }
    }

    /// Brand-new album with a loaded body. Starts dirty.
    pub fn new(header: AlbumHeader, body: AlbumBody) -> Self {
        Self {
            header,
            body: Some(body),
            dirty: true,
            header_changed: true,
        }
    }

    pub fn header(&self) -> &AlbumHeader {
        &self.header
    }

    pub fn dir(&self) -> &str {
        &self.header.dir
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn body(&self) -> Option<&AlbumBody> {
        self.body.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn header_changed(&self) -> bool {
        self.header_changed
    }

    /// Whether `album.xml` or any loaded chapter must be written.
    pub fn needs_save(&self) -> bool {
        self.dirty
            || self.body.as_ref().is_some_and(|b| {
                b.chapters
                    .iter()
                    .any(|c| c.is_dirty() || c.header_changed())
            })
    }

    fn touch_header(&mut self) {
        self.dirty = true;
        self.header_changed = true;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.header.title = title.into();
        self.touch_header();
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.header.author = author.into();
        self.touch_header();
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.header.location = location.into();
        self.touch_header();
    }

    pub fn set_first_date(&mut self, date: NaiveDate) {
        self.header.dates.set_first(date);
        self.touch_header();
    }

    pub fn set_last_date(&mut self, date: NaiveDate) {
        self.header.dates.set_last(date);
        self.touch_header();
    }

    /// Grow the album's date range to include a paragraph date.
    pub fn extend_dates_to(&mut self, date: NaiveDate) {
        if self.header.dates.extend_to(date) {
            self.touch_header();
        }
    }

    pub fn set_cover_file(&mut self, cover: impl Into<String>) {
        self.header.cover = cover.into();
        self.touch_header();
    }

    pub fn set_preface(&mut self, text: impl Into<String>) -> bool {
        match self.body.as_mut() {
            Some(body) => {
                body.text = text.into();
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Mutate the cover editor settings. Returns `None` when not loaded.
    pub fn edit_cover<R>(&mut self, f: impl FnOnce(&mut CoverConfig) -> R) -> Option<R> {
        let body = self.body.as_mut()?;
        let result = f(&mut body.cover);
        self.dirty = true;
        Some(result)
    }

    pub fn chapters(&self) -> &[Chapter] {
        self.body.as_ref().map(|b| b.chapters.as_slice()).unwrap_or(&[])
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters().get(index)
    }

    /// Chapters mark themselves; [`Album::needs_save`] picks it up.
    pub fn chapter_mut(&mut self, index: usize) -> Option<&mut Chapter> {
        self.body.as_mut()?.chapters.get_mut(index)
    }

    pub fn chapters_mut(&mut self) -> impl Iterator<Item = &mut Chapter> {
        self.body.iter_mut().flat_map(|b| b.chapters.iter_mut())
    }

    pub fn find_chapter(&self, dir: &str) -> Option<usize> {
        self.chapters().iter().position(|c| c.dir() == dir)
    }

    pub fn push_chapter(&mut self, chapter: Chapter) -> Option<usize> {
        let body = self.body.as_mut()?;
        body.chapters.push(chapter);
        self.dirty = true;
        Some(body.chapters.len() - 1)
    }

    pub fn remove_chapter(&mut self, index: usize) -> Option<Chapter> {
        let body = self.body.as_mut()?;
        if index >= body.chapters.len() {
            return None;
        }
        self.dirty = true;
        Some(body.chapters.remove(index))
    }

    pub fn move_chapter(&mut self, from: usize, to: usize) -> bool {
        let Some(body) = self.body.as_mut() else {
            return false;
        };
        if from >= body.chapters.len() || to >= body.chapters.len() {
            return false;
        }
        let chapter = body.chapters.remove(from);
        body.chapters.insert(to, chapter);
        self.dirty = true;
        true
    }

    pub fn total_photos(&self) -> usize {
        self.chapters().iter().map(Chapter::photo_count).sum()
    }

    pub(crate) fn header_mut(&mut self) -> &mut AlbumHeader {
        &mut self.header
    }

    pub(crate) fn attach_body(&mut self, body: AlbumBody) {
        self.body = Some(body);
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
        for chapter in self.chapters_mut() {
            chapter.mark_header_saved();
        }
    }

    pub(crate) fn mark_header_saved(&mut self) {
        self.header_changed = false;
    }

    pub(crate) fn mark_header_changed(&mut self) {
        self.header_changed = true;
    }
}

/// The collection of all albums under a data root.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    albums: Vec<Album>,
    modified: bool,
}

impl Registry {
    pub fn new(albums: Vec<Album>) -> Self {
        Self {
            albums,
            modified: false,
        }
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn album(&self, index: usize) -> Option<&Album> {
        self.albums.get(index)
    }

    pub fn album_mut(&mut self, index: usize) -> Option<&mut Album> {
        self.albums.get_mut(index)
    }

    pub fn find(&self, dir: &str) -> Option<usize> {
        self.albums.iter().position(|a| a.dir() == dir)
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    pub fn push(&mut self, album: Album) -> usize {
        self.albums.push(album);
        self.modified = true;
        self.albums.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Album> {
        if index >= self.albums.len() {
            return None;
        }
        self.modified = true;
        Some(self.albums.remove(index))
    }

    /// Whether `albums.xml` must be rewritten.
    pub fn needs_save(&self) -> bool {
        self.modified || self.albums.iter().any(Album::header_changed)
    }

    pub(crate) fn mark_saved(&mut self) {
        self.modified = false;
        for album in &mut self.albums {
            album.mark_header_saved();
        }
    }
}

/// The caller's current selection, passed into operations explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditingContext {
    pub album: Option<usize>,
    pub chapter: Option<usize>,
    pub paragraph: Option<usize>,
    pub photo: Option<usize>,
}

impl EditingContext {
    pub fn for_album(album: usize) -> Self {
        Self {
            album: Some(album),
            ..Self::default()
        }
    }

    /// Select a chapter, clearing the finer-grained selection.
    pub fn with_chapter(self, chapter: usize) -> Self {
        Self {
            chapter: Some(chapter),
            paragraph: None,
            photo: None,
            ..self
        }
    }

    pub fn with_paragraph(self, paragraph: usize) -> Self {
        Self {
            paragraph: Some(paragraph),
            photo: None,
            ..self
        }
    }

    pub fn with_photo(self, photo: usize) -> Self {
        Self {
            photo: Some(photo),
            ..self
        }
    }

    pub fn album<'a>(&self, registry: &'a Registry) -> Option<&'a Album> {
        registry.album(self.album?)
    }

    pub fn chapter<'a>(&self, album: &'a Album) -> Option<&'a Chapter> {
        album.chapter(self.chapter?)
    }

    pub fn paragraph<'a>(&self, album: &'a Album) -> Option<&'a Paragraph> {
        self.chapter(album)?.body()?.paragraphs.get(self.paragraph?)
    }

    pub fn photo<'a>(&self, album: &'a Album) -> Option<&'a Photo> {
        self.paragraph(album)?.photos.get(self.photo?)
    }
}
