//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entity (album, chapter, photo) is shown by its semantic identity,
//! positional index and title, with on-disk names as indented `Source:`
//! context lines. The output reads as a content inventory while still letting
//! users trace entries back to directories.
//!
//! # Output Format
//!
//! ## Album list
//!
//! ```text
//! Albums
//! 001 Kyoto
//!     Source: lq3x9k/
//!     Dates: 2024-03-05 – 2024-03-09
//! ```
//!
//! ## Album detail
//!
//! ```text
//! 001 Kyoto (3 photos)
//!     Source: lq3x9k/
//!     Author: Mei
//!     001 Arrival (2 photos)
//!         Source: ch001/
//!         001 (a.jpg)
//!         002 Torii gate
//! ```
//!
//! ## Build
//!
//! ```text
//! title.xhtml: written
//! toc.xhtml: current
//! 001 Arrival (2 photos)
//!     ch001.xhtml: written
//!     ch001/a.view.xhtml: current
//! Packaged 22 entries → data/lq3x9k.epub
//! Wrote 3 pages, 6 current → data/lq3x9k/EPUB
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::ImportReport;
use crate::model::{Album, DateRange, Registry};
use crate::pipeline::{BuildEvent, BuildReport, PageStatus};
use crate::store::xml::DATE_FORMAT;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format an entity header: positional index + title, with optional detail.
///
/// ```text
/// 001 Arrival (2 photos)
/// 001 Kyoto
/// ```
fn entity_header(index: usize, title: &str, count: Option<usize>) -> String {
    let title = if title.is_empty() { "(untitled)" } else { title };
    match count {
        Some(n) => format!("{} {} ({} photos)", format_index(index), title, n),
        None => format!("{} {}", format_index(index), title),
    }
}

/// Format a photo line: described photos show the description, others the
/// file name in parens.
///
/// ```text
/// 001 Torii gate        // described
/// 002 (b.jpg)           // no description, file name IS the identity
/// ```
fn photo_line(index: usize, description: &str, file: &str) -> String {
    let description = truncate_desc(description.trim(), 60);
    if description.is_empty() {
        format!("{} ({})", format_index(index), file)
    } else {
        format!("{} {}", format_index(index), description)
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

fn date_range(range: &DateRange) -> String {
    let first = range.first().format(DATE_FORMAT);
    if range.is_single_day() {
        first.to_string()
    } else {
        format!("{} \u{2013} {}", first, range.last().format(DATE_FORMAT))
    }
}

// ============================================================================
// Albums
// ============================================================================

/// Format the registry as a numbered album list.
pub fn format_album_list(registry: &Registry) -> Vec<String> {
    if registry.is_empty() {
        return vec!["No albums".to_string()];
    }
    let mut lines = vec!["Albums".to_string()];
    for (i, album) in registry.albums().iter().enumerate() {
        let header = album.header();
        lines.push(entity_header(i + 1, &header.title, None));
        lines.push(format!("{}Source: {}/", indent(1), header.dir));
        lines.push(format!("{}Dates: {}", indent(1), date_range(&header.dates)));
    }
    lines
}

pub fn print_album_list(registry: &Registry) {
    for line in format_album_list(registry) {
        println!("{}", line);
    }
}

/// Format one album with its chapters, and the photos of loaded chapters.
pub fn format_album_detail(position: usize, album: &Album) -> Vec<String> {
    let header = album.header();
    let mut lines = vec![entity_header(
        position,
        &header.title,
        Some(album.total_photos()),
    )];
    lines.push(format!("{}Source: {}/", indent(1), header.dir));
    lines.push(format!("{}Dates: {}", indent(1), date_range(&header.dates)));
    if !header.author.is_empty() {
        lines.push(format!("{}Author: {}", indent(1), header.author));
    }
    if !header.location.is_empty() {
        lines.push(format!("{}Location: {}", indent(1), header.location));
    }
    if !header.cover.is_empty() {
        lines.push(format!("{}Cover: {}", indent(1), header.cover));
    }

    for (i, chapter) in album.chapters().iter().enumerate() {
        lines.push(format!(
            "{}{}",
            indent(1),
            entity_header(i + 1, chapter.title(), Some(chapter.photo_count()))
        ));
        lines.push(format!("{}Source: {}/", indent(2), chapter.dir()));
        let Some(body) = chapter.body() else {
            continue;
        };
        for (j, photo) in body.photos().enumerate() {
            lines.push(format!(
                "{}{}",
                indent(2),
                photo_line(j + 1, &photo.description, &photo.file)
            ));
        }
    }
    lines
}

pub fn print_album_detail(position: usize, album: &Album) {
    for line in format_album_detail(position, album) {
        println!("{}", line);
    }
}

// ============================================================================
// Photo import
// ============================================================================

pub fn format_import_report(report: &ImportReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, file) in report.imported.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), file));
    }
    for path in &report.skipped {
        lines.push(format!("{}Skipped: {}", indent(1), path.display()));
    }
    for (path, error) in &report.failed {
        lines.push(format!("{}Failed: {} ({})", indent(1), path.display(), error));
    }
    lines.push(format!(
        "Imported {} photos, {} skipped, {} failed",
        report.imported.len(),
        report.skipped.len(),
        report.failed.len()
    ));
    lines
}

pub fn print_import_report(report: &ImportReport) {
    for line in format_import_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format a single build progress event as display lines.
///
/// Pages inside a chapter are indented under the chapter header.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::ChapterStarted {
            index,
            title,
            photo_count,
        } => vec![entity_header(*index, title, Some(*photo_count))],
        BuildEvent::Page {
            path,
            status,
            chapter,
        } => {
            let status_str = match status {
                PageStatus::Current => "current",
                PageStatus::Written => "written",
            };
            let depth = usize::from(chapter.is_some());
            vec![format!("{}{}: {}", indent(depth), path, status_str)]
        }
        BuildEvent::Packaged { path, entries } => {
            vec![format!(
                "Packaged {} entries \u{2192} {}",
                entries,
                path.display()
            )]
        }
    }
}

/// Format the final build summary.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    vec![format!(
        "Wrote {} pages, {} current \u{2192} {}",
        report.pages_written,
        report.pages_current,
        report.folder.display()
    )]
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
