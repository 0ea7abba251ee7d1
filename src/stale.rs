//! Staleness checks for derived files.
//!
//! A derived file (page, manifest) is regenerated only when its source
//! (`album.xml`, `chapter.xml`) is newer. "Newer" compares the *effective
//! time* of each file: the later of its modification and creation times.
//! Copy tools differ in which of the two they preserve, and taking the
//! maximum catches a fresh copy either way.
//!
//! Creation time is not available on every platform and filesystem. Where
//! the OS reports it as unsupported, only the modification time is used, so
//! results there depend on the copy tool preserving or resetting mtime.
//!
//! Ties are "not stale": a no-op touch that leaves both times equal does not
//! trigger a rebuild.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// `max(modified, created)`, or `None` when the file does not exist.
pub fn effective_time(path: &Path) -> Option<SystemTime> {
    let meta = fs::metadata(path).ok()?;
    let modified = meta.modified().ok();
    let created = match meta.created() {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "creation time unavailable");
            None
        }
    };
    match (modified, created) {
        (Some(m), Some(c)) => Some(m.max(c)),
        (m, c) => m.or(c),
    }
}

/// Whether `derived` must be regenerated from `source`.
///
/// - `source` missing → not stale (nothing to regenerate from), even when
///   `derived` is missing too
/// - `derived` missing → stale
/// - otherwise stale iff `source` is strictly newer
pub fn is_stale(derived: &Path, source: &Path) -> bool {
    let Some(source_time) = effective_time(source) else {
        return false;
    };
    match effective_time(derived) {
        Some(derived_time) => source_time > derived_time,
        None => true,
    }
}

/// Whether `derived` is stale against any of several sources.
pub fn is_stale_any<'a>(derived: &Path, sources: impl IntoIterator<Item = &'a Path>) -> bool {
    sources.into_iter().any(|source| is_stale(derived, source))
}
