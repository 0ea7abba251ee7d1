//! Fixed files every album directory carries, embedded at compile time.
//!
//! | File | Location |
//! |------|----------|
//! | `mimetype` | album root |
//! | `container.xml` | `META-INF/` |
//! | `style.css` | content root |
//! | `viewer.css` | content root |

use crate::store::{Result, Store, io_error, write_atomic};
use std::fs;
use std::path::PathBuf;

pub const MIMETYPE: &str = include_str!("../static/mimetype");
pub const CONTAINER_XML: &str = include_str!("../static/container.xml");
pub const STYLE_CSS: &str = include_str!("../static/style.css");
pub const VIEWER_CSS: &str = include_str!("../static/viewer.css");

pub const MIMETYPE_FILE: &str = "mimetype";
pub const CONTAINER_FILE: &str = "META-INF/container.xml";
pub const STYLE_FILE: &str = "style.css";
pub const VIEWER_FILE: &str = "viewer.css";

/// Write any fixed file missing from an album directory.
///
/// Returns the paths that were written. Existing files are left alone so a
/// hand-edited stylesheet survives.
pub fn ensure_static_assets(store: &Store, album_dir: &str) -> Result<Vec<PathBuf>> {
    let root = store.album_root(album_dir);
    let content = store.content_root(album_dir);
    let wanted = [
        (root.join(MIMETYPE_FILE), MIMETYPE),
        (root.join(CONTAINER_FILE), CONTAINER_XML),
        (content.join(STYLE_FILE), STYLE_CSS),
        (content.join(VIEWER_FILE), VIEWER_CSS),
    ];

    let mut written = Vec::new();
    for (path, text) in wanted {
        if path.exists() {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        write_atomic(&path, text.as_bytes())?;
        tracing::debug!(path = %path.display(), "restored static asset");
        written.push(path);
    }
    Ok(written)
}
