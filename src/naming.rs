//! Centralized naming rules for everything written into an album.
//!
//! Two text transforms live here and are shared by every page builder:
//!
//! - [`escape`] turns arbitrary text into XML character data.
//! - [`safe_name`] turns arbitrary text into something usable as a file name.
//!
//! The remaining helpers derive on-disk names from model data so that the
//! page builders, the manifest and the packager agree on every path:
//!
//! - `ch001/` → chapter directory, page at `ch001.xhtml`
//! - `ch001/dawn.jpg` → photo, page at `ch001/dawn.view.xhtml`
//! - `ch001/thumbs/dawn.jpg` → thumbnail (same file name as the photo)

use std::path::Path;

/// Photo file extensions accepted by the importer (lowercase).
pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Escape the five XML metacharacters.
///
/// The order is fixed: `&` first so the entities produced by the later
/// replacements are not escaped twice.
///
/// ```
/// use album_press::naming::escape;
/// assert_eq!(escape("a<b>&c\"d'e"), "a&lt;b&gt;&amp;c&quot;d&apos;e");
/// ```
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Map characters that are illegal in file names on common filesystems.
///
/// - `:` `/` `\` → `-`
/// - `<` → `(`, `>` → `)`
/// - `"` `*` `?` → `_`
pub fn safe_name(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ':' | '/' | '\\' => '-',
            '<' => '(',
            '>' => ')',
            '"' | '*' | '?' => '_',
            other => other,
        })
        .collect()
}

/// File stem of a photo (`dawn.jpg` → `dawn`).
pub fn file_stem(file: &str) -> &str {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}

/// Page file for a photo, relative to its chapter directory.
pub fn photo_page_name(file: &str) -> String {
    format!("{}.view.xhtml", file_stem(file))
}

/// Page file for a chapter, relative to the content root.
pub fn chapter_page_name(dir: &str) -> String {
    format!("{dir}.xhtml")
}

/// Chapter directory for a 1-based chapter number (`ch001`).
pub fn chapter_dir_name(number: u32) -> String {
    format!("ch{number:03}")
}

/// Whether a path has one of the [`PHOTO_EXTENSIONS`].
pub fn is_supported_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| PHOTO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Media type of a photo, as declared in the package manifest.
pub fn photo_media_type(file: &str) -> &'static str {
    let is_png = Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if is_png { "image/png" } else { "image/jpeg" }
}

/// Encode a number in base 36 (`0-9a-z`).
pub fn base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Directory name for a new album, derived from a millisecond timestamp.
pub fn album_dir_name(timestamp_millis: i64) -> String {
    base36(timestamp_millis.max(0) as u64)
}

/// Whether a photo named `candidate` would collide with a file in `dir`.
///
/// Photo pages and manifest ids are keyed by stem, so `dawn.png` collides
/// with an existing `dawn.jpg` too.
fn is_taken(dir: &Path, candidate: &str) -> bool {
    let stem = file_stem(candidate);
    dir.join(candidate).exists()
        || dir.join(photo_page_name(candidate)).exists()
        || PHOTO_EXTENSIONS.iter().any(|ext| {
            dir.join(format!("{stem}.{ext}")).exists()
                || dir.join(format!("{stem}.{}", ext.to_ascii_uppercase())).exists()
        })
}

/// Pick a file name for `original` that is not yet taken in `dir`.
///
/// The name is made safe first; on collision a counter is appended to the
/// stem: `dawn.jpg`, `dawn1.jpg`, `dawn2.jpg`, ...
pub fn unique_file_name(dir: &Path, original: &str) -> String {
    let safe = safe_name(original);
    if !is_taken(dir, &safe) {
        return safe;
    }
    let path = Path::new(&safe);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("photo");
    let ext = path.extension().and_then(|e| e.to_str());
    (1u32..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}{n}.{ext}"),
            None => format!("{stem}{n}"),
        })
        .find(|candidate| !is_taken(dir, candidate))
        .unwrap_or(safe)
}

/// Manifest id from its parts: joined with `_`, characters outside
/// `[A-Za-z0-9_.-]` replaced by `_`, prefixed with `_` when it would start
/// with a digit, `.` or `-`.
pub fn manifest_id(parts: &[&str]) -> String {
    let mut id: String = parts
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !id.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        id.insert(0, '_');
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn escape_all_metacharacters() {
        assert_eq!(escape("a<b>&c\"d'e"), "a&lt;b&gt;&amp;c&quot;d&apos;e");
    }

    #[test]
    fn escape_does_not_double_escape() {
        assert_eq!(escape("&lt;"), "&amp;lt;");
    }

    #[test]
    fn escape_plain_text_unchanged() {
        assert_eq!(escape("Kyoto in spring"), "Kyoto in spring");
    }

    #[test]
    fn safe_name_maps_reserved_characters() {
        assert_eq!(safe_name("a:b/c\\d"), "a-b-c-d");
        assert_eq!(safe_name("<x>"), "(x)");
        assert_eq!(safe_name("what?*\"now\""), "what___now_");
    }

    #[test]
    fn photo_page_uses_stem() {
        assert_eq!(photo_page_name("dawn.jpg"), "dawn.view.xhtml");
        assert_eq!(photo_page_name("a.b.png"), "a.b.view.xhtml");
    }

    #[test]
    fn chapter_names() {
        assert_eq!(chapter_dir_name(1), "ch001");
        assert_eq!(chapter_dir_name(42), "ch042");
        assert_eq!(chapter_page_name("ch001"), "ch001.xhtml");
    }

    #[test]
    fn supported_photo_extensions_case_insensitive() {
        assert!(is_supported_photo(Path::new("a.JPG")));
        assert!(is_supported_photo(Path::new("a.jpeg")));
        assert!(is_supported_photo(Path::new("a.png")));
        assert!(!is_supported_photo(Path::new("a.gif")));
        assert!(!is_supported_photo(Path::new("noext")));
    }

    #[test]
    fn media_type_by_extension() {
        assert_eq!(photo_media_type("a.png"), "image/png");
        assert_eq!(photo_media_type("a.PNG"), "image/png");
        assert_eq!(photo_media_type("a.jpg"), "image/jpeg");
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(album_dir_name(-5), "0");
    }

    #[test]
    fn unique_file_name_appends_counter() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(unique_file_name(tmp.path(), "dawn.jpg"), "dawn.jpg");
        std::fs::write(tmp.path().join("dawn.jpg"), b"x").unwrap();
        assert_eq!(unique_file_name(tmp.path(), "dawn.jpg"), "dawn1.jpg");
        std::fs::write(tmp.path().join("dawn1.jpg"), b"x").unwrap();
        assert_eq!(unique_file_name(tmp.path(), "dawn.jpg"), "dawn2.jpg");
    }

    #[test]
    fn unique_file_name_avoids_stem_collision() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("dawn.jpg"), b"x").unwrap();
        assert_eq!(unique_file_name(tmp.path(), "dawn.png"), "dawn1.png");
    }

    #[test]
    fn manifest_ids_are_xml_names() {
        assert_eq!(manifest_id(&["ch001", "dawn"]), "ch001_dawn");
        assert_eq!(manifest_id(&["ch001", "my photo", "xhtml"]), "ch001_my_photo_xhtml");
        assert_eq!(manifest_id(&["2024"]), "_2024");
    }

    #[test]
    fn unique_file_name_is_safe() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(unique_file_name(tmp.path(), "a:b.jpg"), "a-b.jpg");
    }
}
