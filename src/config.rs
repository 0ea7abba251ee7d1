//! Application configuration.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the data root next to `albums.xml`; stock defaults are overridden by
//! whatever keys the user file sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [labels]
//! at = "at"                          # joins date and location in chapter pages
//! preface = "Preface"                # first toc entry, links to the title page
//! table_of_contents = "Table of Contents"
//! untitled = "(Untitled)"            # page title when an album has none
//! new_chapter = "(New Chapter)"      # title of freshly created chapters
//!
//! [book]
//! language = "en"                    # dc:language and xml:lang
//! date_format = "%b %d, %Y"          # chrono strftime, e.g. "Mar 05, 2024"
//!
//! [thumbnails]
//! landscape = [240, 180]             # base size at multiplier 1
//! portrait = [120, 180]
//! album_list = [160, 120]            # Thumbs/<dir>.jpg
//! cover = [768, 1024]                # cover.jpg in the content root
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want.
//!
//! ```toml
//! [labels]
//! at = "à"
//! preface = "Préface"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Localized fixed strings that end up in generated pages.
    pub labels: LabelsConfig,
    /// Publication metadata and date formatting.
    pub book: BookConfig,
    /// Thumbnail base sizes.
    pub thumbnails: ThumbnailsConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thumbnails;
        if [t.landscape, t.portrait, t.album_list, t.cover]
            .iter()
            .flatten()
            .any(|&v| v == 0)
        {
            return Err(ConfigError::Validation(
                "thumbnail dimensions must be non-zero".into(),
            ));
        }
        if self.book.language.trim().is_empty() {
            return Err(ConfigError::Validation(
                "book.language must not be empty".into(),
            ));
        }
        if self.book.date_format.is_empty()
            || StrftimeItems::new(&self.book.date_format).any(|item| matches!(item, Item::Error))
        {
            return Err(ConfigError::Validation(format!(
                "book.date_format {:?} is not a valid strftime format",
                self.book.date_format
            )));
        }
        Ok(())
    }
}

/// Fixed strings written into pages and navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelsConfig {
    pub at: String,
    pub preface: String,
    pub table_of_contents: String,
    pub untitled: String,
    pub new_chapter: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            at: "at".to_string(),
            preface: "Preface".to_string(),
            table_of_contents: "Table of Contents".to_string(),
            untitled: "(Untitled)".to_string(),
            new_chapter: "(New Chapter)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    pub language: String,
    /// chrono strftime pattern for dates shown in pages.
    pub date_format: String,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            date_format: "%b %d, %Y".to_string(),
        }
    }
}

/// Thumbnail sizes as `[width, height]`.
///
/// Paragraph thumbnails are the base size times the paragraph multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    pub landscape: [u32; 2],
    pub portrait: [u32; 2],
    pub album_list: [u32; 2],
    pub cover: [u32; 2],
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            landscape: [240, 180],
            portrait: [120, 180],
            album_list: [160, 120],
            cover: [768, 1024],
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from the data root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(data_root: &Path) -> Result<AppConfig, ConfigError> {
    let merged = match load_raw_config(data_root)? {
        Some(overlay) => merge_toml(stock_defaults_value()?, overlay),
        None => stock_defaults_value()?,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Album Press Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the data root, next to albums.xml.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Labels written into generated pages
# ---------------------------------------------------------------------------
[labels]
# Connector between a paragraph's date and its location.
at = "at"
# First entry of the table of contents; links to the title page.
preface = "Preface"
# Title of the table of contents page and its navigation entry.
table_of_contents = "Table of Contents"
# Page title used when an album has no title.
untitled = "(Untitled)"
# Title given to newly created chapters.
new_chapter = "(New Chapter)"

# ---------------------------------------------------------------------------
# Publication
# ---------------------------------------------------------------------------
[book]
# Language tag for the e-book metadata and page xml:lang.
language = "en"
# strftime pattern for dates shown in pages ("Mar 05, 2024").
date_format = "%b %d, %Y"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Base [width, height] of a landscape thumbnail. Paragraphs with few photos
# scale this by 2 or 4 so every row holds two thumbnails.
landscape = [240, 180]
# Base [width, height] of a portrait thumbnail.
portrait = [120, 180]
# Size of the album list thumbnail rendered from the cover.
album_list = [160, 120]
# Size an uploaded cover image is cropped to.
cover = [768, 1024]
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_labels() {
        let config = AppConfig::default();
        assert_eq!(config.labels.at, "at");
        assert_eq!(config.labels.preface, "Preface");
        assert_eq!(config.labels.table_of_contents, "Table of Contents");
    }

    #[test]
    fn default_thumbnails() {
        let config = AppConfig::default();
        assert_eq!(config.thumbnails.landscape, [240, 180]);
        assert_eq!(config.thumbnails.portrait, [120, 180]);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[labels]
at = "à"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.labels.at, "à");
        // Default values preserved
        assert_eq!(config.labels.preface, "Preface");
        assert_eq!(config.book.language, "en");
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml = r#"
[labels]
atx = "oops"
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[book]
language = "fr"

[thumbnails]
portrait = [100, 150]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.book.language, "fr");
        assert_eq!(config.thumbnails.portrait, [100, 150]);
        // Unspecified values should be defaults
        assert_eq!(config.thumbnails.landscape, [240, 180]);
        assert_eq!(config.book.date_format, "%b %d, %Y");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn zero_thumbnail_size_is_invalid() {
        let mut config = AppConfig::default();
        config.thumbnails.landscape = [0, 180];
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn bad_date_format_is_invalid() {
        let mut config = AppConfig::default();
        config.book.date_format = "%Q".into();
        assert!(config.validate().is_err());
        config.book.date_format = "%Y-%m-%d".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_language_is_invalid() {
        let mut config = AppConfig::default();
        config.book.language = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn merge_overlay_wins_and_keeps_base() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn stock_toml_parses_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
