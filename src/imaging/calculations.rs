//! Pure calculation functions for thumbnail dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::config::ThumbnailsConfig;
use crate::model::Orientation;

/// Thumbnail box for a photo in a paragraph with the given multiplier.
///
/// The base size comes from the config (240x180 landscape, 120x180
/// portrait by default) and both edges are scaled by the multiplier.
///
/// # Examples
/// ```
/// # use album_press::config::ThumbnailsConfig;
/// # use album_press::imaging::thumbnail_dimensions;
/// # use album_press::model::Orientation;
/// let config = ThumbnailsConfig::default();
/// assert_eq!(thumbnail_dimensions(Orientation::Landscape, 2, &config), (480, 360));
/// assert_eq!(thumbnail_dimensions(Orientation::Portrait, 1, &config), (120, 180));
/// ```
pub fn thumbnail_dimensions(
    orientation: Orientation,
    multiplier: u32,
    config: &ThumbnailsConfig,
) -> (u32, u32) {
    let [w, h] = match orientation {
        Orientation::Landscape => config.landscape,
        Orientation::Portrait => config.portrait,
    };
    let m = multiplier.max(1);
    (w.saturating_mul(m), h.saturating_mul(m))
}

/// Album list thumbnail box.
pub fn album_list_dimensions(config: &ThumbnailsConfig) -> (u32, u32) {
    let [w, h] = config.album_list;
    (w, h)
}

/// Box an uploaded cover image is cropped to.
pub fn cover_dimensions(config: &ThumbnailsConfig) -> (u32, u32) {
    let [w, h] = config.cover;
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_scales_with_multiplier() {
        let config = ThumbnailsConfig::default();
        assert_eq!(
            thumbnail_dimensions(Orientation::Landscape, 1, &config),
            (240, 180)
        );
        assert_eq!(
            thumbnail_dimensions(Orientation::Landscape, 4, &config),
            (960, 720)
        );
    }

    #[test]
    fn portrait_scales_with_multiplier() {
        let config = ThumbnailsConfig::default();
        assert_eq!(
            thumbnail_dimensions(Orientation::Portrait, 2, &config),
            (240, 360)
        );
    }

    #[test]
    fn zero_multiplier_treated_as_one() {
        let config = ThumbnailsConfig::default();
        assert_eq!(
            thumbnail_dimensions(Orientation::Portrait, 0, &config),
            (120, 180)
        );
    }

    #[test]
    fn custom_base_size() {
        let config = ThumbnailsConfig {
            landscape: [300, 200],
            ..ThumbnailsConfig::default()
        };
        assert_eq!(
            thumbnail_dimensions(Orientation::Landscape, 2, &config),
            (600, 400)
        );
        assert_eq!(album_list_dimensions(&config), (160, 120));
        assert_eq!(cover_dimensions(&config), (768, 1024));
    }
}
