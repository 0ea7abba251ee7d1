//! Photo import and thumbnail rendering.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Thumbnail** | `resize_to_fill` with Lanczos3 |
//! | **Album list thumbnail** | same, from the cover |
//! | **Cover image** | same, into `cover.jpg` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining the store, the model and a backend

pub mod backend;
mod calculations;
pub mod operations;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, ResizeParams};
pub use calculations::{album_list_dimensions, cover_dimensions, thumbnail_dimensions};
pub use operations::{
    COVER_FILE, ImportError, ImportReport, import_photos, plan_thumbnail, refresh_album_thumbnail,
    refresh_thumbnails, remove_cover, remove_photo, set_cover_image, set_cover_source,
};
pub use rust_backend::RustBackend;
