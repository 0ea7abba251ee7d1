//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the resampler seam: the rest of the crate
//! decides *which* thumbnails to render and *where*, and a backend does the
//! pixel work. Two operations are required: identify and resize.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Full specification of a resize: source, output path, target box, and
/// whether to center-crop to exactly fill it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    /// `true`: fill the box and crop the overflow. `false`: fit inside it.
    pub crop: bool,
}

/// Trait for image processing backends.
///
/// `Sync` so a caller can share one backend with a worker thread.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Execute a resize operation, writing `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
