//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the pipeline needs:
//! identify, compose, resize, and square_crop.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests drive the pipeline through a recording mock instead.

use super::params::{ComposeParams, ResizeParams, SquareCropParams};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared by parallel jobs.
pub trait ImageBackend: Sync {
    /// Read image dimensions from the header.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Render every placement onto a fresh canvas and write it as PNG.
    ///
    /// All sources must load before anything is written; a failing
    /// placement leaves no output file behind.
    fn compose(&self, params: &ComposeParams) -> Result<(), BackendError>;

    /// Resize to exact dimensions and encode.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Cover-fit to a square of `side` pixels (center crop) and encode.
    fn square_crop(&self, params: &SquareCropParams) -> Result<(), BackendError>;
}
