//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline modules ([`compose`](crate::compose),
//! [`derivatives`](crate::derivatives)), which decide what files to create,
//! and the [`backend`](super::backend), which does the pixel work. Keeping
//! them plain data lets the pipeline run against a recording mock in tests.
//!
//! ## Types
//!
//! - [`Quality`] — Encoding quality (1–100). Clamped on construction.
//! - [`Encoding`] — Output codec + compression mode of one derivative file.
//! - [`Fit`] — How a source is scaled into a slot rectangle.
//! - [`Placement`] / [`ComposeParams`] — A full canvas: size, background, slots in paint order.
//! - [`ResizeParams`] — Exact resize of one source into one encoded file.
//! - [`SquareCropParams`] — Cover-fit square crop into one encoded file.

use std::path::PathBuf;

/// Quality setting for image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    /// Maximum fidelity, used for every lossless derivative.
    pub const LOSSLESS: Quality = Quality(100);
    /// Heavy compression for the small "compressed" derivatives.
    pub const COMPRESSED: Quality = Quality(10);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Codec and compression mode of an encoded output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// WebP, lossless.
    WebpLossless,
    /// WebP with colour detail reduced according to the quality before encoding.
    WebpCompressed(Quality),
    /// PNG, lossless.
    Png,
}

impl Encoding {
    pub fn extension(self) -> &'static str {
        match self {
            Encoding::WebpLossless | Encoding::WebpCompressed(_) => "webp",
            Encoding::Png => "png",
        }
    }

    pub fn quality(self) -> Quality {
        match self {
            Encoding::WebpCompressed(q) => q,
            Encoding::WebpLossless | Encoding::Png => Quality::LOSSLESS,
        }
    }
}

/// How a source image is scaled into a slot rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Scale to fit inside the rectangle, preserving aspect ratio, no cropping.
    /// The scaled image is centered in the slot.
    Contain,
    /// Scale to cover the rectangle, then center-crop the overflow.
    Cover,
}

/// One source image placed on a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub source: PathBuf,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub fit: Fit,
}

/// Parameters for rendering a flattened canvas to a PNG file.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeParams {
    pub output: PathBuf,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Opaque RGBA fill painted before any placement.
    pub background: [u8; 4],
    /// Painted in order; later placements cover earlier ones.
    pub placements: Vec<Placement>,
}

/// Parameters for an exact resize into one encoded file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
}

/// Parameters for a cover-fit square crop into one encoded file.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareCropParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub side: u32,
    pub encoding: Encoding,
}
