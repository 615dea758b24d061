//! Shared test utilities: synthetic image trees for real-backend tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = image_tree(&[
//!     ("Shirt/front.png", 600, 600),
//!     ("Shirt/side.png", 750, 1000),
//! ]);
//! let categories = categorize(&RustBackend::new(), tmp.path()).unwrap().categories;
//! ```

use image::{Rgb, RgbImage};
use std::path::Path;
use tempfile::TempDir;

/// Write a flat-colour PNG, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(path)
        .unwrap();
}

/// A temp directory holding one PNG per `(relative path, width, height)`.
///
/// Colours differ per file so composites show which tile went where.
pub fn image_tree(files: &[(&str, u32, u32)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (i, (relative, width, height)) in files.iter().enumerate() {
        let shade = (i as u8).wrapping_mul(40);
        write_png(&tmp.path().join(relative), *width, *height, [shade, 255 - shade, 128]);
    }
    tmp
}

/// Dimensions of an image file on disk.
pub fn dimensions_of(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}
