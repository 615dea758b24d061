//! Image processing — pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Compose** | `RgbaImage::from_pixel` + `imageops::overlay` |
//! | **Resize → WebP** | Lanczos3 + lossless WebP encoder |
//! | **Square crop** | `resize_to_fill` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{canvas_for_aspect, scaled_height};
pub use params::{
    ComposeParams, Encoding, Fit, Placement, Quality, ResizeParams, SquareCropParams,
};
pub use rust_backend::RustBackend;
