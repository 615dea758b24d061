//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only, format sniffed from content) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate decoders |
//! | Resize | `image::imageops` with `Lanczos3` |
//! | Cover crop | `image::DynamicImage::resize_to_fill` |
//! | Canvas | `image::RgbaImage::from_pixel` + `image::imageops::overlay` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder::new_lossless`, RGB-quantized for compressed output |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! Every encoder writes into memory first and the file is written in one
//! call, so an encode failure never leaves a truncated file on disk.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{ComposeParams, Encoding, Fit, Quality, ResizeParams, SquareCropParams};
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, Rgba, RgbaImage};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> BackendError {
    BackendError::Decode {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn read_error(path: &Path, source: std::io::Error) -> BackendError {
    BackendError::Read {
        path: path.to_path_buf(),
        source,
    }
}

/// Open `path` and sniff its format from the leading bytes.
fn open_image(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| read_error(path, e))
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    open_image(path)?
        .decode()
        .map_err(|e| decode_error(path, e))
}

/// Scale `img` into a `width`×`height` slot according to `fit`.
fn fit_into(img: &DynamicImage, width: u32, height: u32, fit: Fit) -> DynamicImage {
    match fit {
        Fit::Contain => img.resize(width, height, FilterType::Lanczos3),
        Fit::Cover => img.resize_to_fill(width, height, FilterType::Lanczos3),
    }
}

/// Encode `img` with the requested encoding into an in-memory buffer.
fn encode(img: &DynamicImage, encoding: Encoding) -> Result<Vec<u8>, BackendError> {
    let mut rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut buffer = Vec::new();

    let result = match encoding {
        Encoding::WebpLossless => WebPEncoder::new_lossless(Cursor::new(&mut buffer)).write_image(
            rgba.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        Encoding::WebpCompressed(quality) => {
            quantize_rgb(rgba.as_mut(), quality);
            WebPEncoder::new_lossless(Cursor::new(&mut buffer)).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )
        }
        Encoding::Png => PngEncoder::new(Cursor::new(&mut buffer)).write_image(
            rgba.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };

    result.map_err(|e| BackendError::Encode(format!("{} encode failed: {e}", encoding.extension())))?;
    Ok(buffer)
}

/// Encode and write `img` to `path`.
fn save_image(img: &DynamicImage, path: &Path, encoding: Encoding) -> Result<(), BackendError> {
    let bytes = encode(img, encoding)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Reduce the RGB palette of an RGBA buffer in place according to `quality`.
///
/// The WebP encoder is lossless-only; snapping channels to fewer levels makes
/// the lossless stream far more compressible. Alpha is left untouched.
fn quantize_rgb(data: &mut [u8], quality: Quality) {
    let levels = levels_for_quality(quality);
    if levels >= 256 {
        return;
    }
    let step = 255.0 / (levels as f32 - 1.0);
    for pixel in data.chunks_exact_mut(4) {
        for channel in pixel.iter_mut().take(3) {
            let bucket = (f32::from(*channel) / step).round();
            *channel = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Number of levels per channel: quadratic in quality, 2 at the bottom, 256 at 100.
fn levels_for_quality(quality: Quality) -> u16 {
    if quality.value() >= 100 {
        return 256;
    }
    let normalized = quality.value() as f32 / 100.0;
    (2.0 + normalized * normalized * 254.0)
        .round()
        .clamp(2.0, 256.0) as u16
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_image(path)?
            .into_dimensions()
            .map_err(|e| decode_error(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn compose(&self, params: &ComposeParams) -> Result<(), BackendError> {
        // Load every slot before touching the canvas: any failure aborts the whole render.
        let mut tiles = Vec::with_capacity(params.placements.len());
        for placement in &params.placements {
            let img = load_image(&placement.source)?;
            let scaled = fit_into(&img, placement.width, placement.height, placement.fit);
            tiles.push((placement, scaled.to_rgba8()));
        }

        let mut canvas = RgbaImage::from_pixel(
            params.canvas_width,
            params.canvas_height,
            Rgba(params.background),
        );
        for (placement, tile) in &tiles {
            // Cover tiles fill the slot exactly; contain tiles are centered in it.
            let dx = placement.width.saturating_sub(tile.width()) / 2;
            let dy = placement.height.saturating_sub(tile.height()) / 2;
            image::imageops::overlay(
                &mut canvas,
                tile,
                i64::from(placement.x) + i64::from(dx),
                i64::from(placement.y) + i64::from(dy),
            );
        }

        if let Some(parent) = params.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        save_image(&DynamicImage::ImageRgba8(canvas), &params.output, Encoding::Png)
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_image(&resized, &params.output, params.encoding)
    }

    fn square_crop(&self, params: &SquareCropParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let filled = img.resize_to_fill(params.side, params.side, FilterType::Lanczos3);
        save_image(&filled, &params.output, params.encoding)
    }
}
