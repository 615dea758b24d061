//! Render a bound layout to a flattened PNG.
//!
//! Composition is fail-fast: if any slot image cannot be read the whole layout
//! fails and no output file is left behind. Per-cell derivative failures are a
//! different matter and are handled in [`derivatives`](crate::derivatives).

use crate::derivatives::{self, DerivativeError, DerivativeSet, SourceDisposition};
use crate::imaging::{BackendError, ImageBackend};
use crate::layout::LayoutInstance;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("Slot {index} ({path}) could not be read: {source}")]
    Slot {
        index: usize,
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Derivatives for the composite failed: {0}")]
    Derivative(#[from] DerivativeError),
}

/// Compose `instance` into a PNG at `output`.
///
/// The canvas is painted white, then each slot image is scaled into its
/// rectangle in slot order. Same instance and inputs give identical bytes.
pub fn compose(
    backend: &impl ImageBackend,
    instance: &LayoutInstance,
    output: &Path,
) -> Result<PathBuf, CompositionError> {
    // Check every slot up front so a missing image is reported by index.
    for (index, image) in instance.images().iter().enumerate() {
        if !image.path.is_file() {
            return Err(CompositionError::Slot {
                index,
                path: image.path.clone(),
                source: BackendError::Read {
                    path: image.path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "slot image not found",
                    ),
                },
            });
        }
    }

    let params = instance.compose_params(output);
    backend.compose(&params).map_err(|source| match source {
        BackendError::Decode { ref path, .. } | BackendError::Read { ref path, .. } => {
            let index = instance
                .images()
                .iter()
                .position(|image| &image.path == path)
                .unwrap_or(0);
            CompositionError::Slot {
                index,
                path: path.clone(),
                source,
            }
        }
        other => {
            // Only write failures get here; drop the partial composite.
            let _ = std::fs::remove_file(output);
            CompositionError::Write {
                path: output.to_path_buf(),
                source: other,
            }
        }
    })?;

    Ok(output.to_path_buf())
}

/// Compose `instance`, then write its web derivatives next to the composite.
///
/// With [`SourceDisposition::Delete`] the composite itself is removed once
/// all derivatives have been attempted.
pub fn compose_with_derivatives(
    backend: &impl ImageBackend,
    instance: &LayoutInstance,
    output: &Path,
    disposition: SourceDisposition,
) -> Result<(PathBuf, DerivativeSet), CompositionError> {
    let composite = compose(backend, instance, output)?;
    let set = derivatives::generate_composite_derivatives(backend, &composite, disposition)?;
    Ok((composite, set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::layout::LayoutCatalog;
    use crate::types::{AspectBucket, ImageRef};
    use tempfile::TempDir;

    fn write_placeholder(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    fn squares(root: &Path, n: usize) -> Vec<ImageRef> {
        (0..n)
            .map(|i| {
                let path = root.join(format!("Shirt/{i}.png"));
                write_placeholder(&path);
                ImageRef {
                    path,
                    bucket: AspectBucket::Square,
                }
            })
            .collect()
    }

    #[test]
    fn compose_sends_slots_in_order() {
        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let images = squares(tmp.path(), 4);
        let instance = LayoutInstance::bind(template, images.clone()).unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out/four_squares_in_corners_0.png");

        let written = compose(&backend, &instance, &output).unwrap();

        assert_eq!(written, output);
        assert!(output.exists());
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            RecordedOp::Compose {
                canvas, sources, ..
            } => {
                assert_eq!(*canvas, (1000, 1000));
                let expected: Vec<String> = images
                    .iter()
                    .map(|i| i.path.to_string_lossy().to_string())
                    .collect();
                assert_eq!(sources, &expected);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn missing_slot_image_fails_without_output() {
        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let mut images = squares(tmp.path(), 4);
        images[2].path = tmp.path().join("Shirt/missing.png");
        let instance = LayoutInstance::bind(template, images).unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out/x.png");

        let err = compose(&backend, &instance, &output).unwrap_err();

        assert!(matches!(err, CompositionError::Slot { index: 2, .. }));
        assert!(!output.exists());
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn undecodable_slot_reports_its_index() {
        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let images = squares(tmp.path(), 4);
        let backend = MockBackend::new();
        backend.fail_source(&images[1].path);
        let instance = LayoutInstance::bind(template, images).unwrap();
        let output = tmp.path().join("out/x.png");

        let err = compose(&backend, &instance, &output).unwrap_err();

        assert!(matches!(err, CompositionError::Slot { index: 1, .. }));
        assert!(!output.exists());
    }

    #[test]
    fn unreadable_slot_keeps_existing_output() {
        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let images = squares(tmp.path(), 4);
        let backend = MockBackend::new();
        backend.unreadable_source(&images[3].path);
        let instance = LayoutInstance::bind(template, images).unwrap();
        let output = tmp.path().join("out/x.png");
        write_placeholder(&output);
        std::fs::write(&output, b"previous run").unwrap();

        let err = compose(&backend, &instance, &output).unwrap_err();

        match err {
            CompositionError::Slot { index, source, .. } => {
                assert_eq!(index, 3);
                assert!(matches!(source, BackendError::Read { .. }));
            }
            other => panic!("expected slot error, got {other:?}"),
        }
        assert_eq!(std::fs::read(&output).unwrap(), b"previous run");
    }

    #[test]
    fn failed_write_removes_partial_output() {
        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let instance = LayoutInstance::bind(template, squares(tmp.path(), 4)).unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out/x.png");
        write_placeholder(&output);
        backend.fail_output(&output);

        let err = compose(&backend, &instance, &output).unwrap_err();

        assert!(matches!(err, CompositionError::Write { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn compose_with_derivatives_deletes_composite() {
        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let instance = LayoutInstance::bind(template, squares(tmp.path(), 4)).unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out/four_squares_in_corners_0.png");

        let (composite, set) =
            compose_with_derivatives(&backend, &instance, &output, SourceDisposition::Delete)
                .unwrap();

        assert_eq!(composite, output);
        assert!(!output.exists());
        assert_eq!(set.written.len(), 6);
        assert!(set.failed.is_empty());
        assert!(
            tmp.path()
                .join("out/four_squares_in_corners_0/200/four_squares_in_corners_0_lossless.webp")
                .exists()
        );
    }

    // =========================================================================
    // Real backend
    // =========================================================================

    fn real_squares(root: &Path) -> Vec<ImageRef> {
        let tmp_files: Vec<PathBuf> = (0..4).map(|i| root.join(format!("Shirt/{i}.png"))).collect();
        for (i, path) in tmp_files.iter().enumerate() {
            crate::test_helpers::write_png(path, 120, 120, [i as u8 * 60, 20, 200]);
        }
        tmp_files
            .into_iter()
            .map(|path| ImageRef {
                path,
                bucket: AspectBucket::Square,
            })
            .collect()
    }

    #[test]
    fn composing_twice_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let instance = LayoutInstance::bind(template, real_squares(tmp.path())).unwrap();
        let backend = crate::imaging::RustBackend::new();

        let first = compose(&backend, &instance, &tmp.path().join("a.png")).unwrap();
        let second = compose(&backend, &instance, &tmp.path().join("b.png")).unwrap();

        assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
    }

    #[test]
    fn real_composite_derivatives_have_scaled_sizes() {
        use crate::test_helpers::dimensions_of;

        let tmp = TempDir::new().unwrap();
        let catalog = LayoutCatalog::standard();
        let template = catalog.get("four_squares_in_corners").unwrap();
        let instance = LayoutInstance::bind(template, real_squares(tmp.path())).unwrap();
        let output = tmp.path().join("out/four_squares_in_corners_0.png");

        let (_, set) = compose_with_derivatives(
            &crate::imaging::RustBackend::new(),
            &instance,
            &output,
            SourceDisposition::Keep,
        )
        .unwrap();

        assert_eq!(dimensions_of(&output), (1000, 1000));
        assert!(set.failed.is_empty());
        let dir = tmp.path().join("out/four_squares_in_corners_0");
        assert_eq!(
            dimensions_of(&dir.join("300/four_squares_in_corners_0_compressed.webp")),
            (300, 300)
        );
        assert_eq!(
            dimensions_of(&dir.join("400/four_squares_in_corners_0_lossless.webp")),
            (400, 400)
        );
    }

    #[test]
    fn single_layout_centers_wide_image() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("Shirt/panorama.png");
        crate::test_helpers::write_png(&source, 3000, 1000, [0, 0, 0]);
        let catalog = LayoutCatalog::standard();
        let template = catalog.single_for(AspectBucket::Landscape169).unwrap();
        let instance = LayoutInstance::bind(
            template,
            vec![ImageRef {
                path: source,
                bucket: AspectBucket::Landscape169,
            }],
        )
        .unwrap();
        let output = tmp.path().join("panorama_processed.png");

        compose(&crate::imaging::RustBackend::new(), &instance, &output).unwrap();

        let canvas = image::open(&output).unwrap().to_rgba8();
        assert_eq!(canvas.dimensions(), (1000, 563));
        let white = image::Rgba([255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(500, 0), &white);
        assert_eq!(canvas.get_pixel(500, 562), &white);
        assert_eq!(canvas.get_pixel(500, 281), &image::Rgba([0, 0, 0, 255]));
        let top_band = (0..563).take_while(|&y| canvas.get_pixel(500, y) == &white).count();
        let bottom_band = (0..563)
            .rev()
            .take_while(|&y| canvas.get_pixel(500, y) == &white)
            .count();
        assert!(top_band.abs_diff(bottom_band) <= 1, "{top_band} vs {bottom_band}");
    }
}
