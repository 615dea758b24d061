//! Multi-resolution derivative generation.
//!
//! Two fixed policies, each a static matrix of [`DerivativeSpec`] cells:
//!
//! ## Composite policy
//!
//! Applied to freshly rendered layouts. Three widths × two WebP encodings,
//! height following the source aspect ratio:
//!
//! ```text
//! out/
//! ├── four_squares_in_corners_0.png          # deleted afterwards
//! └── four_squares_in_corners_0/
//!     ├── 200/
//!     │   ├── four_squares_in_corners_0_lossless.webp
//!     │   └── four_squares_in_corners_0_compressed.webp
//!     ├── 300/…
//!     └── 400/…
//! ```
//!
//! ## Square policy
//!
//! Applied to per-item source photos. Five cover-fit square sizes, each as
//! PNG and compressed WebP:
//!
//! ```text
//! out/Shirt/front/
//! ├── 233x233/front.png
//! ├── 233x233/front.webp
//! ├── 308x308/…
//! └── 700x700/…
//! ```
//!
//! A failing cell is recorded in the returned [`DerivativeSet`] and never
//! stops its siblings.

use crate::imaging::{
    BackendError, Encoding, ImageBackend, Quality, ResizeParams, SquareCropParams, scaled_height,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Target widths of the composite policy.
pub const COMPOSITE_WIDTHS: [u32; 3] = [200, 300, 400];
/// Target square sides of the square policy.
pub const SQUARE_SIDES: [u32; 5] = [233, 308, 406, 532, 700];

#[derive(Error, Debug)]
pub enum DerivativeError {
    #[error("Cannot read derivative source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What to do with the source file once every cell has been attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDisposition {
    Keep,
    Delete,
}

/// One cell of a derivative matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeSpec {
    /// Directory name of the cell, e.g. `"300"` or `"308x308"`.
    pub size_label: &'static str,
    pub pixel_width: u32,
    pub encoding: Encoding,
}

impl DerivativeSpec {
    /// Suffix distinguishing the two composite encodings.
    fn mode_suffix(&self) -> &'static str {
        match self.encoding {
            Encoding::WebpCompressed(_) => "compressed",
            Encoding::WebpLossless | Encoding::Png => "lossless",
        }
    }
}

const COMPOSITE_MATRIX: [DerivativeSpec; 6] = [
    matrix_cell("200", 200, Encoding::WebpLossless),
    matrix_cell("200", 200, Encoding::WebpCompressed(Quality::COMPRESSED)),
    matrix_cell("300", 300, Encoding::WebpLossless),
    matrix_cell("300", 300, Encoding::WebpCompressed(Quality::COMPRESSED)),
    matrix_cell("400", 400, Encoding::WebpLossless),
    matrix_cell("400", 400, Encoding::WebpCompressed(Quality::COMPRESSED)),
];

const SQUARE_MATRIX: [DerivativeSpec; 10] = [
    matrix_cell("233x233", 233, Encoding::Png),
    matrix_cell("233x233", 233, Encoding::WebpCompressed(Quality::COMPRESSED)),
    matrix_cell("308x308", 308, Encoding::Png),
    matrix_cell("308x308", 308, Encoding::WebpCompressed(Quality::COMPRESSED)),
    matrix_cell("406x406", 406, Encoding::Png),
    matrix_cell("406x406", 406, Encoding::WebpCompressed(Quality::COMPRESSED)),
    matrix_cell("532x532", 532, Encoding::Png),
    matrix_cell("532x532", 532, Encoding::WebpCompressed(Quality::COMPRESSED)),
    matrix_cell("700x700", 700, Encoding::Png),
    matrix_cell("700x700", 700, Encoding::WebpCompressed(Quality::COMPRESSED)),
];

const fn matrix_cell(size_label: &'static str, pixel_width: u32, encoding: Encoding) -> DerivativeSpec {
    DerivativeSpec {
        size_label,
        pixel_width,
        encoding,
    }
}

/// The composite policy matrix: [`COMPOSITE_WIDTHS`] × {lossless, compressed}.
pub fn composite_matrix() -> &'static [DerivativeSpec] {
    &COMPOSITE_MATRIX
}

/// The square policy matrix: [`SQUARE_SIDES`] × {PNG, compressed WebP}.
pub fn square_matrix() -> &'static [DerivativeSpec] {
    &SQUARE_MATRIX
}

/// A cell that could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeFailure {
    pub label: String,
    pub output: PathBuf,
    pub message: String,
}

/// Outcome of running one policy over one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivativeSet {
    pub written: Vec<PathBuf>,
    pub failed: Vec<DerivativeFailure>,
}

impl DerivativeSet {
    fn record(&mut self, spec: &DerivativeSpec, output: PathBuf, result: Result<(), BackendError>) {
        match result {
            Ok(()) => self.written.push(output),
            Err(e) => self.failed.push(DerivativeFailure {
                label: format!("{} {}", spec.size_label, spec.mode_suffix()),
                output,
                message: e.to_string(),
            }),
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory holding the composite derivatives of `source`: `<dir>/<base>`.
pub fn composite_root(source: &Path) -> PathBuf {
    source
        .parent()
        .unwrap_or(Path::new(""))
        .join(base_name(source))
}

/// Write the composite policy for `source` into `<dir>/<base>/<width>/`.
///
/// `dir` is the directory containing `source`. With
/// [`SourceDisposition::Delete`] the source is removed after every cell has
/// been attempted, whether or not the cells succeeded.
pub fn generate_composite_derivatives(
    backend: &impl ImageBackend,
    source: &Path,
    disposition: SourceDisposition,
) -> Result<DerivativeSet, DerivativeError> {
    let dims = backend
        .identify(source)
        .map_err(|e| DerivativeError::Source {
            path: source.to_path_buf(),
            source: e,
        })?;
    let base = base_name(source);
    let root = composite_root(source);

    let mut set = DerivativeSet::default();
    for spec in composite_matrix() {
        let dir = root.join(spec.size_label);
        std::fs::create_dir_all(&dir)?;
        let output = dir.join(format!(
            "{}_{}.{}",
            base,
            spec.mode_suffix(),
            spec.encoding.extension()
        ));
        let result = backend.resize(&ResizeParams {
            source: source.to_path_buf(),
            output: output.clone(),
            width: spec.pixel_width,
            height: scaled_height(dims.as_tuple(), spec.pixel_width),
            encoding: spec.encoding,
        });
        set.record(spec, output, result);
    }

    if disposition == SourceDisposition::Delete {
        std::fs::remove_file(source)?;
    }
    Ok(set)
}

/// Write the square policy for `source` into `<output_root>/<base>/<N>x<N>/`.
///
/// The source is never deleted.
pub fn generate_square_derivatives(
    backend: &impl ImageBackend,
    source: &Path,
    output_root: &Path,
) -> Result<DerivativeSet, DerivativeError> {
    let base = base_name(source);
    let root = output_root.join(&base);

    let mut set = DerivativeSet::default();
    for spec in square_matrix() {
        let dir = root.join(spec.size_label);
        std::fs::create_dir_all(&dir)?;
        let output = dir.join(format!("{}.{}", base, spec.encoding.extension()));
        let result = backend.square_crop(&SquareCropParams {
            source: source.to_path_buf(),
            output: output.clone(),
            side: spec.pixel_width,
            encoding: spec.encoding,
        });
        set.record(spec, output, result);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use tempfile::TempDir;

    fn placeholder(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn composite_matrix_is_three_widths_by_two_encodings() {
        let widths: Vec<u32> = composite_matrix().iter().map(|s| s.pixel_width).collect();
        assert_eq!(widths, vec![200, 200, 300, 300, 400, 400]);
        for spec in composite_matrix() {
            assert_eq!(spec.size_label, spec.pixel_width.to_string());
        }
        for pair in composite_matrix().chunks(2) {
            assert_eq!(pair[0].encoding, Encoding::WebpLossless);
            assert_eq!(pair[1].encoding, Encoding::WebpCompressed(Quality::COMPRESSED));
        }
    }

    #[test]
    fn square_matrix_covers_every_side_twice() {
        assert_eq!(square_matrix().len(), SQUARE_SIDES.len() * 2);
        for side in SQUARE_SIDES {
            let cells: Vec<&DerivativeSpec> =
                square_matrix().iter().filter(|s| s.pixel_width == side).collect();
            assert_eq!(cells.len(), 2);
            assert_eq!(cells[0].size_label, format!("{side}x{side}"));
        }
    }

    #[test]
    fn composite_writes_six_files_and_deletes_source() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("layout_0.png");
        placeholder(&source);
        let backend = MockBackend::with_dimensions(&[(&source, 1000, 1000)]);

        let set =
            generate_composite_derivatives(&backend, &source, SourceDisposition::Delete).unwrap();

        assert_eq!(set.written.len(), 6);
        assert!(set.failed.is_empty());
        assert!(!source.exists());
        for width in COMPOSITE_WIDTHS {
            let dir = tmp.path().join(format!("layout_0/{width}"));
            assert!(dir.join("layout_0_lossless.webp").exists());
            assert!(dir.join("layout_0_compressed.webp").exists());
        }
    }

    #[test]
    fn composite_heights_follow_source_ratio() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("wide.png");
        placeholder(&source);
        let backend = MockBackend::with_dimensions(&[(&source, 1000, 563)]);

        generate_composite_derivatives(&backend, &source, SourceDisposition::Keep).unwrap();

        let sizes: Vec<(u32, u32, u32)> = backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Resize {
                    width,
                    height,
                    quality,
                    ..
                } => Some((width, height, quality)),
                _ => None,
            })
            .collect();
        assert_eq!(
            sizes,
            vec![
                (200, 113, 100),
                (200, 113, 10),
                (300, 169, 100),
                (300, 169, 10),
                (400, 225, 100),
                (400, 225, 10),
            ]
        );
        assert!(source.exists());
    }

    #[test]
    fn failed_cell_does_not_stop_siblings() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("layout_1.png");
        placeholder(&source);
        let backend = MockBackend::with_dimensions(&[(&source, 800, 800)]);
        backend.fail_output(&tmp.path().join("layout_1/300/layout_1_compressed.webp"));

        let set =
            generate_composite_derivatives(&backend, &source, SourceDisposition::Delete).unwrap();

        assert_eq!(set.written.len(), 5);
        assert_eq!(set.failed.len(), 1);
        assert_eq!(set.failed[0].label, "300 compressed");
        // Deleted once every cell was attempted
        assert!(!source.exists());
    }

    #[test]
    fn unreadable_source_is_kept() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("broken.png");
        placeholder(&source);
        let backend = MockBackend::new();

        let err = generate_composite_derivatives(&backend, &source, SourceDisposition::Delete)
            .unwrap_err();

        assert!(matches!(err, DerivativeError::Source { .. }));
        assert!(source.exists());
    }

    #[test]
    fn square_policy_layout() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("Images/Shirt/front.jpg");
        placeholder(&source);
        let out = tmp.path().join("out/Shirt");
        let backend = MockBackend::new();

        let set = generate_square_derivatives(&backend, &source, &out).unwrap();

        assert_eq!(set.written.len(), 10);
        for side in SQUARE_SIDES {
            let dir = out.join(format!("front/{side}x{side}"));
            assert!(dir.join("front.png").exists());
            assert!(dir.join("front.webp").exists());
        }
        assert!(source.exists());

        let sides: Vec<u32> = backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::SquareCrop { side, .. } => Some(side),
                _ => None,
            })
            .collect();
        assert_eq!(sides, vec![233, 233, 308, 308, 406, 406, 532, 532, 700, 700]);
    }
}
