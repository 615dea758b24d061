//! Aspect-ratio classification of source images.
//!
//! Every image under the source root is read (header only) and sorted into
//! one of the five [`AspectBucket`]s. The buckets drive layout selection:
//! a multi-image template asks for images by bucket, never by path.
//!
//! ## Bucket boundaries
//!
//! Comparisons are done on integers (`9·w` vs `16·h`), so the boundaries are
//! exact: a 1600×900 image is landscape 16:9, a 900×1600 image is
//! portrait 16:9, and only `w == h` is square.
//!
//! ## Walking
//!
//! [`categorize`] walks the tree recursively in file-name order. Entries whose
//! name starts with `.` are skipped together with everything below them.
//! A file that cannot be decoded is recorded in
//! [`Categorization::skipped`] and the walk continues; only a failure to read
//! the root itself is fatal.

use crate::imaging::{BackendError, ImageBackend};
use crate::types::{AspectBucket, ImageRef};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Cannot classify {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Cannot walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Bucket for an image of `width`×`height` pixels.
pub fn bucket_for(width: u32, height: u32) -> AspectBucket {
    let (w, h) = (width as u64, height as u64);
    if w == h {
        AspectBucket::Square
    } else if w > h {
        if 9 * w >= 16 * h {
            AspectBucket::Landscape169
        } else {
            AspectBucket::Landscape43
        }
    } else if 16 * w <= 9 * h {
        AspectBucket::Portrait169
    } else {
        AspectBucket::Portrait43
    }
}

/// Classify a single image from its header dimensions.
pub fn classify(backend: &impl ImageBackend, path: &Path) -> Result<ImageRef, ClassifyError> {
    let dims = backend
        .identify(path)
        .map_err(|source| ClassifyError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if dims.width == 0 || dims.height == 0 {
        return Err(ClassifyError::Decode {
            path: path.to_path_buf(),
            source: BackendError::ProcessingFailed(format!(
                "degenerate dimensions {}x{}",
                dims.width, dims.height
            )),
        });
    }
    Ok(ImageRef {
        path: path.to_path_buf(),
        bucket: bucket_for(dims.width, dims.height),
    })
}

/// Classified images grouped by bucket, in discovery order within each bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Categories {
    buckets: BTreeMap<AspectBucket, Vec<ImageRef>>,
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            buckets: AspectBucket::ALL.iter().map(|b| (*b, Vec::new())).collect(),
        }
    }
}

impl Categories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, image: ImageRef) {
        self.buckets.entry(image.bucket).or_default().push(image);
    }

    /// Images in `bucket`, in discovery order.
    pub fn get(&self, bucket: AspectBucket) -> &[ImageRef] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, bucket: AspectBucket) -> usize {
        self.get(bucket).len()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// `(bucket, count)` for every bucket, in display order.
    pub fn counts(&self) -> Vec<(AspectBucket, usize)> {
        AspectBucket::ALL
            .iter()
            .map(|b| (*b, self.count(*b)))
            .collect()
    }
}

impl FromIterator<ImageRef> for Categories {
    fn from_iter<I: IntoIterator<Item = ImageRef>>(iter: I) -> Self {
        let mut categories = Categories::new();
        for image in iter {
            categories.push(image);
        }
        categories
    }
}

/// A file the walk could not classify.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Output of [`categorize`].
#[derive(Debug, Clone, Default)]
pub struct Categorization {
    pub categories: Categories,
    pub skipped: Vec<SkippedFile>,
}

/// Whether a walk entry is hidden (name starts with `.`). The root itself never is.
fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Recursively classify every non-hidden file under `root`.
pub fn categorize(
    backend: &impl ImageBackend,
    root: &Path,
) -> Result<Categorization, ClassifyError> {
    let mut result = Categorization::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(ClassifyError::Walk(err)),
            Err(err) => {
                result.skipped.push(SkippedFile {
                    path: err.path().map(Path::to_path_buf).unwrap_or_default(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        match classify(backend, entry.path()) {
            Ok(image) => result.categories.push(image),
            Err(err) => result.skipped.push(SkippedFile {
                path: entry.path().to_path_buf(),
                reason: err.to_string(),
            }),
        }
    }

    Ok(result)
}
