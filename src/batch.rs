//! Batch orchestration: classify a source tree, then drive the composer and
//! derivative generator over it.
//!
//! Three passes share this module:
//!
//! - [`run_layouts`]: a fixed number of multi-image layout attempts. Each
//!   attempt picks a multi-image template uniformly at random, draws distinct
//!   images for its slots from the matching buckets, composes, writes the
//!   composite derivatives and records a [`LayoutResult`]. Unsatisfiable or
//!   failed attempts are dropped, never retried.
//! - [`process_singles`]: every image of every item folder through its
//!   bucket's single-image template.
//! - [`process_squares`]: every image of every item folder through the
//!   square-crop derivative policy.
//!
//! Images are drawn without replacement within one layout and with
//! replacement across attempts, so one photo may appear in several composites.
//!
//! Randomness comes from a caller-supplied [`Rng`]; seed it for reproducible
//! runs. Progress is reported as [`BatchEvent`]s over an optional channel.

use crate::classify::{self, Categories, ClassifyError};
use crate::compose::compose_with_derivatives;
use crate::derivatives::{self, DerivativeError, DerivativeSet, SourceDisposition};
use crate::imaging::ImageBackend;
use crate::items::ItemMapping;
use crate::layout::{LayoutCatalog, LayoutError, LayoutInstance, LayoutTemplate};
use crate::types::{AspectBucket, ImageRef, ItemId, LayoutResult};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Classification failed: {0}")]
    Classify(#[from] ClassifyError),
    #[error("Derivative generation failed: {0}")]
    Derivative(#[from] DerivativeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// The source tree was classified.
    Categorized {
        counts: Vec<(AspectBucket, usize)>,
        skipped: usize,
    },
    /// A file could not be decoded and was left out.
    FileSkipped { path: PathBuf, reason: String },
    LayoutComposed {
        attempt: usize,
        template: String,
        output: PathBuf,
        item_ids: Vec<ItemId>,
    },
    /// An attempt yielded nothing: unsatisfiable template or failed composition.
    AttemptDropped {
        attempt: usize,
        template: String,
        reason: String,
    },
    DerivativeFailed {
        source: PathBuf,
        label: String,
        message: String,
    },
    /// A consumed image's folder has no item id. Reported once per folder.
    UnmappedFolder { folder: String },
    SingleProcessed {
        source: PathBuf,
        output: PathBuf,
        template: String,
    },
    SquareProcessed { source: PathBuf, written: usize },
}

/// Knobs for the layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub attempts: usize,
    /// Keep full-size composites next to their derivatives.
    pub keep_composites: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            attempts: 100,
            keep_composites: false,
        }
    }
}

impl BatchOptions {
    fn disposition(&self) -> SourceDisposition {
        if self.keep_composites {
            SourceDisposition::Keep
        } else {
            SourceDisposition::Delete
        }
    }
}

/// Outcome of [`run_layouts`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutReport {
    pub results: Vec<LayoutResult>,
    pub dropped: usize,
    pub unmapped: BTreeSet<String>,
}

/// Outcome of a per-file pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub processed: usize,
    pub skipped: usize,
}

fn emit(progress: &Option<Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = progress {
        // A gone receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

fn report_derivative_failures(
    progress: &Option<Sender<BatchEvent>>,
    source: &Path,
    set: &DerivativeSet,
) {
    for failure in &set.failed {
        emit(
            progress,
            BatchEvent::DerivativeFailed {
                source: source.to_path_buf(),
                label: failure.label.clone(),
                message: failure.message.clone(),
            },
        );
    }
}

/// Classify every image under `root`, reporting skipped files and bucket counts.
pub fn categorize_tree(
    backend: &impl ImageBackend,
    root: &Path,
    progress: Option<Sender<BatchEvent>>,
) -> Result<Categories, BatchError> {
    let categorization = classify::categorize(backend, root)?;
    for skipped in &categorization.skipped {
        emit(
            &progress,
            BatchEvent::FileSkipped {
                path: skipped.path.clone(),
                reason: skipped.reason.clone(),
            },
        );
    }
    emit(
        &progress,
        BatchEvent::Categorized {
            counts: categorization.categories.counts(),
            skipped: categorization.skipped.len(),
        },
    );
    Ok(categorization.categories)
}

/// Draw distinct images for every slot of `template`, in slot order.
pub fn draw_images(
    template: &LayoutTemplate,
    categories: &Categories,
    rng: &mut impl Rng,
) -> Result<Vec<ImageRef>, LayoutError> {
    let mut drawn: BTreeMap<AspectBucket, std::vec::IntoIter<ImageRef>> = BTreeMap::new();
    for (bucket, needed) in template.requirements() {
        let pool = categories.get(bucket);
        if pool.len() < needed {
            return Err(LayoutError::ConstraintUnsatisfiable {
                template: template.name.clone(),
                bucket,
                needed,
                available: pool.len(),
            });
        }
        let picks: Vec<ImageRef> = pool.choose_multiple(rng, needed).cloned().collect();
        drawn.insert(bucket, picks.into_iter());
    }

    Ok(template
        .slots
        .iter()
        .filter_map(|slot| drawn.get_mut(&slot.bucket).and_then(Iterator::next))
        .collect())
}

/// Run `options.attempts` multi-image layout attempts into `output_dir`.
///
/// Attempt `i` writes `<output_dir>/<template>_<i>.png` and its derivatives.
/// Only failing to create `output_dir` aborts the run.
#[allow(clippy::too_many_arguments)]
pub fn run_layouts(
    backend: &impl ImageBackend,
    catalog: &LayoutCatalog,
    categories: &Categories,
    mapping: &ItemMapping,
    output_dir: &Path,
    options: &BatchOptions,
    rng: &mut impl Rng,
    progress: Option<Sender<BatchEvent>>,
) -> Result<LayoutReport, BatchError> {
    std::fs::create_dir_all(output_dir)?;
    let templates = catalog.multi();
    let mut report = LayoutReport::default();

    for attempt in 0..options.attempts {
        let Some(template) = templates.choose(rng).copied() else {
            break;
        };
        let drop_attempt = |report: &mut LayoutReport, reason: String| {
            report.dropped += 1;
            emit(
                &progress,
                BatchEvent::AttemptDropped {
                    attempt,
                    template: template.name.clone(),
                    reason,
                },
            );
        };

        let instance = match draw_images(template, categories, rng)
            .and_then(|images| LayoutInstance::bind(template, images))
        {
            Ok(instance) => instance,
            Err(e) => {
                drop_attempt(&mut report, e.to_string());
                continue;
            }
        };

        let output = output_dir.join(format!("{}_{}.png", template.name, attempt));
        let set = match compose_with_derivatives(backend, &instance, &output, options.disposition())
        {
            Ok((_, set)) => set,
            Err(e) => {
                drop_attempt(&mut report, e.to_string());
                continue;
            }
        };
        report_derivative_failures(&progress, &output, &set);

        let resolved = mapping.resolve(instance.images().iter().map(|image| image.path.as_path()));
        for folder in resolved.unmapped {
            if report.unmapped.insert(folder.clone()) {
                emit(&progress, BatchEvent::UnmappedFolder { folder });
            }
        }

        emit(
            &progress,
            BatchEvent::LayoutComposed {
                attempt,
                template: template.name.clone(),
                output: output.clone(),
                item_ids: resolved.item_ids.iter().cloned().collect(),
            },
        );
        report.results.push(LayoutResult {
            item_ids: resolved.item_ids,
            output_image_path: output,
        });
    }

    Ok(report)
}

/// Non-hidden item folders under `root` and their non-hidden files, sorted.
fn item_folders(root: &Path) -> Result<Vec<(String, Vec<PathBuf>)>, BatchError> {
    let mut folders = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        let mut files = Vec::new();
        for file in std::fs::read_dir(entry.path())? {
            let file = file?;
            let hidden = file.file_name().to_string_lossy().starts_with('.');
            if !hidden && file.file_type()?.is_file() {
                files.push(file.path());
            }
        }
        files.sort();
        folders.push((name, files));
    }
    folders.sort();
    Ok(folders)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Single-image pass: each file of each item folder in `source_root` goes
/// through its bucket's single template to
/// `<dest_root>/<folder>/Images/<stem>_processed.png`, then gets composite
/// derivatives.
pub fn process_singles(
    backend: &impl ImageBackend,
    catalog: &LayoutCatalog,
    source_root: &Path,
    dest_root: &Path,
    options: &BatchOptions,
    progress: Option<Sender<BatchEvent>>,
) -> Result<PassReport, BatchError> {
    let mut report = PassReport::default();
    for (folder, files) in item_folders(source_root)? {
        let out_dir = dest_root.join(&folder).join("Images");
        for file in files {
            let skip = |report: &mut PassReport, reason: String| {
                report.skipped += 1;
                emit(
                    &progress,
                    BatchEvent::FileSkipped {
                        path: file.clone(),
                        reason,
                    },
                );
            };

            let image = match classify::classify(backend, &file) {
                Ok(image) => image,
                Err(e) => {
                    skip(&mut report, e.to_string());
                    continue;
                }
            };
            let Some(template) = catalog.single_for(image.bucket) else {
                skip(&mut report, format!("no single template for {}", image.bucket));
                continue;
            };
            let output = out_dir.join(format!("{}_processed.png", stem_of(&file)));
            let result = LayoutInstance::bind(template, vec![image])
                .map_err(|e| e.to_string())
                .and_then(|instance| {
                    compose_with_derivatives(backend, &instance, &output, options.disposition())
                        .map_err(|e| e.to_string())
                });
            match result {
                Ok((_, set)) => {
                    report_derivative_failures(&progress, &output, &set);
                    report.processed += 1;
                    emit(
                        &progress,
                        BatchEvent::SingleProcessed {
                            source: file.clone(),
                            output,
                            template: template.name.clone(),
                        },
                    );
                }
                Err(reason) => skip(&mut report, reason),
            }
        }
    }
    Ok(report)
}

/// Square-crop pass: each file of each item folder in `source_root` gets the
/// square derivative matrix under `<dest_root>/<folder>/<stem>/<N>x<N>/`.
pub fn process_squares(
    backend: &impl ImageBackend,
    source_root: &Path,
    dest_root: &Path,
    progress: Option<Sender<BatchEvent>>,
) -> Result<PassReport, BatchError> {
    let mut report = PassReport::default();
    for (folder, files) in item_folders(source_root)? {
        let out_dir = dest_root.join(&folder);
        for file in files {
            if let Err(e) = classify::classify(backend, &file) {
                report.skipped += 1;
                emit(
                    &progress,
                    BatchEvent::FileSkipped {
                        path: file.clone(),
                        reason: e.to_string(),
                    },
                );
                continue;
            }
            let set = derivatives::generate_square_derivatives(backend, &file, &out_dir)?;
            report_derivative_failures(&progress, &file, &set);
            report.processed += 1;
            emit(
                &progress,
                BatchEvent::SquareProcessed {
                    source: file,
                    written: set.written.len(),
                },
            );
        }
    }
    Ok(report)
}

/// Write the layout manifest as pretty JSON.
pub fn write_manifest(path: &Path, results: &[LayoutResult]) -> Result<(), BatchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<LayoutResult>, BatchError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
