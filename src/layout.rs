//! The layout catalog: fixed composition templates and their binding to images.
//!
//! A [`LayoutTemplate`] is authored geometry — a canvas size plus a list of
//! [`SlotSpec`]s, each with a required [`AspectBucket`] and a fixed rectangle.
//! Nothing about a template is computed at selection time; selection only
//! decides *which* template to use and *which* images fill it, producing a
//! [`LayoutInstance`].
//!
//! ## Families
//!
//! **Single-image** (one per bucket): the canvas has the bucket's aspect ratio
//! at a 1000px long edge and the slot covers it entirely, scaled with
//! [`Fit::Contain`] and centered so nothing is cropped.
//!
//! ```text
//! single_square          1000×1000
//! single_portrait_43      750×1000
//! single_landscape_43    1000×750
//! single_portrait_169     563×1000
//! single_landscape_169   1000×563
//! ```
//!
//! **Multi-image** (13 templates on a 1000×1000 canvas, [`Fit::Cover`]):
//!
//! ```text
//! three_169_rows         ┌──[L]──┐   two_squares_one_43_portrait   ┌───┬─S─┐
//!                        ├──[L]──┤                                 │ P ├───┤
//!                        └──[L]──┘                                 └───┴─S─┘
//! ```
//!
//! plus column/row variants for 16:9, square+4:3 and square+16:9 hybrids
//! (each with a mirrored `_reverse` form), and four squares in the corners.
//!
//! ## Invariants
//!
//! Every slot lies inside its canvas. [`LayoutCatalog::from_templates`]
//! rejects templates that break this; [`LayoutCatalog::standard`] is covered
//! by tests. A catalog hands out shared references only.

use crate::imaging::{ComposeParams, Fit, Placement, canvas_for_aspect};
use crate::types::{AspectBucket, ImageRef};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Long edge of every single-image canvas.
pub const SINGLE_LONG_EDGE: u32 = 1000;
/// Side of every multi-image canvas.
pub const MULTI_CANVAS: u32 = 1000;
/// Canvas fill behind and between slots.
pub const BACKGROUND: [u8; 4] = [255, 255, 255, 255];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Template {template} needs {needed} {bucket} image(s), only {available} available")]
    ConstraintUnsatisfiable {
        template: String,
        bucket: AspectBucket,
        needed: usize,
        available: usize,
    },
    #[error("Template {template} has {expected} slot(s), got {got} image(s)")]
    ArityMismatch {
        template: String,
        expected: usize,
        got: usize,
    },
    #[error("Template {template} slot {slot} needs a {expected} image, got {got}")]
    BucketMismatch {
        template: String,
        slot: usize,
        expected: AspectBucket,
        got: AspectBucket,
    },
    #[error("Template {template} slot {slot} does not fit its {width}x{height} canvas")]
    OutOfBounds {
        template: String,
        slot: usize,
        width: u32,
        height: u32,
    },
}

/// One authored slot: required bucket and fixed rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub bucket: AspectBucket,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

const fn slot(bucket: AspectBucket, x: u32, y: u32, width: u32, height: u32) -> SlotSpec {
    SlotSpec {
        bucket,
        x,
        y,
        width,
        height,
    }
}

/// Authored composition geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutTemplate {
    pub name: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub fit: Fit,
    pub slots: Vec<SlotSpec>,
}

impl LayoutTemplate {
    /// Number of images the template takes.
    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_single(&self) -> bool {
        self.arity() == 1
    }

    /// How many images of each bucket the template needs.
    pub fn requirements(&self) -> BTreeMap<AspectBucket, usize> {
        let mut needs = BTreeMap::new();
        for slot in &self.slots {
            *needs.entry(slot.bucket).or_insert(0) += 1;
        }
        needs
    }

    /// Whether the multiset of `available` buckets covers every slot.
    pub fn satisfiable_by(&self, available: &[AspectBucket]) -> bool {
        let mut have: BTreeMap<AspectBucket, usize> = BTreeMap::new();
        for bucket in available {
            *have.entry(*bucket).or_insert(0) += 1;
        }
        self.requirements()
            .iter()
            .all(|(bucket, needed)| have.get(bucket).copied().unwrap_or(0) >= *needed)
    }

    /// Check that every slot rectangle lies inside the canvas.
    pub fn check_bounds(&self) -> Result<(), LayoutError> {
        for (index, s) in self.slots.iter().enumerate() {
            let past = |start: u32, extent: u32, limit: u32| {
                start.checked_add(extent).is_none_or(|end| end > limit)
            };
            if past(s.x, s.width, self.canvas_width) || past(s.y, s.height, self.canvas_height) {
                return Err(LayoutError::OutOfBounds {
                    template: self.name.clone(),
                    slot: index,
                    width: self.canvas_width,
                    height: self.canvas_height,
                });
            }
        }
        Ok(())
    }
}

fn single(name: &str, bucket: AspectBucket, aspect: (u32, u32)) -> LayoutTemplate {
    let (width, height) = canvas_for_aspect(aspect, SINGLE_LONG_EDGE);
    LayoutTemplate {
        name: name.to_string(),
        canvas_width: width,
        canvas_height: height,
        fit: Fit::Contain,
        slots: vec![slot(bucket, 0, 0, width, height)],
    }
}

fn multi(name: &str, slots: &[SlotSpec]) -> LayoutTemplate {
    LayoutTemplate {
        name: name.to_string(),
        canvas_width: MULTI_CANVAS,
        canvas_height: MULTI_CANVAS,
        fit: Fit::Cover,
        slots: slots.to_vec(),
    }
}

fn single_templates() -> Vec<LayoutTemplate> {
    use AspectBucket::*;
    vec![
        single("single_square", Square, (1, 1)),
        single("single_portrait_43", Portrait43, (3, 4)),
        single("single_landscape_43", Landscape43, (4, 3)),
        single("single_portrait_169", Portrait169, (9, 16)),
        single("single_landscape_169", Landscape169, (16, 9)),
    ]
}

fn multi_templates() -> Vec<LayoutTemplate> {
    use AspectBucket::*;
    vec![
        // 16:9 rows and columns
        multi(
            "three_169_rows",
            &[
                slot(Landscape169, 233, 0, 534, 300),
                slot(Landscape169, 233, 350, 534, 300),
                slot(Landscape169, 233, 700, 534, 300),
            ],
        ),
        multi(
            "two_169_rows",
            &[
                slot(Landscape169, 78, 0, 844, 475),
                slot(Landscape169, 78, 525, 844, 475),
            ],
        ),
        multi(
            "three_169_columns",
            &[
                slot(Portrait169, 0, 233, 300, 534),
                slot(Portrait169, 350, 233, 300, 534),
                slot(Portrait169, 700, 233, 300, 534),
            ],
        ),
        multi(
            "two_169_columns",
            &[
                slot(Portrait169, 0, 78, 475, 844),
                slot(Portrait169, 525, 78, 475, 844),
            ],
        ),
        // Squares with 4:3
        multi(
            "two_squares_one_43_portrait",
            &[
                slot(Square, 525, 525, 475, 475),
                slot(Square, 525, 0, 475, 475),
                slot(Portrait43, 0, 183, 475, 634),
            ],
        ),
        multi(
            "two_squares_one_43_landscape",
            &[
                slot(Square, 525, 525, 475, 475),
                slot(Square, 0, 525, 475, 475),
                slot(Landscape43, 183, 0, 634, 475),
            ],
        ),
        multi(
            "two_squares_one_43_portrait_reverse",
            &[
                slot(Square, 0, 525, 475, 475),
                slot(Square, 0, 0, 475, 475),
                slot(Portrait43, 525, 183, 475, 634),
            ],
        ),
        multi(
            "two_squares_one_43_landscape_reverse",
            &[
                slot(Square, 525, 0, 475, 475),
                slot(Square, 0, 0, 475, 475),
                slot(Landscape43, 183, 525, 634, 475),
            ],
        ),
        // Squares with 16:9
        multi(
            "two_squares_one_169_portrait",
            &[
                slot(Square, 525, 525, 475, 475),
                slot(Square, 525, 0, 475, 475),
                slot(Portrait169, 0, 77, 475, 846),
            ],
        ),
        multi(
            "two_squares_one_169_landscape",
            &[
                slot(Square, 525, 525, 475, 475),
                slot(Square, 0, 525, 475, 475),
                slot(Landscape169, 77, 0, 846, 475),
            ],
        ),
        multi(
            "two_squares_one_169_portrait_reverse",
            &[
                slot(Square, 0, 525, 475, 475),
                slot(Square, 0, 0, 475, 475),
                slot(Portrait169, 525, 77, 475, 846),
            ],
        ),
        multi(
            "two_squares_one_169_landscape_reverse",
            &[
                slot(Square, 525, 0, 475, 475),
                slot(Square, 0, 0, 475, 475),
                slot(Landscape169, 77, 525, 846, 475),
            ],
        ),
        // All squares
        multi(
            "four_squares_in_corners",
            &[
                slot(Square, 0, 0, 475, 475),
                slot(Square, 525, 0, 475, 475),
                slot(Square, 0, 525, 475, 475),
                slot(Square, 525, 525, 475, 475),
            ],
        ),
    ]
}

/// Read-only registry of templates, passed explicitly to whoever selects layouts.
#[derive(Debug, Clone)]
pub struct LayoutCatalog {
    templates: Vec<LayoutTemplate>,
}

impl LayoutCatalog {
    /// The 5 single-image and 13 multi-image templates.
    pub fn standard() -> Self {
        let mut templates = single_templates();
        templates.extend(multi_templates());
        Self { templates }
    }

    /// A catalog of custom templates, rejected if any slot leaves its canvas.
    pub fn from_templates(templates: Vec<LayoutTemplate>) -> Result<Self, LayoutError> {
        for template in &templates {
            template.check_bounds()?;
        }
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[LayoutTemplate] {
        &self.templates
    }

    pub fn get(&self, name: &str) -> Option<&LayoutTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Multi-image templates, in catalog order.
    pub fn multi(&self) -> Vec<&LayoutTemplate> {
        self.templates.iter().filter(|t| !t.is_single()).collect()
    }

    /// The single-image template for `bucket`, if the catalog has one.
    pub fn single_for(&self, bucket: AspectBucket) -> Option<&LayoutTemplate> {
        self.templates
            .iter()
            .find(|t| t.is_single() && t.slots[0].bucket == bucket)
    }

    /// Every template whose required buckets are covered by (a subset of) `buckets`.
    pub fn templates_requiring(&self, buckets: &[AspectBucket]) -> Vec<&LayoutTemplate> {
        self.templates
            .iter()
            .filter(|t| t.satisfiable_by(buckets))
            .collect()
    }
}

/// One placed image of a bound layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSlot {
    pub image_path: PathBuf,
    pub bucket: AspectBucket,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A template bound to one concrete image per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutInstance<'a> {
    template: &'a LayoutTemplate,
    images: Vec<ImageRef>,
}

impl<'a> LayoutInstance<'a> {
    /// Bind `images` to `template` slot by slot; buckets must match exactly.
    pub fn bind(template: &'a LayoutTemplate, images: Vec<ImageRef>) -> Result<Self, LayoutError> {
        if images.len() != template.arity() {
            return Err(LayoutError::ArityMismatch {
                template: template.name.clone(),
                expected: template.arity(),
                got: images.len(),
            });
        }
        for (index, (spec, image)) in template.slots.iter().zip(&images).enumerate() {
            if spec.bucket != image.bucket {
                return Err(LayoutError::BucketMismatch {
                    template: template.name.clone(),
                    slot: index,
                    expected: spec.bucket,
                    got: image.bucket,
                });
            }
        }
        Ok(Self { template, images })
    }

    pub fn template(&self) -> &LayoutTemplate {
        self.template
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn canvas(&self) -> (u32, u32) {
        (self.template.canvas_width, self.template.canvas_height)
    }

    /// Slots in paint order.
    pub fn slots(&self) -> Vec<LayoutSlot> {
        self.template
            .slots
            .iter()
            .zip(&self.images)
            .map(|(spec, image)| LayoutSlot {
                image_path: image.path.clone(),
                bucket: spec.bucket,
                x: spec.x,
                y: spec.y,
                width: spec.width,
                height: spec.height,
            })
            .collect()
    }

    /// Render parameters for writing this instance to `output`.
    pub fn compose_params(&self, output: &Path) -> ComposeParams {
        ComposeParams {
            output: output.to_path_buf(),
            canvas_width: self.template.canvas_width,
            canvas_height: self.template.canvas_height,
            background: BACKGROUND,
            placements: self
                .slots()
                .into_iter()
                .map(|s| Placement {
                    source: s.image_path,
                    x: s.x,
                    y: s.y,
                    width: s.width,
                    height: s.height,
                    fit: self.template.fit,
                })
                .collect(),
        }
    }
}
