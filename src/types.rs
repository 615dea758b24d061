//! Shared types passed between the classifier, the layout catalog, the
//! orchestrator, and the storage collaborators.
//!
//! [`LayoutResult`] is serialized to `manifest.json` by the `layouts` command
//! and read back by `ingest`, so its serde shape is part of the on-disk format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Aspect-ratio category of an image.
///
/// Assignment from `r = width / height`:
///
/// | Ratio | Bucket |
/// |---|---|
/// | `r == 1` | [`Square`](Self::Square) |
/// | `1 < r < 16/9` | [`Landscape43`](Self::Landscape43) |
/// | `r >= 16/9` | [`Landscape169`](Self::Landscape169) |
/// | `9/16 < r < 1` | [`Portrait43`](Self::Portrait43) |
/// | `r <= 9/16` | [`Portrait169`](Self::Portrait169) |
///
/// The ordering of the variants is the display order used everywhere
/// (categorization summaries, bucket maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectBucket {
    Square,
    Portrait43,
    Landscape43,
    Portrait169,
    Landscape169,
}

impl AspectBucket {
    pub const ALL: [AspectBucket; 5] = [
        AspectBucket::Square,
        AspectBucket::Portrait43,
        AspectBucket::Landscape43,
        AspectBucket::Portrait169,
        AspectBucket::Landscape169,
    ];

    /// Human label, e.g. `portrait 4:3`.
    pub fn label(self) -> &'static str {
        match self {
            AspectBucket::Square => "square",
            AspectBucket::Portrait43 => "portrait 4:3",
            AspectBucket::Landscape43 => "landscape 4:3",
            AspectBucket::Portrait169 => "portrait 16:9",
            AspectBucket::Landscape169 => "landscape 16:9",
        }
    }
}

impl fmt::Display for AspectBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified source image. Never mutated after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: PathBuf,
    pub bucket: AspectBucket,
}

/// Identifier of a catalog item as issued by the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Manifest entry linking one generated multi-image composite to the items it depicts.
///
/// `item_ids` only contains ids whose source folder resolved through the
/// folder mapping; unmapped folders are left out rather than failing the layout.
///
/// `output_image_path` names the full-size composite. Unless composites are
/// kept, that file is deleted once its derivatives exist; the derivatives
/// stay under [`derivative_dir`](Self::derivative_dir).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub item_ids: BTreeSet<ItemId>,
    pub output_image_path: PathBuf,
}

impl LayoutResult {
    /// `<dir>/<stem>`, the root of the `<width>/` derivative folders.
    pub fn derivative_dir(&self) -> PathBuf {
        crate::derivatives::composite_root(&self.output_image_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_serializes_snake_case() {
        let json = serde_json::to_string(&AspectBucket::Landscape169).unwrap();
        assert_eq!(json, "\"landscape169\"");
    }

    #[test]
    fn layout_result_item_ids_serialize_as_plain_strings() {
        let result = LayoutResult {
            item_ids: [ItemId::new("b"), ItemId::new("a")].into_iter().collect(),
            output_image_path: PathBuf::from("out/four_squares_0.png"),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["item_ids"], serde_json::json!(["a", "b"]));
        assert_eq!(json["output_image_path"], "out/four_squares_0.png");
    }

    #[test]
    fn derivative_dir_strips_extension() {
        let result = LayoutResult {
            item_ids: BTreeSet::new(),
            output_image_path: PathBuf::from("out/four_squares_in_corners_3.png"),
        };
        assert_eq!(
            result.derivative_dir(),
            PathBuf::from("out/four_squares_in_corners_3")
        );
    }

    #[test]
    fn bucket_display_uses_label() {
        assert_eq!(AspectBucket::Portrait43.to_string(), "portrait 4:3");
    }
}
