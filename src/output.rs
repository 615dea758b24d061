//! CLI output formatting for every pipeline command.
//!
//! # Output Format
//!
//! ## Categorize
//!
//! ```text
//! Buckets
//!     square           12
//!     portrait 4:3      3
//!     landscape 4:3     0
//!     portrait 16:9     5
//!     landscape 16:9    1
//! 21 images, 1 skipped
//! ```
//!
//! ## Layouts
//!
//! ```text
//! 001 four_squares_in_corners → four_squares_in_corners_0.png
//!     Items: 65a1, 65a7
//! 002 dropped two_169_columns
//!     Reason: Template two_169_columns needs 2 portrait 16:9 image(s), only 1 available
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and, where the binary prints it whole, a `print_*` wrapper.
//! Format functions are pure — no I/O, no side effects.

use crate::batch::{BatchEvent, LayoutReport, PassReport};
use crate::classify::Categories;
use crate::storage::ImageVersions;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// File name of `path`, or the whole path when it has none.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Categorize
// ============================================================================

/// Format per-bucket counts of a classified tree.
pub fn format_categories(categories: &Categories, skipped: usize) -> Vec<String> {
    let mut lines = vec!["Buckets".to_string()];
    for (bucket, count) in categories.counts() {
        lines.push(format!("{}{:<16}{:>3}", indent(1), bucket.label(), count));
    }
    lines.push(format!(
        "{} images, {} skipped",
        categories.total(),
        skipped
    ));
    lines
}

pub fn print_categories(categories: &Categories, skipped: usize) {
    for line in format_categories(categories, skipped) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch progress
// ============================================================================

/// Format a single batch progress event as display lines.
///
/// Layout attempts lead with their 1-based attempt index; file-level events
/// lead with the file name and show the full path as indented context.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Categorized { counts, skipped } => {
            let total: usize = counts.iter().map(|(_, n)| n).sum();
            let detail = counts
                .iter()
                .filter(|(_, n)| *n > 0)
                .map(|(bucket, n)| format!("{} {}", n, bucket))
                .collect::<Vec<_>>()
                .join(", ");
            let mut lines = vec![format!("Classified {} images ({} skipped)", total, skipped)];
            if !detail.is_empty() {
                lines.push(format!("{}{}", indent(1), detail));
            }
            lines
        }
        BatchEvent::FileSkipped { path, reason } => vec![
            format!("Skipped {}", file_label(path)),
            format!("{}Source: {}", indent(1), path.display()),
            format!("{}Reason: {}", indent(1), reason),
        ],
        BatchEvent::LayoutComposed {
            attempt,
            template,
            output,
            item_ids,
        } => {
            let mut lines = vec![format!(
                "{} {} \u{2192} {}",
                format_index(attempt + 1),
                template,
                file_label(output)
            )];
            if !item_ids.is_empty() {
                let ids = item_ids
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("{}Items: {}", indent(1), ids));
            }
            lines
        }
        BatchEvent::AttemptDropped {
            attempt,
            template,
            reason,
        } => vec![
            format!("{} dropped {}", format_index(attempt + 1), template),
            format!("{}Reason: {}", indent(1), reason),
        ],
        BatchEvent::DerivativeFailed {
            source,
            label,
            message,
        } => vec![format!(
            "{}{} {}: failed ({})",
            indent(1),
            file_label(source),
            label,
            message
        )],
        BatchEvent::UnmappedFolder { folder } => {
            vec![format!("{}No item id for folder {}", indent(1), folder)]
        }
        BatchEvent::SingleProcessed {
            source,
            output,
            template,
        } => vec![
            format!("{} \u{2192} {}", file_label(source), file_label(output)),
            format!("{}Template: {}", indent(1), template),
        ],
        BatchEvent::SquareProcessed { source, written } => {
            vec![format!("{}: {} square files", file_label(source), written)]
        }
    }
}

/// Summary line after a layout run.
pub fn format_layout_summary(report: &LayoutReport, manifest: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Composed {} layouts, dropped {} attempts",
        report.results.len(),
        report.dropped
    )];
    if !report.unmapped.is_empty() {
        lines.push(format!(
            "{}Unmapped folders: {}",
            indent(1),
            report
                .unmapped
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    lines.push(format!("Manifest: {}", manifest.display()));
    lines
}

/// Summary line after a singles or squares pass.
pub fn format_pass_summary(report: &PassReport) -> Vec<String> {
    vec![format!(
        "Processed {} images, skipped {}",
        report.processed, report.skipped
    )]
}

// ============================================================================
// Storage
// ============================================================================

/// Format the keys written by an upload.
pub fn format_upload(keys: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| format!("{} {}", format_index(i + 1), key))
        .collect();
    lines.push(format!("Uploaded {} files", keys.len()));
    lines
}

/// Format grouped image versions, one block per image.
pub fn format_image_versions(versions: &[ImageVersions]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, image) in versions.iter().enumerate() {
        lines.push(format!(
            "{} {} / {}",
            format_index(i + 1),
            image.item_id,
            image.image_name
        ));
        for (label, urls) in [
            ("small", &image.small),
            ("medium", &image.medium),
            ("large", &image.large),
        ] {
            let mark = |url: &Option<String>| if url.is_some() { "yes" } else { "missing" };
            lines.push(format!(
                "{}{}: lossless {}, compressed {}",
                indent(1),
                label,
                mark(&urls.lossless),
                mark(&urls.compressed)
            ));
        }
    }
    lines
}
