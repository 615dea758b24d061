//! # Catalog Media
//!
//! Turns folders of clothing photos into the image assets a catalog serves:
//! composite layouts of several items, single-item canvases, square crops,
//! each in a fixed matrix of sizes and encodings.
//!
//! # Architecture: Classify → Compose → Derive
//!
//! ```text
//! Images/                       categorize     bucket per image (square, 4:3, 16:9 …)
//! ├── Shirt/front.jpg     ──►   select         template from the layout catalog + images
//! ├── Shirt/back.jpg            compose        flattened 1000px PNG
//! └── Jeans/side.jpg            derive         200/300/400px WebP, lossless + compressed
//!                               record         manifest.json: { item_ids, output_image_path }
//! ```
//!
//! The manifest is handed to the item/image-record store; the derivative tree
//! is uploaded to object storage under `<category>/<itemId>/<image>/<size>/<file>`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Shared serializable types: `AspectBucket`, `ImageRef`, `ItemId`, `LayoutResult` |
//! | [`classify`] | Aspect-ratio classification and the recursive folder walk |
//! | [`layout`] | The read-only layout catalog: 5 single-image and 13 multi-image templates |
//! | [`compose`] | Renders a bound layout to a flattened PNG, fail-fast |
//! | [`derivatives`] | Composite and square-crop derivative matrices, per-cell tolerant |
//! | [`batch`] | Orchestrates layout attempts, the singles pass and the squares pass |
//! | [`items`] | Folder → item-id mapping and the storage key convention |
//! | [`storage`] | Object-store and catalog-store seams, uploads, manifest ingestion |
//! | [`imaging`] | Pure-Rust image operations behind the `ImageBackend` trait |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Authored Geometry
//!
//! Templates are data, not code paths: each slot carries its bucket and its
//! rectangle. Adding a layout means adding a table entry, and the geometry
//! invariant (every slot inside its canvas) is checked over the whole table.
//!
//! ## Injected Randomness
//!
//! The batch takes its catalog and its RNG as arguments. Tests pass a seeded
//! `StdRng` and a one-template catalog to force a specific layout; the CLI
//! seeds from `[batch] seed` or from entropy.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling, compositing and encoding all go through the
//! `image` crate. The WebP encoder is lossless-only, so the "compressed"
//! derivative quantizes colour before encoding.

pub mod batch;
pub mod classify;
pub mod compose;
pub mod config;
pub mod derivatives;
pub mod imaging;
pub mod items;
pub mod layout;
pub mod output;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
