//! End-to-end run of the public API on real images: classify a tree, compose
//! a forced layout, write derivatives, upload them and record the manifest.

use catalog_media::batch::{self, BatchOptions};
use catalog_media::classify;
use catalog_media::imaging::RustBackend;
use catalog_media::items::ItemMapping;
use catalog_media::layout::LayoutCatalog;
use catalog_media::storage::{self, LocalObjectStore, MemoryCatalog};
use catalog_media::types::{AspectBucket, ItemId};
use image::{Rgb, RgbImage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

fn write_png(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(path)
        .unwrap();
}

/// Four square photos split over two item folders, plus a hidden file.
fn source_tree(root: &Path) {
    write_png(&root.join("FolderA/front.png"), 240, 240, [200, 30, 30]);
    write_png(&root.join("FolderA/back.png"), 300, 300, [30, 200, 30]);
    write_png(&root.join("FolderB/front.png"), 180, 180, [30, 30, 200]);
    write_png(&root.join("FolderB/detail.png"), 320, 320, [200, 200, 30]);
    std::fs::write(root.join("FolderA/.DS_Store"), b"junk").unwrap();
}

fn four_squares_only() -> LayoutCatalog {
    let standard = LayoutCatalog::standard();
    let template = standard.get("four_squares_in_corners").unwrap().clone();
    LayoutCatalog::from_templates(vec![template]).unwrap()
}

#[test]
fn four_squares_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("Images");
    let out = tmp.path().join("OutputImages");
    source_tree(&source);
    let backend = RustBackend::new();

    let categorization = classify::categorize(&backend, &source).unwrap();
    assert!(categorization.skipped.is_empty());
    assert_eq!(categorization.categories.count(AspectBucket::Square), 4);
    assert_eq!(categorization.categories.total(), 4);

    let mapping = ItemMapping::from_json(r#"{"FolderA": "id1", "FolderB": "id2"}"#).unwrap();
    let report = batch::run_layouts(
        &backend,
        &four_squares_only(),
        &categorization.categories,
        &mapping,
        &out,
        &BatchOptions {
            attempts: 1,
            keep_composites: true,
        },
        &mut StdRng::seed_from_u64(2024),
        None,
    )
    .unwrap();

    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    let expected: BTreeSet<ItemId> = [ItemId::new("id1"), ItemId::new("id2")]
        .into_iter()
        .collect();
    assert_eq!(result.item_ids, expected);
    assert!(result.output_image_path.exists());
    assert_eq!(
        image::image_dimensions(&result.output_image_path).unwrap(),
        (1000, 1000)
    );

    let derivative_dir = out.join("four_squares_in_corners_0");
    for width in [200, 300, 400] {
        for mode in ["lossless", "compressed"] {
            let file = derivative_dir.join(format!("{width}/four_squares_in_corners_0_{mode}.webp"));
            assert_eq!(image::image_dimensions(&file).unwrap(), (width, width));
        }
    }

    // Upload the derivative tree the way the storage key convention expects
    let store = LocalObjectStore::new(tmp.path().join("bucket"));
    let keys = storage::upload_folder(&store, &out, "images/id1").unwrap();
    let versions = storage::group_image_versions(&store, &keys).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].image_name, "four_squares_in_corners_0");
    assert!(versions[0].large.compressed.is_some());

    let manifest = out.join("manifest.json");
    batch::write_manifest(&manifest, &report.results).unwrap();
    let mut catalog = MemoryCatalog::new();
    let ingested =
        storage::ingest_layout_results(&mut catalog, &batch::read_manifest(&manifest).unwrap())
            .unwrap();
    assert_eq!(ingested, 1);
    assert_eq!(catalog.multi_images[0].item_ids, expected);
}

#[test]
fn missing_bucket_yields_no_results() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("Images");
    write_png(&source.join("Tall/one.png"), 90, 160, [0, 0, 0]);
    let backend = RustBackend::new();
    let categories = classify::categorize(&backend, &source).unwrap().categories;

    let report = batch::run_layouts(
        &backend,
        &four_squares_only(),
        &categories,
        &ItemMapping::new(),
        &tmp.path().join("out"),
        &BatchOptions {
            attempts: 5,
            keep_composites: false,
        },
        &mut StdRng::seed_from_u64(1),
        None,
    )
    .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.dropped, 5);
}
