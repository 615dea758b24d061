//! Object storage and item/image-record collaborators.
//!
//! The pipeline hands its results to two external systems, modelled here as
//! traits so any backend can stand behind them:
//!
//! - [`ObjectStore`]: uploads files under string keys, lists keys by prefix,
//!   hands out URLs. [`LocalObjectStore`] mirrors keys into a directory.
//! - [`CatalogStore`]: item and image records. [`MemoryCatalog`] keeps them in
//!   memory and persists as JSON.
//!
//! On top of the traits sit the workflows: concurrent folder upload, item
//! registration, manifest ingestion and grouping of uploaded derivatives into
//! per-image version sets.

use crate::items::StorageKey;
use crate::types::{ItemId, LayoutResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Blob storage addressed by `/`-separated keys.
///
/// `Sync` so uploads can run in parallel.
pub trait ObjectStore: Sync {
    /// Store the file at `local` under `key` and return the key.
    fn upload(&self, local: &Path, key: &str) -> Result<String, StorageError>;

    /// Every stored key starting with `prefix`, sorted.
    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// A URL a client can fetch `key` from.
    fn signed_url(&self, key: &str) -> Result<String, StorageError>;
}

/// One image record attached to an item: a key prefix holding its derivatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_path: String,
    pub image_type: String,
}

/// Item and image-record persistence.
pub trait CatalogStore {
    /// Insert item metadata and return the new id.
    fn insert_item_only(&mut self, item: serde_json::Value) -> Result<ItemId, StorageError>;

    fn insert_image_records(
        &mut self,
        item_id: &ItemId,
        records: Vec<ImageRecord>,
    ) -> Result<(), StorageError>;

    /// Record one composite depicting several items.
    fn insert_multi_image_record(
        &mut self,
        item_ids: &BTreeSet<ItemId>,
        image_path: &str,
    ) -> Result<(), StorageError>;
}

// ============================================================================
// Local object store
// ============================================================================

/// Object store backed by a directory: key `a/b/c.webp` lives at `<root>/a/b/c.webp`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl ObjectStore for LocalObjectStore {
    fn upload(&self, local: &Path, key: &str) -> Result<String, StorageError> {
        let target = self.path_for(key);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(local, &target)?;
        Ok(key.to_string())
    }

    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = relative_key(relative);
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn signed_url(&self, key: &str) -> Result<String, StorageError> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let absolute = std::fs::canonicalize(&path)?;
        Ok(format!("file://{}", absolute.display()))
    }
}

/// `/`-joined key for a relative filesystem path.
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// In-memory catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: ItemId,
    pub data: serde_json::Value,
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiImageRecord {
    pub item_ids: BTreeSet<ItemId>,
    pub image_path: String,
}

/// [`CatalogStore`] held in memory, loadable from and savable to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCatalog {
    pub items: Vec<StoredItem>,
    pub multi_images: Vec<MultiImageRecord>,
    #[serde(default)]
    next_id: u64,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`, or start empty if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn item(&self, id: &ItemId) -> Option<&StoredItem> {
        self.items.iter().find(|item| &item.id == id)
    }
}

impl CatalogStore for MemoryCatalog {
    fn insert_item_only(&mut self, item: serde_json::Value) -> Result<ItemId, StorageError> {
        self.next_id += 1;
        let id = ItemId::new(format!("item-{:04}", self.next_id));
        self.items.push(StoredItem {
            id: id.clone(),
            data: item,
            images: Vec::new(),
        });
        Ok(id)
    }

    fn insert_image_records(
        &mut self,
        item_id: &ItemId,
        records: Vec<ImageRecord>,
    ) -> Result<(), StorageError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| &item.id == item_id)
            .ok_or_else(|| StorageError::NotFound(format!("item {item_id}")))?;
        item.images.extend(records);
        Ok(())
    }

    fn insert_multi_image_record(
        &mut self,
        item_ids: &BTreeSet<ItemId>,
        image_path: &str,
    ) -> Result<(), StorageError> {
        self.multi_images.push(MultiImageRecord {
            item_ids: item_ids.clone(),
            image_path: image_path.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Workflows
// ============================================================================

/// Upload every file under `local_root` to `<prefix>/<relative path>`.
///
/// Uploads run in parallel; each file is uploaded exactly once. Returns the
/// uploaded keys sorted.
pub fn upload_folder(
    store: &impl ObjectStore,
    local_root: &Path,
    prefix: &str,
) -> Result<Vec<String>, StorageError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(local_root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let prefix = prefix.trim_end_matches('/');
    let mut keys = files
        .par_iter()
        .map(|file| {
            let relative = file.strip_prefix(local_root).unwrap_or(file);
            let key = format!("{}/{}", prefix, relative_key(relative));
            store.upload(file, &key)
        })
        .collect::<Result<Vec<_>, _>>()?;
    keys.sort();
    Ok(keys)
}

/// Register a new item and attach the derivative folders under `folder`.
///
/// Inserts the item, uploads `folder` to `<category>/<id>`, then adds one
/// image record `<category>/<id>/<sub>/` per immediate subdirectory.
pub fn register_item_with_images(
    catalog: &mut impl CatalogStore,
    store: &impl ObjectStore,
    folder: &Path,
    item: serde_json::Value,
    category: &str,
) -> Result<ItemId, StorageError> {
    let id = catalog.insert_item_only(item)?;
    upload_folder(store, folder, &format!("{category}/{id}"))?;

    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    subdirs.sort();

    let records = subdirs
        .into_iter()
        .map(|sub| ImageRecord {
            image_path: format!("{category}/{id}/{sub}/"),
            image_type: "single".to_string(),
        })
        .collect();
    catalog.insert_image_records(&id, records)?;
    Ok(id)
}

/// Record one multi-image entry per layout result. Returns how many were recorded.
pub fn ingest_layout_results(
    catalog: &mut impl CatalogStore,
    results: &[LayoutResult],
) -> Result<usize, StorageError> {
    for result in results {
        catalog.insert_multi_image_record(
            &result.item_ids,
            &result.output_image_path.to_string_lossy(),
        )?;
    }
    Ok(results.len())
}

/// URLs of the two encodings of one size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionUrls {
    pub lossless: Option<String>,
    pub compressed: Option<String>,
}

/// Every uploaded derivative of one image, by size class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageVersions {
    pub item_id: ItemId,
    pub image_name: String,
    pub small: VersionUrls,
    pub medium: VersionUrls,
    pub large: VersionUrls,
}

impl ImageVersions {
    fn slot_mut(&mut self, size: &str) -> Option<&mut VersionUrls> {
        match size {
            "200" => Some(&mut self.small),
            "300" => Some(&mut self.medium),
            "400" => Some(&mut self.large),
            _ => None,
        }
    }
}

/// Group composite derivative keys into per-image version sets.
///
/// Keys that are not five segments, have an unknown size, or carry neither
/// `lossless` nor `compressed` in the file name are skipped.
pub fn group_image_versions(
    store: &impl ObjectStore,
    keys: &[String],
) -> Result<Vec<ImageVersions>, StorageError> {
    let mut groups: BTreeMap<(ItemId, String), ImageVersions> = BTreeMap::new();
    for key in keys {
        let Ok(parsed) = StorageKey::parse(key) else {
            continue;
        };
        let lossless = if parsed.file.contains("lossless") {
            true
        } else if parsed.file.contains("compressed") {
            false
        } else {
            continue;
        };
        if !matches!(parsed.size.as_str(), "200" | "300" | "400") {
            continue;
        }

        let url = store.signed_url(key)?;
        let group = groups
            .entry((parsed.item_id.clone(), parsed.image_name.clone()))
            .or_insert_with(|| ImageVersions {
                item_id: parsed.item_id.clone(),
                image_name: parsed.image_name.clone(),
                ..Default::default()
            });
        if let Some(slot) = group.slot_mut(&parsed.size) {
            if lossless {
                slot.lossless = Some(url);
            } else {
                slot.compressed = Some(url);
            }
        }
    }
    Ok(groups.into_values().collect())
}

/// [`group_image_versions`] over every key under `prefix`.
pub fn all_image_versions(
    store: &impl ObjectStore,
    prefix: &str,
) -> Result<Vec<ImageVersions>, StorageError> {
    let keys = store.list_by_prefix(prefix)?;
    group_image_versions(store, &keys)
}
