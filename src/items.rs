//! Item identity: folder→item-id mapping and the object-store key convention.
//!
//! Each source folder holds the photos of one catalog item. The mapping from
//! folder name to [`ItemId`] is supplied externally as JSON, in either form:
//!
//! ```json
//! { "FolderA": "id1", "FolderB": "id2" }
//! ```
//!
//! ```json
//! [ { "item_id": "id1", "folder": "FolderA" } ]
//! ```
//!
//! Derivative files are stored under keys of the form
//! `<category>/<itemId>/<imageBaseName>/<size>/<file>` ([`StorageKey`]).

use crate::types::ItemId;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ItemsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid storage key {key:?}: {reason}")]
    Key { key: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    #[serde(alias = "itemIdString")]
    item_id: ItemId,
    #[serde(alias = "localFolderName")]
    folder: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MappingFile {
    Object(BTreeMap<String, ItemId>),
    Entries(Vec<MappingEntry>),
}

/// Folder name → item ids.
///
/// A folder may be claimed by several entries; all of them are reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMapping {
    by_folder: BTreeMap<String, Vec<ItemId>>,
}

/// Item ids resolved for one layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedItems {
    pub item_ids: BTreeSet<ItemId>,
    /// Folders of consumed images with no mapping entry.
    pub unmapped: BTreeSet<String>,
}

impl ItemMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, folder: impl Into<String>, item_id: ItemId) {
        let ids = self.by_folder.entry(folder.into()).or_default();
        if !ids.contains(&item_id) {
            ids.push(item_id);
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ItemsError> {
        let mut mapping = Self::new();
        match serde_json::from_str(text)? {
            MappingFile::Object(map) => {
                for (folder, id) in map {
                    mapping.insert(folder, id);
                }
            }
            MappingFile::Entries(entries) => {
                for entry in entries {
                    mapping.insert(entry.folder, entry.item_id);
                }
            }
        }
        Ok(mapping)
    }

    pub fn load(path: &Path) -> Result<Self, ItemsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn is_empty(&self) -> bool {
        self.by_folder.is_empty()
    }

    pub fn get(&self, folder: &str) -> &[ItemId] {
        self.by_folder.get(folder).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve the item ids of every consumed image path.
    ///
    /// Unknown folders are left out of `item_ids` and listed in `unmapped`.
    pub fn resolve<'p>(&self, paths: impl IntoIterator<Item = &'p Path>) -> ResolvedItems {
        let mut resolved = ResolvedItems::default();
        for path in paths {
            let Some(folder) = folder_of(path) else {
                continue;
            };
            let ids = self.get(folder);
            if ids.is_empty() {
                resolved.unmapped.insert(folder.to_string());
            }
            resolved.item_ids.extend(ids.iter().cloned());
        }
        resolved
    }
}

/// Name of the directory directly containing `path`.
///
/// ```
/// # use catalog_media::items::folder_of;
/// # use std::path::Path;
/// assert_eq!(folder_of(Path::new("Images/FolderA/front.png")), Some("FolderA"));
/// assert_eq!(folder_of(Path::new("front.png")), None);
/// ```
pub fn folder_of(path: &Path) -> Option<&str> {
    path.parent()?.file_name()?.to_str()
}

/// `<category>/<itemId>/<imageBaseName>/<size>/<file>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StorageKey {
    pub category: String,
    pub item_id: ItemId,
    pub image_name: String,
    pub size: String,
    pub file: String,
}

impl StorageKey {
    pub fn new(
        category: impl Into<String>,
        item_id: ItemId,
        image_name: impl Into<String>,
        size: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            item_id,
            image_name: image_name.into(),
            size: size.into(),
            file: file.into(),
        }
    }

    /// Split a key into its five segments.
    pub fn parse(key: &str) -> Result<Self, ItemsError> {
        let parts: Vec<&str> = key.split('/').collect();
        if parts.len() != 5 {
            return Err(ItemsError::Key {
                key: key.to_string(),
                reason: format!("expected 5 segments, found {}", parts.len()),
            });
        }
        if let Some(empty) = parts.iter().position(|p| p.is_empty()) {
            return Err(ItemsError::Key {
                key: key.to_string(),
                reason: format!("segment {} is empty", empty + 1),
            });
        }
        Ok(Self::new(
            parts[0],
            ItemId::new(parts[1]),
            parts[2],
            parts[3],
            parts[4],
        ))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.category, self.item_id, self.image_name, self.size, self.file
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> BTreeSet<ItemId> {
        list.iter().map(|s| ItemId::new(*s)).collect()
    }

    #[test]
    fn object_form_mapping() {
        let mapping = ItemMapping::from_json(r#"{"FolderA": "id1", "FolderB": "id2"}"#).unwrap();
        assert_eq!(mapping.get("FolderA"), &[ItemId::new("id1")]);
        assert!(mapping.get("FolderC").is_empty());
    }

    #[test]
    fn entry_form_accepts_both_field_spellings() {
        let mapping = ItemMapping::from_json(
            r#"[
                {"item_id": "id1", "folder": "FolderA"},
                {"itemIdString": "id2", "localFolderName": "FolderB"}
            ]"#,
        )
        .unwrap();
        assert_eq!(mapping.get("FolderB"), &[ItemId::new("id2")]);
    }

    #[test]
    fn malformed_mapping_is_json_error() {
        assert!(matches!(
            ItemMapping::from_json("[1, 2]"),
            Err(ItemsError::Json(_))
        ));
    }

    #[test]
    fn resolve_one_image_from_each_folder() {
        let mapping = ItemMapping::from_json(r#"{"FolderA": "id1", "FolderB": "id2"}"#).unwrap();
        let paths = [
            Path::new("Images/FolderA/1.png"),
            Path::new("Images/FolderB/2.png"),
        ];

        let resolved = mapping.resolve(paths);

        assert_eq!(resolved.item_ids, ids(&["id1", "id2"]));
        assert!(resolved.unmapped.is_empty());
    }

    #[test]
    fn unmapped_folder_is_absent_not_an_error() {
        let mapping = ItemMapping::from_json(r#"{"FolderA": "id1"}"#).unwrap();
        let paths = [
            Path::new("Images/FolderA/1.png"),
            Path::new("Images/FolderA/2.png"),
            Path::new("Images/FolderZ/3.png"),
        ];

        let resolved = mapping.resolve(paths);

        assert_eq!(resolved.item_ids, ids(&["id1"]));
        assert_eq!(
            resolved.unmapped.into_iter().collect::<Vec<_>>(),
            vec!["FolderZ".to_string()]
        );
    }

    #[test]
    fn folder_claimed_twice_yields_both_ids() {
        let mut mapping = ItemMapping::new();
        mapping.insert("Shared", ItemId::new("a"));
        mapping.insert("Shared", ItemId::new("b"));
        mapping.insert("Shared", ItemId::new("a"));

        let resolved = mapping.resolve([Path::new("x/Shared/1.png")]);
        assert_eq!(resolved.item_ids, ids(&["a", "b"]));
    }

    #[test]
    fn storage_key_display_and_parse() {
        let key = StorageKey::new(
            "images",
            ItemId::new("65a1"),
            "layout_3",
            "300",
            "layout_3_lossless.webp",
        );
        let text = key.to_string();
        assert_eq!(text, "images/65a1/layout_3/300/layout_3_lossless.webp");
        assert_eq!(StorageKey::parse(&text).unwrap(), key);
    }

    #[test]
    fn storage_key_rejects_wrong_segment_count() {
        let err = StorageKey::parse("images/65a1/layout_3/300").unwrap_err();
        assert!(matches!(err, ItemsError::Key { .. }));
        assert!(err.to_string().contains("expected 5 segments, found 4"));
        assert!(StorageKey::parse("a/b/c/d/e/f").is_err());
    }

    #[test]
    fn storage_key_rejects_empty_segment() {
        assert!(StorageKey::parse("images//layout/300/x.webp").is_err());
    }
}
