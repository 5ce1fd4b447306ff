//! Sync manifests: snapshots of item hashes keyed by `(item type, item id)`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::SyncConfigId;

const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Kind of syncable item.
///
/// Ordering follows download dependency order: journals before entries
/// before attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A journal record
    Journal,
    /// An entry record (with embedded attachment metadata)
    Entry,
    /// Attachment file bytes
    Attachment,
}

impl ItemType {
    /// Stable string form used in manifests and the conflict log
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Entry => "entry",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "journal" => Ok(Self::Journal),
            "entry" => Ok(Self::Entry),
            "attachment" => Ok(Self::Attachment),
            other => Err(Error::InvalidInput(format!("Unknown item type: {other}"))),
        }
    }
}

/// Composite manifest key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    /// Item kind
    pub item_type: ItemType,
    /// Item identifier
    pub item_id: String,
}

impl ItemKey {
    /// Build a key from its parts
    pub fn new(item_type: ItemType, item_id: impl Into<String>) -> Self {
        Self {
            item_type,
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.item_type, self.item_id)
    }
}

/// One item as recorded in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Item kind
    pub item_type: ItemType,
    /// Item identifier
    pub item_id: String,
    /// Owning journal; a journal item carries its own id
    pub journal_id: String,
    /// Lowercase hex SHA-256
    pub content_hash: String,
    /// Last local write (Unix ms)
    pub modified_at: i64,
    /// Absolute path on the WebDAV server
    pub remote_path: String,
}

impl SyncItem {
    /// Manifest key of this item
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item_type, self.item_id.clone())
    }

    /// Items with equal hashes are identical regardless of timestamps
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

/// Snapshot of synced items for one config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ManifestDocument", from = "ManifestDocument")]
pub struct SyncManifest {
    /// Config this manifest belongs to
    pub config_id: SyncConfigId,
    /// Creation time of this snapshot (Unix ms)
    pub generated_at: i64,
    items: BTreeMap<ItemKey, SyncItem>,
}

/// On-disk / on-server JSON layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument {
    #[serde(default = "default_format_version")]
    version: u32,
    config_id: SyncConfigId,
    generated_at: i64,
    #[serde(default)]
    items: Vec<SyncItem>,
}

const fn default_format_version() -> u32 {
    MANIFEST_FORMAT_VERSION
}

impl From<SyncManifest> for ManifestDocument {
    fn from(manifest: SyncManifest) -> Self {
        Self {
            version: MANIFEST_FORMAT_VERSION,
            config_id: manifest.config_id,
            generated_at: manifest.generated_at,
            items: manifest.items.into_values().collect(),
        }
    }
}

impl From<ManifestDocument> for SyncManifest {
    fn from(document: ManifestDocument) -> Self {
        let mut manifest = Self::new(document.config_id, document.generated_at);
        for item in document.items {
            manifest.insert(item);
        }
        manifest
    }
}

impl SyncManifest {
    /// Empty manifest
    #[must_use]
    pub const fn new(config_id: SyncConfigId, generated_at: i64) -> Self {
        Self {
            config_id,
            generated_at,
            items: BTreeMap::new(),
        }
    }

    /// Insert or replace an item, returning the previous one
    pub fn insert(&mut self, item: SyncItem) -> Option<SyncItem> {
        self.items.insert(item.key(), item)
    }

    /// Look up an item
    #[must_use]
    pub fn get(&self, key: &ItemKey) -> Option<&SyncItem> {
        self.items.get(key)
    }

    /// Remove an item
    pub fn remove(&mut self, key: &ItemKey) -> Option<SyncItem> {
        self.items.remove(key)
    }

    /// Whether an item with this key exists
    #[must_use]
    pub fn contains(&self, key: &ItemKey) -> bool {
        self.items.contains_key(key)
    }

    /// Items in key order
    pub fn items(&self) -> impl Iterator<Item = &SyncItem> {
        self.items.values()
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.items.keys()
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the manifest has no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep only items matching `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&SyncItem) -> bool) {
        self.items.retain(|_, item| keep(item));
    }

    /// Whether both manifests hold the same items, ignoring `generated_at`
    #[must_use]
    pub fn same_items(&self, other: &Self) -> bool {
        self.items == other.items
    }

    /// Serialize to pretty JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(item_type: ItemType, id: &str, hash: &str) -> SyncItem {
        SyncItem {
            item_type,
            item_id: id.to_string(),
            journal_id: "j1".to_string(),
            content_hash: hash.to_string(),
            modified_at: 10,
            remote_path: format!("/journal_app/{id}.json"),
        }
    }

    #[test]
    fn item_type_order_matches_dependency_order() {
        assert!(ItemType::Journal < ItemType::Entry);
        assert!(ItemType::Entry < ItemType::Attachment);
        assert_eq!("attachment".parse::<ItemType>().unwrap(), ItemType::Attachment);
        assert!("note".parse::<ItemType>().is_err());
    }

    #[test]
    fn manifest_json_uses_item_list() {
        let mut manifest = SyncManifest::new(SyncConfigId::new(), 42);
        manifest.insert(item(ItemType::Entry, "e1", "aa"));
        manifest.insert(item(ItemType::Journal, "j1", "bb"));

        let json: serde_json::Value =
            serde_json::from_slice(&manifest.to_json_bytes().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["generatedAt"], 42);
        assert_eq!(json["items"][0]["itemType"], "journal");
        assert_eq!(json["items"][1]["contentHash"], "aa");

        let parsed = SyncManifest::from_json_bytes(&manifest.to_json_bytes().unwrap()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn same_items_ignores_generated_at() {
        let id = SyncConfigId::new();
        let mut first = SyncManifest::new(id, 1);
        let mut second = SyncManifest::new(id, 2);
        first.insert(item(ItemType::Entry, "e1", "aa"));
        second.insert(item(ItemType::Entry, "e1", "aa"));

        assert!(first.same_items(&second));
        second.insert(item(ItemType::Entry, "e1", "bb"));
        assert!(!first.same_items(&second));
    }

    #[test]
    fn corrupt_json_is_an_error() {
        assert!(SyncManifest::from_json_bytes(b"{not json").is_err());
        assert!(SyncManifest::from_json_bytes(b"{\"items\": []}").is_err());
    }
}
