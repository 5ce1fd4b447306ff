//! Scans enrolled journals into a manifest.

use std::path::Path;

use crate::error::Result;
use crate::models::{Attachment, Entry, Journal, SyncConfig};
use crate::services::DatabaseService;

use super::hasher::{hash_attachment, hash_entry, hash_journal};
use super::manifest::{ItemType, SyncItem, SyncManifest};
use super::paths::{attachment_path, entry_path, journal_path};

/// Manifest item for a journal
pub fn journal_item(journal: &Journal) -> Result<SyncItem> {
    Ok(SyncItem {
        item_type: ItemType::Journal,
        item_id: journal.id.to_string(),
        journal_id: journal.id.to_string(),
        content_hash: hash_journal(journal)?,
        modified_at: journal.updated_at,
        remote_path: journal_path(&journal.id),
    })
}

/// Manifest item for an entry document carrying `attachments`.
///
/// Adding an attachment counts as a modification of the entry.
pub fn entry_item(entry: &Entry, attachments: &[Attachment]) -> Result<SyncItem> {
    let modified_at = attachments
        .iter()
        .map(|attachment| attachment.created_at)
        .fold(entry.updated_at, i64::max);
    Ok(SyncItem {
        item_type: ItemType::Entry,
        item_id: entry.id.to_string(),
        journal_id: entry.journal_id.to_string(),
        content_hash: hash_entry(entry, attachments)?,
        modified_at,
        remote_path: entry_path(entry),
    })
}

/// Manifest item for an attachment; its bytes never change after creation
#[must_use]
pub fn attachment_item(attachment: &Attachment, attachments_dir: &Path) -> SyncItem {
    SyncItem {
        item_type: ItemType::Attachment,
        item_id: attachment.id.to_string(),
        journal_id: attachment.journal_id.to_string(),
        content_hash: hash_attachment(attachment, attachments_dir),
        modified_at: attachment.created_at,
        remote_path: attachment_path(attachment),
    }
}

/// Scan every journal enrolled in `config` into a fresh manifest.
///
/// Journals outside `synced_journal_ids` produce no items. Enrolled journals
/// that do not exist locally yet are skipped.
pub async fn build_manifest(
    db: &DatabaseService,
    config: &SyncConfig,
    attachments_dir: &Path,
    generated_at: i64,
) -> Result<SyncManifest> {
    let mut manifest = SyncManifest::new(config.id, generated_at);

    for journal_id in &config.synced_journal_ids {
        let Some(journal) = db.get_journal(journal_id).await? else {
            tracing::debug!(config_id = %config.id, %journal_id, "Enrolled journal not present locally");
            continue;
        };
        manifest.insert(journal_item(&journal)?);

        for entry in db.list_entries(journal_id).await? {
            let attachments = if config.sync_attachments {
                db.list_entry_attachments(&entry.id).await?
            } else {
                Vec::new()
            };
            manifest.insert(entry_item(&entry, &attachments)?);
        }

        if config.sync_attachments {
            for attachment in db.list_attachments(journal_id).await? {
                manifest.insert(attachment_item(&attachment, attachments_dir));
            }
        }
    }

    tracing::debug!(
        config_id = %config.id,
        items = manifest.len(),
        "Built manifest from local database"
    );
    Ok(manifest)
}

/// Drop items `config` does not cover: foreign journals, and attachments when
/// attachment sync is off.
pub fn scope_to_config(manifest: &mut SyncManifest, config: &SyncConfig) {
    manifest.retain(|item| {
        let enrolled = config
            .synced_journal_ids
            .iter()
            .any(|journal_id| journal_id.to_string() == item.journal_id);
        enrolled && (config.sync_attachments || item.item_type != ItemType::Attachment)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, JournalId};
    use tempfile::tempdir;

    async fn seeded() -> (DatabaseService, Journal, Journal) {
        let db = DatabaseService::open_in_memory().unwrap();
        let synced = db.create_journal("Synced", None).await.unwrap();
        let private = db.create_journal("Private", None).await.unwrap();

        let entry = db.create_entry(&synced.id, None, "shared").await.unwrap();
        db.create_entry(&private.id, None, "secret").await.unwrap();
        let attachment =
            Attachment::new(entry.id, synced.id, "a.png", "image/png", 1).unwrap();
        db.create_attachment(&attachment).await.unwrap();

        (db, synced, private)
    }

    #[tokio::test]
    async fn builds_items_for_enrolled_journals_only() {
        let (db, synced, private) = seeded().await;
        let dir = tempdir().unwrap();
        let config = SyncConfig::new("https://dav.example.com", "alice", "Home")
            .unwrap()
            .with_journal(synced.id);

        let manifest = build_manifest(&db, &config, dir.path(), 1).await.unwrap();

        assert_eq!(manifest.len(), 3);
        assert!(manifest
            .items()
            .all(|item| item.journal_id == synced.id.to_string()));
        assert!(!manifest
            .items()
            .any(|item| item.journal_id == private.id.to_string()));
    }

    #[tokio::test]
    async fn build_is_deterministic_and_respects_attachment_toggle() {
        let (db, synced, _) = seeded().await;
        let dir = tempdir().unwrap();
        let mut config = SyncConfig::new("https://dav.example.com", "alice", "Home")
            .unwrap()
            .with_journal(synced.id)
            .with_journal(JournalId::new());

        let first = build_manifest(&db, &config, dir.path(), 1).await.unwrap();
        let second = build_manifest(&db, &config, dir.path(), 2).await.unwrap();
        assert!(first.same_items(&second));

        config.sync_attachments = false;
        let without = build_manifest(&db, &config, dir.path(), 3).await.unwrap();
        assert_eq!(without.len(), 2);
        assert!(without
            .items()
            .all(|item| item.item_type != ItemType::Attachment));
    }

    #[tokio::test]
    async fn new_attachment_changes_entry_item() {
        let (db, synced, _) = seeded().await;
        let dir = tempdir().unwrap();
        let config = SyncConfig::new("https://dav.example.com", "alice", "Home")
            .unwrap()
            .with_journal(synced.id);
        let before = build_manifest(&db, &config, dir.path(), 1).await.unwrap();

        let entry = db.list_entries(&synced.id).await.unwrap().remove(0);
        let mut later = Attachment::new(entry.id, synced.id, "b.txt", "text/plain", 2).unwrap();
        later.created_at = entry.updated_at + 60_000;
        db.create_attachment(&later).await.unwrap();
        let after = build_manifest(&db, &config, dir.path(), 2).await.unwrap();

        let key = crate::sync::ItemKey::new(ItemType::Entry, entry.id.to_string());
        let (old_item, new_item) = (before.get(&key).unwrap(), after.get(&key).unwrap());
        assert!(!old_item.same_content(new_item));
        assert_eq!(new_item.modified_at, later.created_at);
    }

    #[tokio::test]
    async fn scope_to_config_filters_foreign_items() {
        let (db, synced, private) = seeded().await;
        let dir = tempdir().unwrap();
        let both = SyncConfig::new("https://dav.example.com", "alice", "Home")
            .unwrap()
            .with_journal(synced.id)
            .with_journal(private.id);
        let mut manifest = build_manifest(&db, &both, dir.path(), 1).await.unwrap();
        assert_eq!(manifest.len(), 5);

        let mut only_synced = both.clone();
        only_synced.synced_journal_ids.remove(&private.id);
        only_synced.sync_attachments = false;
        scope_to_config(&mut manifest, &only_synced);

        assert_eq!(manifest.len(), 2);
    }
}
