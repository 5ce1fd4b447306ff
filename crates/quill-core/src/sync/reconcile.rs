//! Three-way diff of current local state, last-synced baseline and remote.

use std::collections::BTreeSet;

use super::manifest::{ItemKey, SyncItem, SyncManifest};

/// Both sides changed the same item since the last sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Current local version
    pub local: SyncItem,
    /// Current remote version
    pub remote: SyncItem,
}

impl Conflict {
    /// Manifest key of the contested item
    #[must_use]
    pub fn key(&self) -> ItemKey {
        self.local.key()
    }
}

/// Classification of every item in the union of local and remote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Local versions to write to the server
    pub to_upload: Vec<SyncItem>,
    /// Remote versions to apply locally
    pub to_download: Vec<SyncItem>,
    /// Items changed on both sides
    pub conflicts: Vec<Conflict>,
    /// Items identical on both sides
    pub unchanged: Vec<SyncItem>,
}

impl ChangeSet {
    /// Number of items that need a transfer or a resolution
    #[must_use]
    pub fn pending(&self) -> usize {
        self.to_upload.len() + self.to_download.len() + self.conflicts.len()
    }

    /// Whether nothing needs to move
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

/// Classify every key in `local_current ∪ remote`.
///
/// Items only in `baseline` are ignored; deletions are not propagated.
/// Output lists follow key order, so journals precede entries precede
/// attachments.
#[must_use]
pub fn reconcile(
    local_current: &SyncManifest,
    baseline: &SyncManifest,
    remote: &SyncManifest,
) -> ChangeSet {
    let keys: BTreeSet<&ItemKey> = local_current.keys().chain(remote.keys()).collect();
    let mut changes = ChangeSet::default();

    for key in keys {
        match (local_current.get(key), remote.get(key)) {
            (Some(local), None) => changes.to_upload.push(local.clone()),
            (None, Some(remote)) => changes.to_download.push(remote.clone()),
            (Some(local), Some(remote)) if local.same_content(remote) => {
                changes.unchanged.push(local.clone());
            }
            (Some(local), Some(remote)) => {
                let last_synced = baseline.get(key);
                let local_changed = !last_synced.is_some_and(|base| base.same_content(local));
                let remote_changed = !last_synced.is_some_and(|base| base.same_content(remote));

                if local_changed && remote_changed {
                    changes.conflicts.push(Conflict {
                        local: local.clone(),
                        remote: remote.clone(),
                    });
                } else if local_changed {
                    changes.to_upload.push(local.clone());
                } else {
                    changes.to_download.push(remote.clone());
                }
            }
            (None, None) => {}
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncConfigId;
    use crate::sync::manifest::ItemType;
    use pretty_assertions::assert_eq;

    fn item(id: &str, hash: &str) -> SyncItem {
        SyncItem {
            item_type: ItemType::Entry,
            item_id: id.to_string(),
            journal_id: "j".to_string(),
            content_hash: hash.to_string(),
            modified_at: 1,
            remote_path: format!("/journal_app/entries/2024/01/{id}.json"),
        }
    }

    fn manifest(items: &[SyncItem]) -> SyncManifest {
        let mut manifest = SyncManifest::new(SyncConfigId::default(), 0);
        for item in items {
            manifest.insert(item.clone());
        }
        manifest
    }

    #[test]
    fn one_sided_presence() {
        let local = manifest(&[item("a", "1")]);
        let remote = manifest(&[item("b", "2")]);

        let changes = reconcile(&local, &manifest(&[]), &remote);
        assert_eq!(changes.to_upload, vec![item("a", "1")]);
        assert_eq!(changes.to_download, vec![item("b", "2")]);
        assert!(changes.conflicts.is_empty());
    }

    #[test]
    fn equal_hashes_are_unchanged_regardless_of_timestamp() {
        let mut newer = item("a", "1");
        newer.modified_at = 99;
        let changes = reconcile(
            &manifest(&[item("a", "1")]),
            &manifest(&[]),
            &manifest(&[newer]),
        );

        assert_eq!(changes.unchanged.len(), 1);
        assert!(changes.is_idle());
    }

    #[test]
    fn remote_moved_ahead_downloads() {
        let changes = reconcile(
            &manifest(&[item("a", "1")]),
            &manifest(&[item("a", "1")]),
            &manifest(&[item("a", "2")]),
        );
        assert_eq!(changes.to_download, vec![item("a", "2")]);
    }

    #[test]
    fn local_moved_ahead_uploads() {
        let changes = reconcile(
            &manifest(&[item("a", "2")]),
            &manifest(&[item("a", "1")]),
            &manifest(&[item("a", "1")]),
        );
        assert_eq!(changes.to_upload, vec![item("a", "2")]);
    }

    #[test]
    fn both_moved_is_a_conflict() {
        let changes = reconcile(
            &manifest(&[item("a", "2")]),
            &manifest(&[item("a", "1")]),
            &manifest(&[item("a", "3")]),
        );
        assert_eq!(
            changes.conflicts,
            vec![Conflict {
                local: item("a", "2"),
                remote: item("a", "3"),
            }]
        );
        assert_eq!(changes.pending(), 1);
    }

    #[test]
    fn missing_baseline_entry_counts_as_changed_on_both_sides() {
        let changes = reconcile(
            &manifest(&[item("a", "2")]),
            &manifest(&[]),
            &manifest(&[item("a", "3")]),
        );
        assert_eq!(changes.conflicts.len(), 1);
    }

    #[test]
    fn baseline_only_items_are_ignored() {
        let changes = reconcile(&manifest(&[]), &manifest(&[item("gone", "1")]), &manifest(&[]));
        assert_eq!(changes, ChangeSet::default());
    }
}
