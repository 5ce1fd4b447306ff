//! Sync conflict model

use serde::{Deserialize, Serialize};

use crate::sync::{ConflictSide, ItemType};

use super::sync_config::SyncConfigId;

/// Recorded sync conflict resolved by strategy (e.g., LWW)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier (0 before insertion)
    pub id: i64,
    /// Sync target the conflict happened on
    pub config_id: SyncConfigId,
    /// Kind of item involved
    pub item_type: ItemType,
    /// Identifier of the item involved
    pub item_id: String,
    /// Local version's modification timestamp
    pub local_modified_at: i64,
    /// Remote version's modification timestamp
    pub remote_modified_at: i64,
    /// Side whose version was kept
    pub winner: ConflictSide,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
