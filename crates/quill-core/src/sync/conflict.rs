//! Last-writer-wins conflict resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{SyncConfigId, SyncConflict};

use super::manifest::SyncItem;
use super::reconcile::Conflict;

/// Name recorded in the conflict log
pub const LWW_STRATEGY: &str = "lww";

/// Which version of a conflicting item is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSide {
    /// This device's version
    Local,
    /// The server's version
    Remote,
}

impl ConflictSide {
    /// Stable string form used in the conflict log
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for ConflictSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(Error::InvalidInput(format!("Unknown conflict side: {other}"))),
        }
    }
}

/// Outcome of resolving one conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The contested item, both versions
    pub conflict: Conflict,
    /// Side whose version is kept
    pub winner: ConflictSide,
}

impl Resolution {
    /// The version that will be propagated
    #[must_use]
    pub const fn winning_item(&self) -> &SyncItem {
        match self.winner {
            ConflictSide::Local => &self.conflict.local,
            ConflictSide::Remote => &self.conflict.remote,
        }
    }

    /// Conflict log row for this resolution
    #[must_use]
    pub fn to_record(&self, config_id: SyncConfigId, resolved_at: i64) -> SyncConflict {
        SyncConflict {
            id: 0,
            config_id,
            item_type: self.conflict.local.item_type,
            item_id: self.conflict.local.item_id.clone(),
            local_modified_at: self.conflict.local.modified_at,
            remote_modified_at: self.conflict.remote.modified_at,
            winner: self.winner,
            resolved_at,
            strategy: LWW_STRATEGY.to_string(),
        }
    }
}

/// Keep the version with the later `modified_at`; ties go to the remote.
#[must_use]
pub fn resolve(conflict: Conflict) -> Resolution {
    let winner = if conflict.local.modified_at > conflict.remote.modified_at {
        ConflictSide::Local
    } else {
        ConflictSide::Remote
    };
    Resolution { conflict, winner }
}
