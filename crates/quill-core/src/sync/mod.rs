//! Manifest-based WebDAV synchronization.
//!
//! A run rescans the enrolled journals into a manifest, diffs it three ways
//! against the last-synced baseline and the server's manifest, transfers what
//! moved, resolves conflicts by last-writer-wins and persists both manifests.

pub mod builder;
pub mod conflict;
pub mod document;
mod engine;
mod error;
pub mod executor;
pub mod hasher;
pub mod manifest;
pub mod manifest_store;
mod options;
pub mod paths;
pub mod reconcile;
mod status;

pub use conflict::{resolve, ConflictSide, Resolution, LWW_STRATEGY};
pub use engine::{SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use executor::{ItemFailure, PhaseReport, TransferExecutor};
pub use manifest::{ItemKey, ItemType, SyncItem, SyncManifest};
pub use options::{EngineOptions, DEFAULT_MAX_FAILED_ITEMS};
pub use reconcile::{reconcile, ChangeSet, Conflict};
pub use status::{StatusReporter, SyncState, SyncStatus};
