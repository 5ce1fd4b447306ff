//! quill-core - Core library for Quill
//!
//! This crate contains the journal models, the `SQLite` database layer and the
//! manifest-based WebDAV sync engine used by every Quill interface.

pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;
pub mod webdav;

pub use credentials::{
    CredentialError, CredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use error::{Error, Result};
pub use models::{
    Attachment, AttachmentId, Entry, EntryId, Journal, JournalId, SyncConfig, SyncConfigId,
    SyncConflict, SyncFrequency,
};
pub use services::DatabaseService;
pub use sync::{EngineOptions, SyncEngine, SyncError, SyncReport, SyncState, SyncStatus};
