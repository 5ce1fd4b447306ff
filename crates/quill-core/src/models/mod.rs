//! Data models for Quill

mod attachment;
mod entry;
mod id;
mod journal;
mod sync_config;
mod sync_conflict;

pub use attachment::{Attachment, AttachmentId};
pub use entry::{Entry, EntryId};
pub use journal::{Journal, JournalId};
pub use sync_config::{SyncConfig, SyncConfigId, SyncFrequency};
pub use sync_conflict::SyncConflict;
