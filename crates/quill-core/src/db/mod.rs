//! Database layer for Quill

mod connection;
mod migrations;
mod repository;
mod sync_repository;

pub use connection::Database;
pub use repository::{JournalRepository, SqliteJournalRepository};
pub use sync_repository::{SqliteSyncConfigRepository, SyncConfigRepository};
