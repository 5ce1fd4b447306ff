//! Shared database service wrapper used across clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, JournalRepository, SqliteJournalRepository, SqliteSyncConfigRepository,
    SyncConfigRepository,
};
use crate::models::{
    Attachment, AttachmentId, Entry, EntryId, Journal, JournalId, SyncConfig, SyncConfigId,
    SyncConflict,
};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a valid `SQLite` database is moved aside and a
    /// fresh one is created in its place.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path) {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Detected invalid local DB file at {}: {}. Moving it aside.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_file(&db_path)?;
                Database::open(&db_path)?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location of the database, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_file(db_path: &Path) -> Result<()> {
        if !db_path.exists() {
            return Ok(());
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let base_name = db_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("quill.db");
        let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted local DB file from {} to {}",
            db_path.display(),
            backup_path.display()
        );

        for suffix in ["-wal", "-shm"] {
            let sidecar = db_path.with_file_name(format!("{base_name}{suffix}"));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
                tracing::warn!("Removed stale DB sidecar file {}", sidecar.display());
            }
        }

        Ok(())
    }

    /// Create a journal.
    pub async fn create_journal(&self, name: &str, description: Option<String>) -> Result<Journal> {
        let journal = Journal::new(name, description)?;
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.insert_journal(&journal)?;
        Ok(journal)
    }

    /// Fetch a journal by id.
    pub async fn get_journal(&self, id: &JournalId) -> Result<Option<Journal>> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.get_journal(id)
    }

    /// List journals in sidebar order.
    pub async fn list_journals(&self) -> Result<Vec<Journal>> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.list_journals()
    }

    /// Insert or replace a journal received from a remote.
    pub async fn upsert_journal(&self, journal: &Journal) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.upsert_journal(journal)
    }

    /// Create an entry in the given journal.
    pub async fn create_entry(
        &self,
        journal_id: &JournalId,
        title: Option<String>,
        content: &str,
    ) -> Result<Entry> {
        let entry = Entry::new(*journal_id, title, content);
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.insert_entry(&entry)?;
        Ok(entry)
    }

    /// Fetch an entry by id.
    pub async fn get_entry(&self, id: &EntryId) -> Result<Option<Entry>> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.get_entry(id)
    }

    /// List entries of a journal, newest first.
    pub async fn list_entries(&self, journal_id: &JournalId) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.list_entries(journal_id)
    }

    /// Edit an entry's title and content.
    pub async fn update_entry(
        &self,
        id: &EntryId,
        title: Option<&str>,
        content: &str,
    ) -> Result<Entry> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.update_entry(id, title, content)
    }

    /// Insert or replace an entry received from a remote.
    pub async fn upsert_entry(&self, entry: &Entry) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.upsert_entry(entry)
    }

    /// Record attachment metadata.
    pub async fn create_attachment(&self, attachment: &Attachment) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.insert_attachment(attachment)
    }

    /// Fetch attachment metadata by id.
    pub async fn get_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.get_attachment(id)
    }

    /// List attachment metadata of every entry in a journal.
    pub async fn list_attachments(&self, journal_id: &JournalId) -> Result<Vec<Attachment>> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.list_attachments(journal_id)
    }

    /// List attachment metadata of one entry.
    pub async fn list_entry_attachments(&self, entry_id: &EntryId) -> Result<Vec<Attachment>> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.list_entry_attachments(entry_id)
    }

    /// Insert or replace attachment metadata received from a remote.
    pub async fn upsert_attachment(&self, attachment: &Attachment) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteJournalRepository::new(db.connection());
        repo.upsert_attachment(attachment)
    }

    /// Insert or update a sync configuration.
    pub async fn save_sync_config(&self, config: &SyncConfig) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSyncConfigRepository::new(db.connection());
        repo.save_config(config)
    }

    /// Fetch a sync configuration by id.
    pub async fn get_sync_config(&self, id: &SyncConfigId) -> Result<Option<SyncConfig>> {
        let db = self.db.lock().await;
        let repo = SqliteSyncConfigRepository::new(db.connection());
        repo.get_config(id)
    }

    /// List sync configurations.
    pub async fn list_sync_configs(&self) -> Result<Vec<SyncConfig>> {
        let db = self.db.lock().await;
        let repo = SqliteSyncConfigRepository::new(db.connection());
        repo.list_configs()
    }

    /// Delete a sync configuration.
    pub async fn delete_sync_config(&self, id: &SyncConfigId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSyncConfigRepository::new(db.connection());
        repo.delete_config(id)
    }

    /// Stamp the completion time of a successful sync run.
    pub async fn set_last_sync_at(&self, id: &SyncConfigId, timestamp_ms: i64) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSyncConfigRepository::new(db.connection());
        repo.set_last_sync_at(id, timestamp_ms)
    }

    /// Append a resolved conflict to the log.
    pub async fn record_conflict(&self, conflict: &SyncConflict) -> Result<i64> {
        let db = self.db.lock().await;
        let repo = SqliteSyncConfigRepository::new(db.connection());
        repo.record_conflict(conflict)
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let repo = SqliteSyncConfigRepository::new(db.connection());
        repo.list_conflicts(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn in_memory_create_and_list_roundtrip() {
        let service = DatabaseService::open_in_memory().unwrap();

        let journal = service.create_journal("Daily", None).await.unwrap();
        service
            .create_entry(&journal.id, None, "hello core")
            .await
            .unwrap();

        let entries = service.list_entries(&journal.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "hello core");
    }

    #[tokio::test]
    async fn sync_configs_roundtrip_through_service() {
        let service = DatabaseService::open_in_memory().unwrap();
        let config = SyncConfig::new("https://dav.example.com", "alice", "Home").unwrap();

        service.save_sync_config(&config).await.unwrap();
        assert_eq!(
            service.get_sync_config(&config.id).await.unwrap(),
            Some(config.clone())
        );

        service.delete_sync_config(&config.id).await.unwrap();
        assert!(service.list_sync_configs().await.unwrap().is_empty());
    }

    #[test]
    fn detects_corrupted_db_errors() {
        let not_a_database = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_NOTADB),
            Some("file is not a database".to_string()),
        );
        assert!(DatabaseService::is_corrupted_db_error(&crate::Error::Sqlite(
            not_a_database
        )));
        assert!(!DatabaseService::is_corrupted_db_error(
            &crate::Error::InvalidInput("Journal name cannot be empty".to_string())
        ));
    }

    #[test]
    fn open_path_replaces_corrupted_file() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("quill.db");
        let wal_path = tmp.path().join("quill.db-wal");

        std::fs::write(&db_path, vec![0x42; 4096]).unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();

        let service = DatabaseService::open_path(&db_path).unwrap();
        assert_eq!(service.path(), Some(db_path.as_path()));
        // WAL mode recreates the sidecar; only the stale bytes must be gone
        let wal_contents = std::fs::read(&wal_path).unwrap_or_default();
        assert_ne!(wal_contents, b"wal".to_vec());

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("quill.db.corrupt-")
            })
            .count();
        assert_eq!(backups, 1);
    }
}
