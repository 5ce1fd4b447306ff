//! Sync configuration and conflict log repository

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::models::{JournalId, SyncConfig, SyncConfigId, SyncConflict, SyncFrequency};
use rusqlite::{params, types::Type, Connection, OptionalExtension};

use super::repository::parse_id;

/// Trait for sync configuration storage operations
pub trait SyncConfigRepository {
    /// Insert or update a sync configuration
    fn save_config(&self, config: &SyncConfig) -> Result<()>;

    /// Get a sync configuration by ID
    fn get_config(&self, id: &SyncConfigId) -> Result<Option<SyncConfig>>;

    /// List all sync configurations
    fn list_configs(&self) -> Result<Vec<SyncConfig>>;

    /// Delete a sync configuration
    fn delete_config(&self, id: &SyncConfigId) -> Result<()>;

    /// Record the completion time of a successful run
    fn set_last_sync_at(&self, id: &SyncConfigId, timestamp_ms: i64) -> Result<()>;

    /// Append a resolved conflict to the log, returning its row id
    fn record_conflict(&self, conflict: &SyncConflict) -> Result<i64>;

    /// List recently resolved conflicts, newest first
    fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// `SQLite` implementation of `SyncConfigRepository`
pub struct SqliteSyncConfigRepository<'a> {
    conn: &'a Connection,
}

const CONFIG_COLUMNS: &str = "id, server_url, username, display_name, enabled, sync_frequency, \
     sync_on_wifi_only, sync_attachments, encrypt_data, synced_journal_ids, last_sync_at, \
     created_at, updated_at";

impl<'a> SqliteSyncConfigRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_config(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncConfig> {
        let frequency: String = row.get(5)?;
        let journal_ids: String = row.get(9)?;

        Ok(SyncConfig {
            id: parse_id(row, 0)?,
            server_url: row.get(1)?,
            username: row.get(2)?,
            display_name: row.get(3)?,
            enabled: row.get::<_, i32>(4)? != 0,
            sync_frequency: frequency.parse::<SyncFrequency>().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(error))
            })?,
            sync_on_wifi_only: row.get::<_, i32>(6)? != 0,
            sync_attachments: row.get::<_, i32>(7)? != 0,
            encrypt_data: row.get::<_, i32>(8)? != 0,
            synced_journal_ids: serde_json::from_str::<BTreeSet<JournalId>>(&journal_ids)
                .map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(error))
                })?,
            last_sync_at: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncConflict> {
        let item_type: String = row.get(2)?;
        let winner: String = row.get(6)?;

        Ok(SyncConflict {
            id: row.get(0)?,
            config_id: parse_id(row, 1)?,
            item_type: item_type.parse().map_err(|error: Error| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
            })?,
            item_id: row.get(3)?,
            local_modified_at: row.get(4)?,
            remote_modified_at: row.get(5)?,
            winner: winner.parse().map_err(|error: Error| {
                rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(error))
            })?,
            resolved_at: row.get(7)?,
            strategy: row.get(8)?,
        })
    }
}

impl SyncConfigRepository for SqliteSyncConfigRepository<'_> {
    fn save_config(&self, config: &SyncConfig) -> Result<()> {
        let journal_ids = serde_json::to_string(&config.synced_journal_ids)?;

        self.conn.execute(
            &format!(
                "INSERT INTO sync_configs ({CONFIG_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    server_url = excluded.server_url,
                    username = excluded.username,
                    display_name = excluded.display_name,
                    enabled = excluded.enabled,
                    sync_frequency = excluded.sync_frequency,
                    sync_on_wifi_only = excluded.sync_on_wifi_only,
                    sync_attachments = excluded.sync_attachments,
                    encrypt_data = excluded.encrypt_data,
                    synced_journal_ids = excluded.synced_journal_ids,
                    last_sync_at = excluded.last_sync_at,
                    updated_at = excluded.updated_at"
            ),
            params![
                config.id.as_str(),
                config.server_url,
                config.username,
                config.display_name,
                i32::from(config.enabled),
                config.sync_frequency.as_str(),
                i32::from(config.sync_on_wifi_only),
                i32::from(config.sync_attachments),
                i32::from(config.encrypt_data),
                journal_ids,
                config.last_sync_at,
                config.created_at,
                config.updated_at
            ],
        )?;
        Ok(())
    }

    fn get_config(&self, id: &SyncConfigId) -> Result<Option<SyncConfig>> {
        let config = self
            .conn
            .query_row(
                &format!("SELECT {CONFIG_COLUMNS} FROM sync_configs WHERE id = ?"),
                params![id.as_str()],
                Self::parse_config,
            )
            .optional()?;
        Ok(config)
    }

    fn list_configs(&self) -> Result<Vec<SyncConfig>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONFIG_COLUMNS} FROM sync_configs ORDER BY created_at ASC"
        ))?;

        let configs = stmt
            .query_map([], Self::parse_config)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(configs)
    }

    fn delete_config(&self, id: &SyncConfigId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_configs WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_last_sync_at(&self, id: &SyncConfigId, timestamp_ms: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE sync_configs SET last_sync_at = ? WHERE id = ?",
            params![timestamp_ms, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn record_conflict(&self, conflict: &SyncConflict) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_conflicts (config_id, item_type, item_id, local_modified_at,
                remote_modified_at, winner, resolved_at, strategy)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                conflict.config_id.as_str(),
                conflict.item_type.as_str(),
                conflict.item_id,
                conflict.local_modified_at,
                conflict.remote_modified_at,
                conflict.winner.as_str(),
                conflict.resolved_at,
                conflict.strategy
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT
    fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, config_id, item_type, item_id, local_modified_at, remote_modified_at,
                    winner, resolved_at, strategy
             FROM sync_conflicts
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?",
        )?;

        let conflicts = stmt
            .query_map(params![limit as i64], Self::parse_conflict)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::sync::{ConflictSide, ItemType};

    fn config() -> SyncConfig {
        SyncConfig::new("https://dav.example.com", "alice", "Home")
            .unwrap()
            .with_journal(JournalId::new())
    }

    #[test]
    fn test_save_and_get_config() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncConfigRepository::new(db.connection());

        let mut config = config();
        config.sync_frequency = SyncFrequency::Daily;
        config.sync_attachments = false;
        repo.save_config(&config).unwrap();

        let loaded = repo.get_config(&config.id).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_config_updates_existing_row() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncConfigRepository::new(db.connection());

        let mut config = config();
        repo.save_config(&config).unwrap();
        config.display_name = "Office".to_string();
        repo.save_config(&config).unwrap();

        let configs = repo.list_configs().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].display_name, "Office");
    }

    #[test]
    fn test_set_last_sync_at_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncConfigRepository::new(db.connection());

        let config = config();
        repo.save_config(&config).unwrap();
        repo.set_last_sync_at(&config.id, 1_234).unwrap();
        assert_eq!(
            repo.get_config(&config.id).unwrap().unwrap().last_sync_at,
            Some(1_234)
        );

        repo.delete_config(&config.id).unwrap();
        assert!(repo.get_config(&config.id).unwrap().is_none());
        assert!(matches!(
            repo.set_last_sync_at(&config.id, 1),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_conflict_log_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncConfigRepository::new(db.connection());
        let config_id = SyncConfigId::new();

        for (resolved_at, winner) in [(100, ConflictSide::Local), (200, ConflictSide::Remote)] {
            repo.record_conflict(&SyncConflict {
                id: 0,
                config_id,
                item_type: ItemType::Entry,
                item_id: "entry-1".to_string(),
                local_modified_at: 10,
                remote_modified_at: 20,
                winner,
                resolved_at,
                strategy: "lww".to_string(),
            })
            .unwrap();
        }

        let conflicts = repo.list_conflicts(10).unwrap();
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].resolved_at, 200);
        assert_eq!(conflicts[0].winner, ConflictSide::Remote);
        assert_eq!(conflicts[1].item_type, ItemType::Entry);
        assert_eq!(repo.list_conflicts(1).unwrap().len(), 1);
    }
}
