use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use quill_core::webdav::WebDavConnector;
use quill_core::{
    CredentialStore, DatabaseService, Entry, Journal, JournalId, SyncConfig, SyncConfigId,
    SyncConflict, SyncEngine,
};
use serde::Serialize;

use crate::error::CliError;
use crate::settings::CliSettings;

const DATABASE_FILE_NAME: &str = "quill.db";

/// Everything a command needs to reach local state and remotes
pub struct AppContext {
    pub data_dir: PathBuf,
    pub settings: CliSettings,
    pub credentials: Arc<dyn CredentialStore>,
    pub connector: Arc<dyn WebDavConnector>,
}

impl AppContext {
    pub fn open_database(&self) -> Result<DatabaseService, CliError> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(DatabaseService::open_path(
            self.data_dir.join(DATABASE_FILE_NAME),
        )?)
    }

    pub fn engine(&self, db: DatabaseService) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(
            db,
            Arc::clone(&self.credentials),
            Arc::clone(&self.connector),
            self.settings.engine_options(&self.data_dir),
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct JournalListItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub entries: usize,
    pub updated_at: i64,
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub journal_id: String,
    pub title: Option<String>,
    pub preview: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct RemoteListItem {
    pub id: String,
    pub display_name: String,
    pub server_url: String,
    pub username: String,
    pub enabled: bool,
    pub sync_frequency: String,
    pub sync_attachments: bool,
    pub journal_ids: Vec<String>,
    pub last_sync_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub config_id: String,
    pub item_type: String,
    pub item_id: String,
    pub local_modified_at: i64,
    pub remote_modified_at: i64,
    pub winner: String,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

fn pick_unique<T>(
    query: &str,
    mut matches: Vec<T>,
    not_found: CliError,
    id_of: impl Fn(&T) -> String,
) -> Result<T, CliError> {
    match matches.len() {
        0 => Err(not_found),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|item| short_id(&id_of(item)))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::Ambiguous(format!(
                "'{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Find a journal by full id, unique id prefix or exact (case-insensitive) name
pub async fn resolve_journal(db: &DatabaseService, query: &str) -> Result<Journal, CliError> {
    let query = query.trim();
    if let Ok(id) = query.parse::<JournalId>() {
        if let Some(journal) = db.get_journal(&id).await? {
            return Ok(journal);
        }
    }

    let journals = db.list_journals().await?;
    let by_name: Vec<Journal> = journals
        .iter()
        .filter(|journal| journal.name.eq_ignore_ascii_case(query))
        .cloned()
        .collect();
    let matches = if by_name.is_empty() && !query.is_empty() {
        journals
            .into_iter()
            .filter(|journal| journal.id.to_string().starts_with(query))
            .collect()
    } else {
        by_name
    };

    pick_unique(
        query,
        matches,
        CliError::JournalNotFound(query.to_string()),
        |journal| journal.id.to_string(),
    )
}

/// Find a sync config by full id or unique id prefix
pub async fn resolve_remote(db: &DatabaseService, query: &str) -> Result<SyncConfig, CliError> {
    let query = query.trim();
    if let Ok(id) = query.parse::<SyncConfigId>() {
        if let Some(config) = db.get_sync_config(&id).await? {
            return Ok(config);
        }
    }

    let matches = if query.is_empty() {
        Vec::new()
    } else {
        db.list_sync_configs()
            .await?
            .into_iter()
            .filter(|config| config.id.to_string().starts_with(query))
            .collect()
    };

    pick_unique(
        query,
        matches,
        CliError::RemoteNotFound(query.to_string()),
        |config| config.id.to_string(),
    )
}

pub fn entry_preview(entry: &Entry, max_chars: usize) -> String {
    let headline = entry.headline(usize::MAX);
    let collapsed = headline.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_entry_lines(entries: &[Entry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let short_id = short_id(&entry.id.to_string());
            let preview = entry_preview(entry, 40);
            let relative_time = format_relative_time(entry.updated_at, now_ms);
            format!("{short_id:<13}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn entry_to_list_item(entry: &Entry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        id: entry.id.to_string(),
        journal_id: entry.journal_id.to_string(),
        title: entry.title.clone(),
        preview: entry_preview(entry, 80),
        content: entry.content.clone(),
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        relative_time: format_relative_time(entry.updated_at, now_ms),
    }
}

pub fn remote_to_list_item(config: &SyncConfig) -> RemoteListItem {
    RemoteListItem {
        id: config.id.to_string(),
        display_name: config.display_name.clone(),
        server_url: config.server_url.clone(),
        username: config.username.clone(),
        enabled: config.enabled,
        sync_frequency: config.sync_frequency.to_string(),
        sync_attachments: config.sync_attachments,
        journal_ids: config
            .synced_journal_ids
            .iter()
            .map(ToString::to_string)
            .collect(),
        last_sync_at: config.last_sync_at,
    }
}

pub fn format_remote_lines(configs: &[SyncConfig]) -> Vec<String> {
    configs
        .iter()
        .map(|config| {
            let last_sync = config
                .last_sync_at
                .map_or_else(|| "never".to_string(), format_sync_timestamp);
            let state = if config.enabled { "" } else { "  (disabled)" };
            format!(
                "{}  {:<20}  {}  journals={}  last={}{}",
                short_id(&config.id.to_string()),
                config.display_name,
                config.server_url,
                config.synced_journal_ids.len(),
                last_sync,
                state
            )
        })
        .collect()
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        config_id: conflict.config_id.to_string(),
        item_type: conflict.item_type.to_string(),
        item_id: conflict.item_id.clone(),
        local_modified_at: conflict.local_modified_at,
        remote_modified_at: conflict.remote_modified_at,
        winner: conflict.winner.to_string(),
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<4}  {}={}  winner={}  local={} remote={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.item_type,
                short_id(&conflict.item_id),
                conflict.winner,
                format_sync_timestamp(conflict.local_modified_at),
                format_sync_timestamp(conflict.remote_modified_at)
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn resolve_entry_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}
