//! Remote sync configuration model

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option, unix_millis_now};

use super::id::uuid_id;
use super::journal::JournalId;

uuid_id!(
    /// A unique identifier for a remote sync target
    SyncConfigId
);

/// How often an external scheduler should trigger a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SyncFrequency {
    /// Only when the user asks
    #[default]
    Manual,
    /// Once when the application starts
    OnAppStart,
    /// Every hour
    Hourly,
    /// Every day
    Daily,
    /// Every week
    Weekly,
}

impl SyncFrequency {
    /// Stable string form used for persistence
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::OnAppStart => "onAppStart",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    /// Interval between periodic runs, `None` for trigger-driven frequencies
    #[must_use]
    pub const fn interval(self) -> Option<Duration> {
        match self {
            Self::Manual | Self::OnAppStart => None,
            Self::Hourly => Some(Duration::from_secs(60 * 60)),
            Self::Daily => Some(Duration::from_secs(24 * 60 * 60)),
            Self::Weekly => Some(Duration::from_secs(7 * 24 * 60 * 60)),
        }
    }
}

impl fmt::Display for SyncFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "manual" => Ok(Self::Manual),
            "onAppStart" => Ok(Self::OnAppStart),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(Error::InvalidInput(format!(
                "Unknown sync frequency: {other}"
            ))),
        }
    }
}

/// One remote WebDAV target.
///
/// The password is never part of this struct; it lives in the credential
/// store keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Unique identifier, shared by every device syncing the same remote set
    pub id: SyncConfigId,
    /// WebDAV server root URL
    pub server_url: String,
    /// WebDAV user name
    pub username: String,
    /// Human readable label
    pub display_name: String,
    /// Disabled configs are never synced
    pub enabled: bool,
    /// Scheduling hint for external timers
    pub sync_frequency: SyncFrequency,
    /// Scheduling hint: only sync on unmetered networks
    pub sync_on_wifi_only: bool,
    /// Whether attachment files take part in sync
    pub sync_attachments: bool,
    /// Encryption toggle (modelled only)
    pub encrypt_data: bool,
    /// Explicit opt-in set; journals outside it are never touched
    pub synced_journal_ids: BTreeSet<JournalId>,
    /// Completion time of the last successful run (Unix ms)
    pub last_sync_at: Option<i64>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl SyncConfig {
    /// Create an enabled configuration with manual frequency
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self> {
        let now = unix_millis_now();
        let config = Self {
            id: SyncConfigId::new(),
            server_url: server_url.into().trim().trim_end_matches('/').to_string(),
            username: username.into().trim().to_string(),
            display_name: display_name.into().trim().to_string(),
            enabled: true,
            sync_frequency: SyncFrequency::Manual,
            sync_on_wifi_only: false,
            sync_attachments: true,
            encrypt_data: false,
            synced_journal_ids: BTreeSet::new(),
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        };
        config.validate()?;
        Ok(config)
    }

    /// Opt a journal into this sync target
    #[must_use]
    pub fn with_journal(mut self, journal_id: JournalId) -> Self {
        self.synced_journal_ids.insert(journal_id);
        self
    }

    /// Whether the given journal is enrolled in this sync target
    #[must_use]
    pub fn syncs_journal(&self, journal_id: &JournalId) -> bool {
        self.synced_journal_ids.contains(journal_id)
    }

    /// Check that the configuration can be used to open a connection
    pub fn validate(&self) -> Result<()> {
        let Some(url) = normalize_text_option(Some(self.server_url.clone())) else {
            return Err(Error::InvalidInput("Server URL cannot be empty".to_string()));
        };
        if !is_http_url(&url) {
            return Err(Error::InvalidInput(
                "Server URL must include http:// or https://".to_string(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(Error::InvalidInput("Username cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Whether a periodic run is due at `now_ms`
    #[must_use]
    pub fn is_due(&self, now_ms: i64) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(interval) = self.sync_frequency.interval() else {
            return false;
        };
        let Some(last) = self.last_sync_at else {
            return true;
        };
        let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(last) >= interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig::new("https://dav.example.com/", "alice", "Home").unwrap()
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        assert_eq!(config().server_url, "https://dav.example.com");
    }

    #[test]
    fn test_validate_rejects_bad_url_and_user() {
        assert!(SyncConfig::new("dav.example.com", "alice", "Home").is_err());
        assert!(SyncConfig::new("https://dav.example.com", " ", "Home").is_err());
    }

    #[test]
    fn test_frequency_roundtrip() {
        for frequency in [
            SyncFrequency::Manual,
            SyncFrequency::OnAppStart,
            SyncFrequency::Hourly,
            SyncFrequency::Daily,
            SyncFrequency::Weekly,
        ] {
            assert_eq!(frequency.as_str().parse::<SyncFrequency>().unwrap(), frequency);
        }
        assert!("sometimes".parse::<SyncFrequency>().is_err());
    }

    #[test]
    fn test_is_due_respects_interval() {
        let mut config = config();
        assert!(!config.is_due(0), "manual configs are never due");

        config.sync_frequency = SyncFrequency::Hourly;
        assert!(config.is_due(0), "never-synced configs are due");

        config.last_sync_at = Some(1_000);
        assert!(!config.is_due(1_000 + 59 * 60 * 1000));
        assert!(config.is_due(1_000 + 60 * 60 * 1000));

        config.enabled = false;
        assert!(!config.is_due(i64::MAX));
    }

    #[test]
    fn test_syncs_journal_only_when_enrolled() {
        let enrolled = JournalId::new();
        let config = config().with_journal(enrolled);
        assert!(config.syncs_journal(&enrolled));
        assert!(!config.syncs_journal(&JournalId::new()));
    }
}
