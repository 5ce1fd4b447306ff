//! Sync error taxonomy

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::models::SyncConfigId;
use crate::webdav::WebDavError;

use super::status::SyncState;

/// Result type for sync operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors that end (or prevent) a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid URL, missing password, disabled config; the run never starts
    #[error("Sync configuration error: {0}")]
    Configuration(String),

    /// Server rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Server unreachable after retries
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Unexpected server response outside a single item transfer
    #[error("Remote error: {0}")]
    Remote(WebDavError),

    /// Per-item failures crossed the run's threshold
    #[error("{failed} items failed to sync (threshold {threshold})")]
    TooManyFailures {
        /// Items that failed in this run
        failed: usize,
        /// Configured threshold
        threshold: usize,
    },

    /// A manifest could not be written
    #[error("Failed to persist sync manifest: {0}")]
    ManifestPersistence(String),

    /// Another run for the same config is in flight
    #[error("A sync run is already active for {0}")]
    AlreadyRunning(SyncConfigId),

    /// The run observed a cancellation request
    #[error("Sync cancelled")]
    Cancelled,

    /// No config with this id exists
    #[error("Sync configuration not found: {0}")]
    ConfigNotFound(SyncConfigId),

    /// The state machine refused a transition
    #[error("Invalid sync state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: SyncState,
        /// Requested state
        to: SyncState,
    },

    /// The task running the sync ended without producing a result
    #[error("Sync task ended abnormally: {0}")]
    Interrupted(String),

    /// Secure storage failure
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// Local database or filesystem failure
    #[error(transparent)]
    Core(#[from] crate::Error),
}

impl From<WebDavError> for SyncError {
    fn from(error: WebDavError) -> Self {
        match error {
            WebDavError::Unauthorized { status } => {
                Self::Authentication(format!("server answered HTTP {status}"))
            }
            WebDavError::Transient(message) => Self::Connectivity(message),
            WebDavError::InvalidUrl(message) => Self::Configuration(message),
            other => Self::Remote(other),
        }
    }
}

impl SyncError {
    /// Whether this error came from rejected credentials
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Short message suitable for showing to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(message) => format!("Sync is not configured correctly: {message}"),
            Self::Authentication(_) => {
                "The sync server rejected your username or password.".to_string()
            }
            Self::Connectivity(_) => {
                "Could not reach the sync server. Check your connection and try again."
                    .to_string()
            }
            Self::Remote(error) => format!("The sync server returned an error: {error}"),
            Self::TooManyFailures { failed, .. } => {
                format!("{failed} items could not be synced.")
            }
            Self::ManifestPersistence(_) => {
                "Sync state could not be saved; the next sync will retry.".to_string()
            }
            Self::AlreadyRunning(_) => "A sync is already in progress.".to_string(),
            Self::Cancelled => "Sync was cancelled.".to_string(),
            Self::Interrupted(_) => {
                "Sync stopped unexpectedly; the next sync will start over.".to_string()
            }
            Self::ConfigNotFound(_) => "This sync target no longer exists.".to_string(),
            Self::InvalidTransition { .. } | Self::Core(_) => {
                format!("Sync failed: {self}")
            }
            Self::Credentials(_) => "The saved password could not be read.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webdav_errors_map_into_taxonomy() {
        assert!(SyncError::from(WebDavError::Unauthorized { status: 403 }).is_auth());
        assert!(matches!(
            SyncError::from(WebDavError::Transient("timeout".to_string())),
            SyncError::Connectivity(_)
        ));
        assert!(matches!(
            SyncError::from(WebDavError::InvalidUrl("x".to_string())),
            SyncError::Configuration(_)
        ));
        assert!(matches!(
            SyncError::from(WebDavError::NotFound("/x".to_string())),
            SyncError::Remote(WebDavError::NotFound(_))
        ));
    }

    #[test]
    fn auth_and_connectivity_messages_differ() {
        let auth = SyncError::Authentication("401".to_string()).user_message();
        let network = SyncError::Connectivity("reset".to_string()).user_message();
        assert_ne!(auth, network);
        assert!(auth.contains("password"));
    }
}
