use std::io;

use quill_core::sync::SyncError;
use quill_core::CredentialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry content provided")]
    EmptyContent,
    #[error("Journal not found for id/prefix/name: {0}")]
    JournalNotFound(String),
    #[error("Sync target not found for id/prefix: {0}")]
    RemoteNotFound(String),
    #[error("{0}")]
    Ambiguous(String),
    #[error("Invalid config id: {0}")]
    InvalidId(String),
    #[error("No password given. Pass --password or set QUILL_WEBDAV_PASSWORD.")]
    MissingPassword,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No enabled sync targets. Add one with `quill remote add`.")]
    NoRemotes,
    #[error("{failed} of {total} sync runs failed")]
    SyncRunsFailed { failed: usize, total: usize },
}
