//! WebDAV client abstraction.
//!
//! Paths are absolute and `/`-separated (e.g. `/journal_app/journals/x.json`);
//! each client resolves them against its own server root.

mod connector;
mod http;
mod memory;
mod retry;

use async_trait::async_trait;
use thiserror::Error;

pub use connector::{HttpConnector, MemoryConnector, WebDavConnector};
pub use http::HttpWebDavClient;
pub use memory::{MemoryWebDav, OperationCounts};
pub use retry::RetryPolicy;

/// Errors returned by WebDAV operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebDavError {
    /// The resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The collection already exists (MKCOL on an existing path)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Credentials were rejected (401/403)
    #[error("Unauthorized (HTTP {status})")]
    Unauthorized {
        /// HTTP status returned by the server
        status: u16,
    },

    /// Timeout, connection failure or 5xx; worth retrying
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Any other unexpected status
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status returned by the server
        status: u16,
        /// Response excerpt
        message: String,
    },

    /// Server URL or path could not be turned into a request URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl WebDavError {
    /// Whether the failure may succeed when retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the server rejected the credentials
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether the resource is missing
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for WebDAV operations
pub type WebDavResult<T> = std::result::Result<T, WebDavError>;

/// Minimal WebDAV surface the sync engine relies on.
#[async_trait]
pub trait WebDavClient: Send + Sync {
    /// Check that the server is reachable and accepts the credentials
    async fn ping(&self) -> WebDavResult<()>;

    /// Create a single collection; fails with `AlreadyExists` if present
    async fn mkdir(&self, path: &str) -> WebDavResult<()>;

    /// List the direct children of a collection as absolute paths
    async fn read_dir(&self, path: &str) -> WebDavResult<Vec<String>>;

    /// Read a file's bytes
    async fn read(&self, path: &str) -> WebDavResult<Vec<u8>>;

    /// Create or overwrite a file; the parent collection must exist
    async fn write(&self, path: &str, bytes: Vec<u8>) -> WebDavResult<()>;

    /// Remove a file or collection
    async fn remove(&self, path: &str) -> WebDavResult<()>;

    /// Whether a file or collection exists
    async fn exists(&self, path: &str) -> WebDavResult<bool>;
}

/// Normalize a remote path to `/a/b/c` form.
pub(crate) fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

/// Parent collection of a normalized path, `None` for the root.
pub(crate) fn parent_path(path: &str) -> Option<String> {
    let path = normalize_path(path);
    if path == "/" {
        return None;
    }
    let (parent, _) = path.rsplit_once('/')?;
    Some(if parent.is_empty() {
        "/".to_string()
    } else {
        parent.to_string()
    })
}
