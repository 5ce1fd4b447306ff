//! Factories that turn a sync config plus password into a client.

use std::sync::Arc;

use crate::models::SyncConfig;

use super::{HttpWebDavClient, MemoryWebDav, WebDavClient, WebDavResult};

/// Builds a WebDAV client for a sync target
pub trait WebDavConnector: Send + Sync {
    /// Create a client for `config` authenticating with `password`
    fn connect(&self, config: &SyncConfig, password: &str) -> WebDavResult<Arc<dyn WebDavClient>>;
}

/// Connects to real servers over HTTP(S)
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl WebDavConnector for HttpConnector {
    fn connect(&self, config: &SyncConfig, password: &str) -> WebDavResult<Arc<dyn WebDavClient>> {
        let client = HttpWebDavClient::new(&config.server_url, &config.username, password)?;
        Ok(Arc::new(client))
    }
}

/// Hands out handles to one shared [`MemoryWebDav`], regardless of config
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    server: MemoryWebDav,
}

impl MemoryConnector {
    /// Connect every config to `server`
    #[must_use]
    pub fn new(server: MemoryWebDav) -> Self {
        Self { server }
    }

    /// The backing server
    #[must_use]
    pub const fn server(&self) -> &MemoryWebDav {
        &self.server
    }
}

impl WebDavConnector for MemoryConnector {
    fn connect(&self, _config: &SyncConfig, _password: &str) -> WebDavResult<Arc<dyn WebDavClient>> {
        Ok(Arc::new(self.server.clone()))
    }
}
