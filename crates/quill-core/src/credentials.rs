//! Secret storage for WebDAV passwords.
//!
//! Passwords never live in the database; they are keyed by sync config id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use keyring::Entry;
use thiserror::Error;

use crate::models::SyncConfigId;

const KEYRING_SERVICE_NAME: &str = "quill-sync";

/// Errors raised by a credential store
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The platform secure storage rejected the request
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

/// Result type for credential operations
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Lookup and persistence of per-config passwords
pub trait CredentialStore: Send + Sync {
    /// Load the password for a config, `None` when nothing is stored
    fn password(&self, config_id: &SyncConfigId) -> CredentialResult<Option<String>>;

    /// Store or replace the password for a config
    fn set_password(&self, config_id: &SyncConfigId, password: &str) -> CredentialResult<()>;

    /// Remove the password for a config; missing entries are not an error
    fn delete_password(&self, config_id: &SyncConfigId) -> CredentialResult<()>;
}

/// Credential store backed by the OS keyring (`keyring` crate).
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self {
            service_name: KEYRING_SERVICE_NAME.to_string(),
        }
    }
}

impl KeyringCredentialStore {
    /// Use a custom keyring service name
    #[must_use]
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, config_id: &SyncConfigId) -> CredentialResult<Entry> {
        Entry::new(&self.service_name, &config_id.as_str())
            .map_err(|error| CredentialError::SecureStorage(error.to_string()))
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn password(&self, config_id: &SyncConfigId) -> CredentialResult<Option<String>> {
        match self.entry(config_id)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(CredentialError::SecureStorage(error.to_string())),
        }
    }

    fn set_password(&self, config_id: &SyncConfigId, password: &str) -> CredentialResult<()> {
        self.entry(config_id)?
            .set_password(password)
            .map_err(|error| CredentialError::SecureStorage(error.to_string()))
    }

    fn delete_password(&self, config_id: &SyncConfigId) -> CredentialResult<()> {
        match self.entry(config_id)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CredentialError::SecureStorage(error.to_string())),
        }
    }
}

/// Process-local credential store, used by tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    passwords: Arc<Mutex<HashMap<SyncConfigId, String>>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn password(&self, config_id: &SyncConfigId) -> CredentialResult<Option<String>> {
        let guard = self.passwords.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(config_id).cloned())
    }

    fn set_password(&self, config_id: &SyncConfigId, password: &str) -> CredentialResult<()> {
        let mut guard = self.passwords.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(*config_id, password.to_string());
        Ok(())
    }

    fn delete_password(&self, config_id: &SyncConfigId) -> CredentialResult<()> {
        let mut guard = self.passwords.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(config_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        let id = SyncConfigId::new();

        assert_eq!(store.password(&id).unwrap(), None);
        store.set_password(&id, "secret").unwrap();
        assert_eq!(store.password(&id).unwrap().as_deref(), Some("secret"));

        store.delete_password(&id).unwrap();
        store.delete_password(&id).unwrap();
        assert_eq!(store.password(&id).unwrap(), None);
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryCredentialStore::new();
        let clone = store.clone();
        let id = SyncConfigId::new();

        clone.set_password(&id, "shared").unwrap();
        assert_eq!(store.password(&id).unwrap().as_deref(), Some("shared"));
    }
}
