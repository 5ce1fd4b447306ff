//! Local and remote persistence of sync manifests.

use std::path::Path;

use crate::models::SyncConfigId;
use crate::webdav::{RetryPolicy, WebDavClient, WebDavError};

use super::error::{SyncError, SyncResult};
use super::executor::write_atomically;
use super::manifest::SyncManifest;
use super::paths::{ancestors, manifest_path};

/// Load the last-synced manifest from disk.
///
/// A missing, unreadable or unparsable file yields `None`, so the caller
/// regenerates the baseline instead of failing the run.
pub fn load_local(path: &Path, config_id: &SyncConfigId) -> Option<SyncManifest> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
        Err(error) => {
            tracing::warn!(%config_id, path = %path.display(), "Failed to read local manifest: {error}");
            return None;
        }
    };

    match SyncManifest::from_json_bytes(&bytes) {
        Ok(manifest) if manifest.config_id == *config_id => Some(manifest),
        Ok(manifest) => {
            tracing::warn!(
                %config_id,
                found = %manifest.config_id,
                "Local manifest belongs to another config, regenerating"
            );
            None
        }
        Err(error) => {
            tracing::warn!(%config_id, "Local manifest is corrupt, regenerating: {error}");
            None
        }
    }
}

/// Replace the local manifest atomically.
pub fn save_local(path: &Path, manifest: &SyncManifest) -> SyncResult<()> {
    let bytes = manifest
        .to_json_bytes()
        .map_err(|error| SyncError::ManifestPersistence(error.to_string()))?;
    write_atomically(path, &bytes).map_err(|error| {
        SyncError::ManifestPersistence(format!("{}: {error}", path.display()))
    })?;
    tracing::debug!(config_id = %manifest.config_id, items = manifest.len(), "Saved local manifest");
    Ok(())
}

/// Fetch the manifest other devices published for `config_id`.
///
/// A missing or unparsable remote manifest yields `None`; transport and auth
/// failures are errors.
pub async fn fetch_remote(
    client: &dyn WebDavClient,
    retry: &RetryPolicy,
    config_id: &SyncConfigId,
) -> SyncResult<Option<SyncManifest>> {
    let path = manifest_path(config_id);
    let target = path.as_str();
    let bytes = match retry.run("read manifest", move || client.read(target)).await {
        Ok(bytes) => bytes,
        Err(WebDavError::NotFound(_)) => {
            tracing::info!(%config_id, "No remote manifest yet");
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };

    match SyncManifest::from_json_bytes(&bytes) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(error) => {
            tracing::warn!(%config_id, "Remote manifest is corrupt, treating as absent: {error}");
            Ok(None)
        }
    }
}

/// Publish `manifest` at its remote path, creating parent collections.
pub async fn upload_remote(
    client: &dyn WebDavClient,
    retry: &RetryPolicy,
    manifest: &SyncManifest,
) -> SyncResult<()> {
    let path = manifest_path(&manifest.config_id);
    let bytes = manifest
        .to_json_bytes()
        .map_err(|error| SyncError::ManifestPersistence(error.to_string()))?;

    for dir in ancestors(&path) {
        let target = dir.as_str();
        match retry.run("mkdir", move || client.mkdir(target)).await {
            Ok(()) | Err(WebDavError::AlreadyExists(_)) => {}
            Err(error) => return Err(error.into()),
        }
    }

    let target = path.as_str();
    retry
        .run("write manifest", move || client.write(target, bytes.clone()))
        .await
        .map_err(|error| match SyncError::from(error) {
            SyncError::Remote(error) => SyncError::ManifestPersistence(error.to_string()),
            other => other,
        })?;
    tracing::debug!(config_id = %manifest.config_id, items = manifest.len(), "Uploaded remote manifest");
    Ok(())
}
