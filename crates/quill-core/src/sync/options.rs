//! Engine-wide settings.

use std::path::{Path, PathBuf};

use crate::models::SyncConfigId;
use crate::webdav::RetryPolicy;

/// Default number of failed items tolerated before a run fails
pub const DEFAULT_MAX_FAILED_ITEMS: usize = 10;

/// Where the engine keeps local state and how hard it retries
#[derive(Debug, Clone)]
pub struct EngineOptions {
    data_dir: PathBuf,
    attachments_dir: Option<PathBuf>,
    retry: RetryPolicy,
    max_failed_items: usize,
}

impl EngineOptions {
    /// Options rooted at `data_dir` with default retry and threshold
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            attachments_dir: None,
            retry: RetryPolicy::default(),
            max_failed_items: DEFAULT_MAX_FAILED_ITEMS,
        }
    }

    /// Override the attachment directory (defaults to `{data_dir}/attachments`)
    #[must_use]
    pub fn with_attachments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachments_dir = Some(dir.into());
        self
    }

    /// Override the retry policy for remote operations
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the failed-item threshold
    #[must_use]
    pub const fn with_max_failed_items(mut self, max: usize) -> Self {
        self.max_failed_items = max;
        self
    }

    /// Root data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding attachment bytes
    pub fn attachments_dir(&self) -> PathBuf {
        self.attachments_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("attachments"))
    }

    /// Retry policy for remote operations
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Failed items tolerated in one run
    pub const fn max_failed_items(&self) -> usize {
        self.max_failed_items
    }

    /// Local manifest file for a config
    pub fn manifest_file(&self, config_id: &SyncConfigId) -> PathBuf {
        self.data_dir
            .join("sync")
            .join(format!("{config_id}_manifest.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_data_dir() {
        let options = EngineOptions::new("/data");
        let id = SyncConfigId::new();

        assert_eq!(options.attachments_dir(), PathBuf::from("/data/attachments"));
        assert_eq!(
            options.manifest_file(&id),
            PathBuf::from(format!("/data/sync/{id}_manifest.json"))
        );
        assert_eq!(options.max_failed_items(), DEFAULT_MAX_FAILED_ITEMS);
    }

    #[test]
    fn builders_override_defaults() {
        let options = EngineOptions::new("/data")
            .with_attachments_dir("/media")
            .with_retry(RetryPolicy::no_retry())
            .with_max_failed_items(2);

        assert_eq!(options.attachments_dir(), PathBuf::from("/media"));
        assert_eq!(options.retry().max_attempts, 1);
        assert_eq!(options.max_failed_items(), 2);
    }
}
