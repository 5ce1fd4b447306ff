//! Persistent CLI settings.

use std::path::{Path, PathBuf};

use quill_core::webdav::RetryPolicy;
use quill_core::EngineOptions;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const DATA_DIR_ENV: &str = "QUILL_DATA_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliSettings {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    #[serde(default)]
    pub max_failed_items: Option<usize>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("quill")
        .join(CONFIG_FILE_NAME)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("quill")
}

impl CliSettings {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut settings = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        settings.normalize();
        Ok(settings)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// `--data-dir`, then `QUILL_DATA_DIR`, then the settings file, then the platform default
    pub fn resolve_data_dir(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(default_data_dir)
    }

    pub fn engine_options(&self, data_dir: &Path) -> EngineOptions {
        let mut options = EngineOptions::new(data_dir);
        if let Some(attempts) = self.retry_attempts {
            options = options.with_retry(RetryPolicy::new(attempts));
        }
        if let Some(max) = self.max_failed_items {
            options = options.with_max_failed_items(max);
        }
        options
    }

    fn normalize(&mut self) {
        self.data_dir = self
            .data_dir
            .take()
            .filter(|path| !path.as_os_str().is_empty());
        self.retry_attempts = self.retry_attempts.map(|attempts| attempts.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_roundtrip_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let settings = CliSettings {
            version: 1,
            data_dir: Some(PathBuf::new()),
            retry_attempts: Some(0),
            max_failed_items: Some(4),
        };
        settings.save_to_path(&path).unwrap();

        let loaded = CliSettings::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, None);
        assert_eq!(loaded.retry_attempts, Some(1));
        assert_eq!(loaded.max_failed_items, Some(4));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliSettings::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliSettings::default());
    }

    #[test]
    fn explicit_data_dir_wins() {
        let settings = CliSettings {
            data_dir: Some(PathBuf::from("/from/settings")),
            ..CliSettings::default()
        };
        assert_eq!(
            settings.resolve_data_dir(Some(PathBuf::from("/from/flag"))),
            PathBuf::from("/from/flag")
        );
    }

    #[test]
    fn engine_options_apply_overrides() {
        let settings = CliSettings {
            retry_attempts: Some(5),
            max_failed_items: Some(2),
            ..CliSettings::default()
        };
        let options = settings.engine_options(Path::new("/data"));
        assert_eq!(options.retry().max_attempts, 5);
        assert_eq!(options.max_failed_items(), 2);
        assert_eq!(options.data_dir(), Path::new("/data"));
    }
}
