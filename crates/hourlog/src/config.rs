//! Configuration management for hourlog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::roster::Roster;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "hourlog";

/// File holding the local-only session log.
const LOCAL_FILE_NAME: &str = "sessions.json";

/// Database file for the shared backend.
const DATABASE_FILE_NAME: &str = "sessions.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `HOURLOG_`)
/// 2. TOML config file at `~/.config/hourlog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Known instructors.
    pub roster: Roster,
}

/// Which session store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// A JSON file on this machine; no change notifications.
    #[default]
    Local,
    /// A `SQLite` database that several processes may share, with live updates.
    Shared,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use.
    pub backend: Backend,
    /// Path to the local session file.
    /// Defaults to `~/.local/share/hourlog/sessions.json`
    pub local_path: Option<PathBuf>,
    /// Path to the shared database file.
    /// Defaults to `~/.local/share/hourlog/sessions.db`
    pub database_path: Option<PathBuf>,
    /// Give up on a write or clear after this many milliseconds.
    pub write_timeout_ms: u64,
    /// How often the shared backend checks for changes from other writers.
    pub poll_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            local_path: None,
            database_path: None,
            write_timeout_ms: 10_000,
            poll_interval_ms: 500,
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("HOURLOG_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.write_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "write_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.storage.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "poll_interval_ms must be greater than 0".to_string(),
            });
        }

        if let Some(message) = self.roster.problem() {
            return Err(Error::ConfigValidation { message });
        }

        Ok(())
    }

    /// Get the local session file path, resolving defaults if not set.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        self.storage
            .local_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(LOCAL_FILE_NAME))
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Path backing the configured backend.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        match self.storage.backend {
            Backend::Local => self.local_path(),
            Backend::Shared => self.database_path(),
        }
    }

    /// Get the write timeout as a Duration.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.write_timeout_ms)
    }

    /// Get the change poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.storage.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.backend, Backend::Local);
        assert_eq!(config.roster, Roster::default());
    }

    #[test]
    fn test_default_storage_config() {
        let storage = StorageConfig::default();

        assert!(storage.local_path.is_none());
        assert!(storage.database_path.is_none());
        assert_eq!(storage.write_timeout_ms, 10_000);
        assert_eq!(storage.poll_interval_ms, 500);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_write_timeout() {
        let mut config = Config::default();
        config.storage.write_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("write_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = Config::default();
        config.storage.poll_interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("poll_interval_ms"));
    }

    #[test]
    fn test_validate_duplicate_instructor() {
        let mut config = Config::default();
        config.roster = Roster::new(["Aragon", "Aragon"]);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
        assert!(err.to_string().contains("Aragon"));
    }

    #[test]
    fn test_paths_default() {
        let config = Config::default();

        assert!(config.local_path().to_string_lossy().contains("sessions.json"));
        assert!(config.database_path().to_string_lossy().contains("sessions.db"));
        assert_eq!(config.store_path(), config.local_path());
    }

    #[test]
    fn test_store_path_follows_backend() {
        let mut config = Config::default();
        config.storage.backend = Backend::Shared;
        config.storage.database_path = Some(PathBuf::from("/custom/hours.db"));

        assert_eq!(config.store_path(), PathBuf::from("/custom/hours.db"));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();

        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("hourlog"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("hourlog_config_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[storage]
backend = "shared"
write_timeout_ms = 2500

[roster]
instructors = ["Lee", "Okafor"]
restrict_to_roster = true
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.storage.backend, Backend::Shared);
        assert_eq!(config.storage.write_timeout_ms, 2500);
        assert_eq!(config.storage.poll_interval_ms, 500);
        assert!(config.roster.restrict_to_roster);
        assert!(config.roster.contains("Okafor"));
        assert!(!config.roster.contains("Aragon"));
    }

    #[test]
    fn test_backend_serialize() {
        assert_eq!(serde_json::to_string(&Backend::Shared).unwrap(), "\"shared\"");
        assert_eq!(Backend::Local.to_string(), "local");
    }

    #[test]
    fn test_storage_config_deserialize() {
        let json = r#"{"backend": "shared", "poll_interval_ms": 50}"#;
        let storage: StorageConfig = serde_json::from_str(json).unwrap();
        assert_eq!(storage.backend, Backend::Shared);
        assert_eq!(storage.poll_interval_ms, 50);
        assert_eq!(storage.write_timeout_ms, 10_000);
    }
}
