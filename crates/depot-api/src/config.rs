//! # Depot Configuration
//!
//! ## Load Order (later overrides earlier)
//! 1. Defaults (this file)
//! 2. Config file (`depot.toml`)
//! 3. Environment variables (`DEPOT_*`)
//!
//! ## Example `depot.toml`
//! ```toml
//! [database]
//! path = "/var/lib/depot/depot.db"
//! max_connections = 8
//! busy_timeout_ms = 5000
//!
//! [transfers]
//! number_prefix = "TRF"
//!
//! [pagination]
//! default_page_size = 50
//! max_page_size = 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use depot_core::{DEFAULT_PAGE_SIZE, DEFAULT_TRANSFER_PREFIX, MAX_PAGE_SIZE};
use depot_db::DbConfig;

/// Database path that selects an in-memory store.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Could not determine a data directory for the database")]
    NoDataDirectory,
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepotConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub transfers: TransferSettings,

    #[serde(default)]
    pub pagination: PaginationSettings,
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file. `None` means the platform data directory.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: 5,
            busy_timeout_ms: 5_000,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Prefix of human-readable transfer numbers (`TRF-20260131-0001`).
    pub number_prefix: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        TransferSettings {
            number_prefix: DEFAULT_TRANSFER_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        PaginationSettings {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl DepotConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// A missing config file is not an error; an unreadable or malformed one is.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => {
                info!(?path, "Loading depot config from file");
                Self::from_file(&path)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `DEPOT_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("DEPOT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("DEPOT_MAX_CONNECTIONS") {
            match value.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %value, "Ignoring invalid DEPOT_MAX_CONNECTIONS"),
            }
        }

        if let Some(prefix) = lookup("DEPOT_TRANSFER_PREFIX") {
            debug!(prefix = %prefix, "Overriding transfer prefix from environment");
            self.transfers.number_prefix = prefix;
        }

        if let Some(value) = lookup("DEPOT_PAGE_SIZE") {
            match value.parse::<u32>() {
                Ok(n) => self.pagination.default_page_size = n,
                Err(_) => warn!(value = %value, "Ignoring invalid DEPOT_PAGE_SIZE"),
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be at least 1"));
        }

        let prefix = &self.transfers.number_prefix;
        if prefix.is_empty()
            || prefix.len() > 8
            || !prefix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(ConfigError::invalid(
                "transfers.number_prefix",
                "must be 1-8 uppercase letters or digits",
            ));
        }

        let pages = &self.pagination;
        if pages.max_page_size == 0 || pages.max_page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::invalid(
                "pagination.max_page_size",
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        if pages.default_page_size == 0 || pages.default_page_size > pages.max_page_size {
            return Err(ConfigError::invalid(
                "pagination.default_page_size",
                "must be between 1 and max_page_size",
            ));
        }

        Ok(())
    }

    /// Resolves the database file, creating the data directory if needed.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = project_dirs().ok_or(ConfigError::NoDataDirectory)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::Read {
            path: data_dir.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(data_dir.join("depot.db"))
    }

    /// Builds the pool configuration.
    pub fn to_db_config(&self) -> Result<DbConfig, ConfigError> {
        let path = self.database_path()?;

        let config = if path.as_os_str() == IN_MEMORY_PATH {
            DbConfig::in_memory()
        } else {
            DbConfig::new(path)
                .max_connections(self.database.max_connections)
                .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
        };

        Ok(config
            .run_migrations(self.database.run_migrations)
            .transfer_prefix(self.transfers.number_prefix.clone()))
    }

    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("depot.toml"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "depot", "depot")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = DepotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transfers.number_prefix, "TRF");
        assert_eq!(config.pagination.default_page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DepotConfig::from_toml_str(
            r#"
            [transfers]
            number_prefix = "XFER"
            "#,
        )
        .unwrap();

        assert_eq!(config.transfers.number_prefix, "XFER");
        assert_eq!(config.database, DatabaseSettings::default());
        assert_eq!(config.pagination.max_page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = DepotConfig::from_toml_str("[database]\nmax_connections = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = DepotConfig::from_toml_str("[database]\nmax_connections = 2").unwrap();
        let env: HashMap<&str, &str> = [
            ("DEPOT_DB_PATH", ":memory:"),
            ("DEPOT_MAX_CONNECTIONS", "9"),
            ("DEPOT_TRANSFER_PREFIX", "MV"),
            ("DEPOT_PAGE_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, Some(PathBuf::from(":memory:")));
        assert_eq!(config.database.max_connections, 9);
        assert_eq!(config.transfers.number_prefix, "MV");
        assert_eq!(config.pagination.default_page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_validation_rules() {
        let mut config = DepotConfig::default();
        config.transfers.number_prefix = "trf".to_string();
        assert!(config.validate().is_err());

        let mut config = DepotConfig::default();
        config.pagination.default_page_size = config.pagination.max_page_size + 1;
        assert!(config.validate().is_err());

        let mut config = DepotConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_in_memory_db_config() {
        let mut config = DepotConfig::default();
        config.database.path = Some(PathBuf::from(IN_MEMORY_PATH));
        config.transfers.number_prefix = "MV".to_string();

        let db_config = config.to_db_config().unwrap();
        assert!(db_config.is_in_memory());
        assert_eq!(db_config.max_connections, 1);
        assert_eq!(db_config.transfer_prefix, "MV");
    }
}
