//! # Configuration
//!
//! Settings for the ledger and its database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PHARMA_DB_PATH=/data/pharmacy.db                                   │
//! │     PHARMA_STORE_NAME="City Medicals"                                  │
//! │     PHARMA_IMPORT_CHUNK_SIZE=200                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pharma-pos/pharma.toml (Linux)                           │
//! │     ~/Library/Application Support/com.pharma.pos/pharma.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! name = "City Medicals"
//!
//! [database]
//! path = "/var/lib/pharma/pharmacy.db"
//! max_connections = 5
//!
//! [ledger]
//! import_chunk_size = 100
//! restore_chunk_size = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// Store identity printed on bills and exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,
}

fn default_store_name() -> String {
    "Pharmacy".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `pharmacy.db` in the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "pharma", "pos")
        .map(|dirs| dirs.data_dir().join("pharmacy.db"))
        .unwrap_or_else(|| PathBuf::from("pharmacy.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Transaction sizing for long operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Medicines per transaction during import.
    #[serde(default = "default_import_chunk_size")]
    pub import_chunk_size: usize,

    /// Records per transaction during snapshot restore.
    #[serde(default = "default_restore_chunk_size")]
    pub restore_chunk_size: usize,
}

fn default_import_chunk_size() -> usize {
    100
}

fn default_restore_chunk_size() -> usize {
    50
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            import_chunk_size: default_import_chunk_size(),
            restore_chunk_size: default_restore_chunk_size(),
        }
    }
}

// =============================================================================
// PharmaConfig
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PharmaConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl PharmaConfig {
    /// Loads configuration: defaults, then the TOML file, then environment
    /// overrides, then validation.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("no config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.ledger.import_chunk_size == 0 || self.ledger.restore_chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk sizes must be greater than 0".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PHARMA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("PHARMA_STORE_NAME") {
            self.store.name = name;
        }

        if let Ok(size) = std::env::var("PHARMA_IMPORT_CHUNK_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => self.ledger.import_chunk_size = n,
                Err(_) => warn!(value = %size, "Ignoring invalid PHARMA_IMPORT_CHUNK_SIZE"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pharma", "pos")
            .map(|dirs| dirs.config_dir().join("pharma.toml"))
    }

    /// Database settings as a pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .import_chunk_size(self.ledger.import_chunk_size)
            .restore_chunk_size(self.ledger.restore_chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PharmaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.import_chunk_size, 100);
        assert_eq!(config.ledger.restore_chunk_size, 50);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: PharmaConfig = toml::from_str(
            r#"
            [store]
            name = "City Medicals"

            [ledger]
            restore_chunk_size = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.store.name, "City Medicals");
        assert_eq!(config.ledger.restore_chunk_size, 10);
        assert_eq!(config.ledger.import_chunk_size, 100);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_validation_rejects_zero_chunks() {
        let mut config = PharmaConfig::default();
        config.ledger.import_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_config_carries_settings() {
        let mut config = PharmaConfig::default();
        config.database.path = PathBuf::from("/tmp/pharma-test.db");
        config.ledger.restore_chunk_size = 7;

        let db = config.db_config();
        assert_eq!(db.path, PathBuf::from("/tmp/pharma-test.db"));
        assert_eq!(db.restore_chunk_size, 7);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!("pharma-{}.toml", uuid::Uuid::new_v4()));
        let mut config = PharmaConfig::default();
        config.store.name = "Night Chemist".into();
        config.save(Some(path.clone())).unwrap();

        let loaded: PharmaConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.store.name, "Night Chemist");
        let _ = std::fs::remove_file(path);
    }
}
