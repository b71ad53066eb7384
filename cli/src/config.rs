//! Ledger Configuration
//!
//! Handles loading and saving CLI configuration from TOML files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use census::service::ServiceConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CensusConfig {
    /// Ledger identity settings
    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Decryption gateway settings
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Runtime service settings
    #[serde(default)]
    pub service: ServiceSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl CensusConfig {
    /// Configuration for a ledger administered by `admin`
    pub fn with_admin(admin: &str) -> Self {
        Self {
            ledger: LedgerSettings {
                admin: admin.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Path of the ledger database inside `data_dir`
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage.database)
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.admin.trim().is_empty() {
            return Err(ConfigError::Invalid("Admin identity must not be empty".to_string()));
        }

        if self.gateway.security_bits < 128 {
            return Err(ConfigError::Invalid(
                "Gateway security must be at least 128 bits".to_string(),
            ));
        }

        if self.service.relay_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "Relay interval must be greater than 0".to_string(),
            ));
        }

        if self.service.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Event capacity must be greater than 0".to_string(),
            ));
        }

        if self.storage.database.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Database file name must be set".to_string()));
        }

        Ok(())
    }
}

/// Ledger identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Admin identity (64-hex or label)
    pub admin: String,

    /// Human readable ledger name
    pub name: Option<String>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            admin: "admin".to_string(),
            name: None,
        }
    }
}

/// Decryption gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Security level of the encryption parameters
    pub security_bits: u32,

    /// How long `decrypt` waits for the callback, in milliseconds
    pub reveal_timeout_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            security_bits: 128,
            reveal_timeout_ms: 5_000,
        }
    }
}

/// Runtime service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Relayer poll interval in milliseconds
    pub relay_interval_ms: u64,

    /// Event channel capacity
    pub event_capacity: usize,

    /// Evict settled decryption requests after each reveal
    pub prune_after_reveal: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            relay_interval_ms: census::config::service::RELAY_INTERVAL_MS,
            event_capacity: census::config::service::EVENT_CAPACITY,
            prune_after_reveal: false,
        }
    }
}

impl ServiceSettings {
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig {
            relay_interval: Duration::from_millis(self.relay_interval_ms),
            event_capacity: self.event_capacity,
            prune_after_reveal: self.prune_after_reveal,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file, relative to the data directory
    pub database: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("ledger.redb"),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,

    /// Output format (text, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "census", "census")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".census"))
}

/// Get default config file path
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}
