//! Timeouts and retry counts for every message exchange, loaded from
//! `communication.toml`.

use crate::error::config::ConfigError;

use models::ErrorLocation;

use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "communication.toml";
const CONFIG_VERSION: u32 = 1;

const DEFAULT_WAIT_FOR_RESPONSE_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_MAX_RETRIES: u32 = 3;

// ============================================
// CONFIG STRUCTS
// ============================================

/// Settings for one kind of request/response exchange.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExchangeConfig {
    #[serde(default = "default_wait_for_response_timeout_ms")]
    pub wait_for_response_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl ExchangeConfig {
    pub const fn new(wait_for_response_timeout_ms: u64, max_retries: u32) -> Self {
        Self {
            wait_for_response_timeout_ms,
            max_retries,
        }
    }

    pub fn wait_for_response_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_for_response_timeout_ms)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_FOR_RESPONSE_TIMEOUT_MS, DEFAULT_MAX_RETRIES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunicationConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Endpoint connect and disconnect.
    #[serde(default)]
    pub protocol: ExchangeConfig,

    /// Interaction information exchange.
    #[serde(default)]
    pub handshake: ExchangeConfig,

    #[serde(default)]
    pub commands: ExchangeConfig,

    #[serde(default)]
    pub notifications: ExchangeConfig,
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            protocol: ExchangeConfig::default(),
            handshake: ExchangeConfig::default(),
            commands: ExchangeConfig::default(),
            notifications: ExchangeConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_wait_for_response_timeout_ms() -> u64 {
    DEFAULT_WAIT_FOR_RESPONSE_TIMEOUT_MS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

// ============================================
// IMPLEMENTATION
// ============================================

impl CommunicationConfig {
    /// Load config from {config_dir}/communication.toml.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CommunicationConfig)` if loaded successfully or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is corrupted or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Communication config not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read communication config: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: CommunicationConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse communication config TOML: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Communication config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        for (section, exchange) in [
            ("protocol", &self.protocol),
            ("handshake", &self.handshake),
            ("commands", &self.commands),
            ("notifications", &self.notifications),
        ] {
            if exchange.wait_for_response_timeout_ms == 0 {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("[{section}] wait_for_response_timeout_ms must be greater than 0"),
                });
            }
        }

        Ok(())
    }
}
