//! Configuration module
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! ```yaml
//! server:
//!   address: "0.0.0.0:8080"
//! authentication:
//!   providers:
//!     jwt:
//!       authorizer:
//!         secret: ${JWT_SECRET}
//!         algorithm: HS256
//! logging:
//!   level: info
//!   json: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Prefix joining a provider name to its module ID
pub const PROVIDER_MODULE_PREFIX: &str = "http.authentication.providers.";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub authentication: AuthenticationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if self.authentication.providers.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one authentication provider must be configured".into(),
            ));
        }

        for name in self.authentication.providers.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Authentication provider name cannot be empty".into(),
                ));
            }
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}': must be one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

impl ServerConfig {
    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address.parse().map_err(|e| {
            ConfigError::ValidationError(format!("Invalid address '{}': {}", self.address, e))
        })
    }
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Authentication providers, keyed by provider name
///
/// Provider `jwt` resolves to module `http.authentication.providers.jwt`.
/// The value is handed to the module untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    #[serde(default)]
    pub providers: BTreeMap<String, serde_json::Value>,
}

impl AuthenticationConfig {
    /// Providers as (module ID, raw config) pairs
    pub fn modules(&self) -> impl Iterator<Item = (String, &serde_json::Value)> + '_ {
        self.providers
            .iter()
            .map(|(name, raw)| (format!("{}{}", PROVIDER_MODULE_PREFIX, name), raw))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_log_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}
