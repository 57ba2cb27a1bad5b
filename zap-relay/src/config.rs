//! Configuration loading for zap-relay.
//!
//! Configuration is loaded from a TOML file (default: `zapsters.toml`).
//! The `[relay]` section only seeds the settings store at startup; the
//! live values stay in the database so they can be changed while the
//! relay is running (see [`crate::settings`]).

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for zap-relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Seed values for the relay settings store.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Reporting device configuration.
    pub device: DeviceConfig,
    /// Outbound client configuration.
    pub forward: ForwardConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP server (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Bearer token required for the admin dump/summary endpoints.
    /// When unset, those endpoints reject every request.
    pub admin_token: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Seed values applied to the settings store at startup.
///
/// Keys left out of the config file are not touched, so values set at
/// runtime survive restarts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    /// Primary destination URL; its response is returned to the device.
    pub primary_url: Option<String>,
    /// Best-effort destination URL; its response is only recorded.
    pub besteffort_url: Option<String>,
    /// Station id required on inbound reports; unset disables the check.
    pub required_station_id: Option<String>,
    /// Relay leg used by the mail endpoint: "none", "primary" or "besteffort".
    pub mail_relay: Option<String>,
}

/// Reporting device configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// IANA timezone the devices report event times in (default: America/Denver).
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Form field carrying the station id (default: StationId).
    #[serde(default = "default_station_field")]
    pub station_field: String,
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    /// Per-request timeout for relay legs, in seconds (default: 30).
    #[serde(default = "default_forward_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("zapsters.db")
}

fn default_timezone() -> String {
    "America/Denver".to_string()
}

fn default_station_field() -> String {
    "StationId".to_string()
}

fn default_forward_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: default_bind_address(),
                admin_token: None,
            },
            storage: StorageConfig {
                database: default_database_path(),
            },
            relay: RelayConfig::default(),
            device: DeviceConfig {
                timezone: default_timezone(),
                station_field: default_station_field(),
            },
            forward: ForwardConfig {
                timeout_secs: default_forward_timeout_secs(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// device timezone is not a known IANA name.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Fail at startup rather than on the first report.
        config.device.timezone()?;
        Ok(config)
    }
}

impl DeviceConfig {
    /// Parse the configured timezone name.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone {
                name: self.timezone.clone(),
            })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Device timezone is not a known IANA name.
    #[error("unknown device timezone: {name}")]
    UnknownTimezone {
        /// The unrecognized timezone name.
        name: String,
    },
}
