//! Configuration for a scan station.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::state::PermissionStatus;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default verification service
pub const DEFAULT_BASE_URL: &str = "https://lavial.icu";

/// Default verification route
pub const DEFAULT_VERIFY_PATH: &str = "/verify-ticket";

/// Invalid configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but its value can't be used
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
        /// What was expected
        reason: &'static str,
    },

    /// The HTTP client could not be built from the configuration
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Station configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Verification service
    pub verification: VerificationConfig,
    /// Scan screen behaviour
    pub station: StationConfig,
    /// Operator access
    pub access: AccessConfig,
}

/// Verification service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Base URL of the service, without trailing slash
    pub base_url: String,
    /// Route of the verification call
    pub verify_path: String,
    /// Request timeout in seconds (`None`: transport default)
    pub timeout_secs: Option<u64>,
}

impl VerificationConfig {
    /// Full URL of the verification call
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.verify_path.trim_start_matches('/')
        )
    }

    /// Request timeout, if one is configured
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            verify_path: DEFAULT_VERIFY_PATH.to_string(),
            timeout_secs: None,
        }
    }
}

/// Scan screen configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Answer given to the camera permission prompt
    pub camera_permission: PermissionStatus,
    /// Show a distinct message per failure kind instead of one shared message
    pub distinguish_failures: bool,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

/// Crates whose logs the station shows by default
const LOG_TARGETS: [&str; 3] = ["scan_station", "ticket_scan", "ticket_scan_runtime"];

impl StationConfig {
    /// Default `tracing` filter: `log_level` for the station binary and
    /// the session crates, nothing from dependencies.
    #[must_use]
    pub fn log_filter(&self) -> String {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={}", self.log_level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            camera_permission: PermissionStatus::Granted,
            distinguish_failures: false,
            log_level: "info".to_string(),
        }
    }
}

/// Operator access configuration
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// PIN protecting the station (`None`: open access)
    #[serde(skip_serializing)]
    pub station_pin: Option<String>,
    /// PIN entered by the operator
    #[serde(skip_serializing)]
    pub operator_pin: Option<String>,
}

impl std::fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessConfig")
            .field("station_pin", &self.station_pin.as_ref().map(|_| "<redacted>"))
            .field("operator_pin", &self.operator_pin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    ///
    /// Unset and empty values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is set but unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let verification = VerificationConfig {
            base_url: get("SCAN_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            verify_path: get("SCAN_VERIFY_PATH")
                .unwrap_or_else(|| DEFAULT_VERIFY_PATH.to_string()),
            timeout_secs: get("SCAN_HTTP_TIMEOUT_SECS")
                .map(|value| {
                    value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                        key: "SCAN_HTTP_TIMEOUT_SECS",
                        value,
                        reason: "expected a whole number of seconds",
                    })
                })
                .transpose()?,
        };

        let station = StationConfig {
            camera_permission: get("SCAN_CAMERA_PERMISSION")
                .map(|value| {
                    value.parse().map_err(|_| ConfigError::Invalid {
                        key: "SCAN_CAMERA_PERMISSION",
                        value,
                        reason: "expected granted or denied",
                    })
                })
                .transpose()?
                .unwrap_or(PermissionStatus::Granted),
            distinguish_failures: get("SCAN_DISTINGUISH_FAILURES")
                .map(|value| parse_flag("SCAN_DISTINGUISH_FAILURES", value))
                .transpose()?
                .unwrap_or(false),
            log_level: get("SCAN_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let access = AccessConfig {
            station_pin: get("SCAN_STATION_PIN"),
            operator_pin: lookup("SCAN_OPERATOR_PIN"),
        };

        Ok(Self {
            verification,
            station,
            access,
        })
    }
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false",
        }),
    }
}
