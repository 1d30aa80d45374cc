//! # Runtime Configuration
//!
//! Environment-driven configuration for one bus process. The operating
//! mode decides how backing-store failures at startup are treated:
//! `required` aborts the process, `degraded` (development/CI only) keeps
//! it running with publishing and subscribing disabled.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors. Fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `RELAY_MODE` was not `required` or `degraded`.
    #[error("Invalid operating mode {0:?} (expected \"required\" or \"degraded\")")]
    InvalidMode(String),

    /// `RELAY_LOG_BACKEND` was not `memory` or `file`.
    #[error("Invalid log backend {0:?} (expected \"memory\" or \"file\")")]
    InvalidBackend(String),

    /// A numeric variable did not parse.
    #[error("Invalid value for {variable}: {value:?}")]
    InvalidNumber {
        /// Variable name.
        variable: &'static str,
        /// Offending value.
        value: String,
    },
}

/// How backing-store failures at startup are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
    /// Any backing-store connectivity failure at startup is fatal.
    #[default]
    Required,
    /// Development/CI only: absence of the backing store disables
    /// publishing and subscribing without crashing.
    Degraded,
}

impl FromStr for OperatingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "degraded" => Ok(Self::Degraded),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Which durable log adapter to wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogBackend {
    /// Durable JSON-lines file log.
    #[default]
    File,
    /// Volatile in-memory log (tests and degraded development).
    Memory,
}

impl FromStr for LogBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Operating mode.
    pub mode: OperatingMode,
    /// Durable log backend.
    pub log_backend: LogBackend,
    /// Directory for the file-backed log.
    pub log_dir: PathBuf,
    /// Per-channel broker buffer capacity.
    pub channel_capacity: usize,
    /// Dedup record retention in days.
    pub dedup_retention_days: i64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Required,
            log_backend: LogBackend::File,
            log_dir: PathBuf::from("./data/event-log"),
            channel_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            dedup_retention_days: 30,
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_MODE`: `required` (default) or `degraded`
    /// - `RELAY_LOG_BACKEND`: `file` (default) or `memory`
    /// - `RELAY_LOG_DIR`: log directory (default `./data/event-log`)
    /// - `RELAY_CHANNEL_CAPACITY`: broker buffer size (default 1000)
    /// - `RELAY_DEDUP_RETENTION_DAYS`: dedup TTL (default 30, min 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mode = match env::var("RELAY_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.mode,
        };
        let log_backend = match env::var("RELAY_LOG_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.log_backend,
        };
        let log_dir = env::var("RELAY_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let channel_capacity = match env::var("RELAY_CHANNEL_CAPACITY") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber {
                variable: "RELAY_CHANNEL_CAPACITY",
                value: raw.clone(),
            })?,
            Err(_) => defaults.channel_capacity,
        };
        let dedup_retention_days = match env::var("RELAY_DEDUP_RETENTION_DAYS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber {
                variable: "RELAY_DEDUP_RETENTION_DAYS",
                value: raw.clone(),
            })?,
            Err(_) => defaults.dedup_retention_days,
        };

        Ok(Self {
            mode,
            log_backend,
            log_dir,
            channel_capacity,
            // The audit contract promises at least 30 days of dedup history.
            dedup_retention_days: dedup_retention_days.max(30),
        })
    }
}
