//! # Relay Telemetry
//!
//! Structured logging for every platform process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("telemetry init");
//!     // Spans and events are now collected.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `agent-relay` | Service name in log lines |
//! | `RELAY_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Write to stdout |
//! | `RELAY_JSON_LOGS` | autodetect | JSON lines (on in containers) |

mod config;

pub use config::TelemetryConfig;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter directive did not parse.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
}

/// Guard that keeps telemetry active. Drop to flush on shutdown.
pub struct TelemetryGuard {
    installed: bool,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.installed {
            tracing::info!("Shutting down telemetry");
        }
    }
}

/// Install the process-wide tracing subscriber.
///
/// Idempotent: if a subscriber is already installed (tests initialize
/// repeatedly), the existing one is kept and a no-op guard is returned.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::InvalidFilter(e.to_string()))?;

    let installed = match (config.json_logs, config.console_output) {
        (true, true) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .is_ok(),
        (true, false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::sink)
            .try_init()
            .is_ok(),
        (false, true) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
        (false, false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(
            service = %config.service_name,
            json = config.json_logs,
            "Telemetry initialized"
        );
    }
    Ok(TelemetryGuard { installed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = TelemetryConfig::default();
        let _first = init_telemetry(&config).unwrap();
        let _second = init_telemetry(&config).unwrap();
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = TelemetryConfig {
            log_level: "not a filter ===".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_telemetry(&config),
            Err(TelemetryError::InvalidFilter(_))
        ));
    }
}
