//! # Agent Relay Node
//!
//! The bus process: durable log, topic broker, schema registry, and the
//! audit history surface, wired from environment configuration.
//!
//! Business modules (credit ledger, mission scheduler, policy engine,
//! governance, distribution) run against this process through the
//! publish/subscribe/replay contracts; none of their logic lives here.

use anyhow::{Context, Result};
use relay_runtime::{register_platform_schemas, RelayConfig, RelayCore};
use relay_telemetry::{init_telemetry, TelemetryConfig};
use schema_registry::SchemaRegistry;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let _telemetry = init_telemetry(&telemetry_config).context("initializing telemetry")?;

    let config = RelayConfig::from_env().context("loading configuration")?;
    info!(
        mode = ?config.mode,
        backend = ?config.log_backend,
        log_dir = %config.log_dir.display(),
        "Starting Agent Relay"
    );

    // The registry is populated here, before any consumer exists, and is
    // read-only for the rest of the process lifetime.
    let mut registry = SchemaRegistry::new();
    register_platform_schemas(&mut registry).context("registering schema versions")?;

    let core = RelayCore::start(config, registry).context("starting relay core")?;
    if core.is_degraded() {
        warn!("Running DEGRADED: no backing store, publish/subscribe disabled");
    } else {
        info!("Relay ready");
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received, stopping");
    Ok(())
}
