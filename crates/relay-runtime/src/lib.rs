//! # Agent Relay Runtime
//!
//! Wires the event bus substrate into one process: configuration,
//! backing store, schema registry, subscription management, and the
//! graceful shutdown path.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (`relay-telemetry`)
//! 2. Load configuration from the environment (`RelayConfig::from_env`)
//! 3. Register schema versions (`register_platform_schemas`)
//! 4. Start the core (`RelayCore::start`), which opens the backing store;
//!    fatal in `required` mode, loud-but-alive in `degraded` mode
//! 5. Subscribe consumers (`RelayCore::subscribe`)
//! 6. Wait for the shutdown signal; consumers stop between messages

pub mod config;
pub mod core;
pub mod schemas;

pub use config::{ConfigError, LogBackend, OperatingMode, RelayConfig};
pub use core::{RelayCore, RelaySubscription, RuntimeError, SubscriptionSelector};
pub use schemas::register_platform_schemas;
