//! # Shared Bus - Dual-Path Event Delivery
//!
//! Every published event takes two paths:
//!
//! ```text
//! ┌──────────────┐   publish()   ┌─────────────┐  append   ┌─────────────┐
//! │   Producer   │ ────────────▶ │  EventBus   │ ────────▶ │ Durable Log │
//! └──────────────┘               └─────────────┘           └─────────────┘
//!                                       │ fan-out (best effort)
//!                                       ▼
//!                                ┌─────────────┐ subscribe ┌─────────────┐
//!                                │ TopicBroker │ ─────────▶│  Consumers  │
//!                                └─────────────┘           └─────────────┘
//! ```
//!
//! The durable log is the system of record; the broker is low-latency
//! notification only. Nothing is entitled to be correct from the broker
//! alone: a dropped or lagged broker message is recovered by reading the
//! log.

pub mod broker;
pub mod channel;
pub mod filter;
pub mod publisher;
pub mod router;

pub use broker::{BrokerSubscription, EventStream, TopicBroker};
pub use channel::Channel;
pub use filter::EventFilter;
pub use publisher::{EventBus, EventPublisher, PublishError};
pub use router::route;

/// Maximum events buffered per broker channel before subscribers lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
