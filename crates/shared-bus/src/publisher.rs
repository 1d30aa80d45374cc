//! # Publish Path
//!
//! `EventBus` pairs the durable log with the topic broker: append first
//! (system of record, errors surface to the caller), then best-effort
//! fan-out. Publish failures are a side-channel concern for callers:
//! the expected policy is log-and-continue, not aborting the business
//! transaction that produced the event.

use crate::broker::{BrokerSubscription, TopicBroker};
use crate::channel::Channel;
use crate::router::route;
use async_trait::async_trait;
use event_log::{EventLog, LogError};
use shared_types::Event;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Errors from the publish path.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The durable log rejected the append; the event was not accepted.
    #[error("Durable log append failed: {0}")]
    Log(#[from] LogError),

    /// The runtime is in degraded mode with no backing store wired.
    #[error("Publishing disabled: runtime is in degraded mode")]
    Degraded,
}

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event: durable append, then broker fan-out.
    ///
    /// Returns the assigned log offset. A fresh event id is assigned per
    /// attempt, so retried publishes are distinguishable in the audit
    /// trail.
    async fn publish(&self, event: Event) -> Result<u64, PublishError>;
}

/// The dual-path event bus.
pub struct EventBus {
    log: Arc<dyn EventLog>,
    broker: TopicBroker,
    events_published: AtomicU64,
    append_failures: AtomicU64,
    broker_deliveries: AtomicU64,
}

impl EventBus {
    /// Create a bus over the given durable log.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self::with_broker(log, TopicBroker::new())
    }

    /// Create a bus with a pre-configured broker.
    #[must_use]
    pub fn with_broker(log: Arc<dyn EventLog>, broker: TopicBroker) -> Self {
        Self {
            log,
            broker,
            events_published: AtomicU64::new(0),
            append_failures: AtomicU64::new(0),
            broker_deliveries: AtomicU64::new(0),
        }
    }

    /// The broker, for direct channel subscriptions.
    #[must_use]
    pub fn broker(&self) -> &TopicBroker {
        &self.broker
    }

    /// The durable log backing this bus.
    #[must_use]
    pub fn log(&self) -> Arc<dyn EventLog> {
        Arc::clone(&self.log)
    }

    /// Subscribe to a broker channel.
    #[must_use]
    pub fn subscribe(&self, channel: &Channel) -> BrokerSubscription {
        self.broker.subscribe(channel)
    }

    /// Total successful publishes.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Total appends rejected by the log.
    #[must_use]
    pub fn append_failures(&self) -> u64 {
        self.append_failures.load(Ordering::Relaxed)
    }

    /// Total broker receiver deliveries.
    #[must_use]
    pub fn broker_deliveries(&self) -> u64 {
        self.broker_deliveries.load(Ordering::Relaxed)
    }

    /// Fire-and-forget publish as an explicit task.
    ///
    /// The returned channel resolves with the publish result; the caller
    /// may await it or drop it. Errors are traced here as well, so
    /// dropping the channel never hides a failure.
    pub fn publish_detached(
        self: &Arc<Self>,
        event: Event,
    ) -> oneshot::Receiver<Result<u64, PublishError>> {
        let (tx, rx) = oneshot::channel();
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            let kind = event.kind;
            let result = bus.publish(event).await;
            if let Err(e) = &result {
                warn!(kind = %kind, error = %e, "Detached publish failed");
            }
            // Receiver may be gone; the trace above already recorded failures.
            let _ = tx.send(result);
        });
        rx
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, mut event: Event) -> Result<u64, PublishError> {
        // New attempt, new id; the offset is the stable identity.
        event.regenerate_id();

        let channel = route(&event);
        let offset = match self.log.append(event.clone()).await {
            Ok(offset) => offset,
            Err(e) => {
                self.append_failures.fetch_add(1, Ordering::Relaxed);
                warn!(kind = %event.kind, error = %e, "Durable append failed, event not accepted");
                return Err(e.into());
            }
        };
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let receivers = self.broker.publish(&channel, event.clone());
        self.broker_deliveries
            .fetch_add(receivers as u64, Ordering::Relaxed);

        debug!(
            kind = %event.kind,
            offset,
            channel = %channel,
            receivers,
            "Event published"
        );
        Ok(offset)
    }
}
