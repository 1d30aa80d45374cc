//! # Runtime Wiring
//!
//! `RelayCore` owns the constructed pieces (registry, log, bus, dedup
//! store) and enforces the process-wide rules: one active subscription
//! loop per (subscriber, channel), schema registry frozen before the
//! first consumer starts, and degraded-mode behavior when the backing
//! store is absent.

use crate::config::{ConfigError, LogBackend, OperatingMode, RelayConfig};
use chrono::Duration as ChronoDuration;
use event_consumer::{
    Consumer, ConsumerHandle, ConsumerState, DedupStore, HandlerSet, InMemoryDedupStore,
};
use event_log::{
    EventLog, FileEventLog, HistoryPage, HistoryQuery, InMemoryEventLog, LogError,
};
use event_replay::ReplayEngine;
use parking_lot::Mutex;
use schema_registry::{MigrationAnalyzer, SchemaRegistry};
use shared_bus::{Channel, EventBus, EventFilter, EventPublisher, PublishError, TopicBroker};
use shared_types::{Event, EventKind, Namespace};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Runtime-level errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The backing store could not be opened in `required` mode.
    #[error("Backing store unavailable: {0}")]
    Store(#[from] LogError),

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A second loop was requested for an already-active pair.
    #[error("Subscription already active for ({subscriber}, {channel})")]
    DuplicateSubscription {
        /// Subscriber name.
        subscriber: String,
        /// Channel name.
        channel: String,
    },

    /// The runtime is degraded and the operation needs the store.
    #[error("Runtime is degraded; {operation} is disabled")]
    Degraded {
        /// The refused operation.
        operation: &'static str,
    },

    /// A kind-set subscription mixed namespaces.
    #[error("Kind set spans multiple namespaces; subscribe once per namespace")]
    MixedNamespaces,

    /// A kind-set subscription was empty.
    #[error("Kind set is empty")]
    EmptyKindSet,
}

/// What a subscriber wants delivered.
#[derive(Debug, Clone)]
pub enum SubscriptionSelector {
    /// Platform-wide broadcast announcements.
    Broadcast,
    /// Every kind in one namespace.
    Namespace(Namespace),
    /// An explicit kind set. Must share one namespace: one loop per
    /// channel.
    Kinds(Vec<EventKind>),
    /// Events addressed to one target.
    Direct(String),
}

impl SubscriptionSelector {
    fn channel_and_filter(&self) -> Result<(Channel, EventFilter), RuntimeError> {
        match self {
            Self::Broadcast => Ok((
                Channel::Broadcast,
                EventFilter::kinds(vec![EventKind::SystemBroadcast]),
            )),
            Self::Namespace(namespace) => Ok((
                Channel::Namespace(*namespace),
                EventFilter::namespace(*namespace),
            )),
            Self::Kinds(kinds) => {
                let mut namespaces: Vec<Namespace> =
                    kinds.iter().map(|kind| kind.namespace()).collect();
                namespaces.sort_by_key(Namespace::as_str);
                namespaces.dedup();
                match namespaces.as_slice() {
                    [] => Err(RuntimeError::EmptyKindSet),
                    [namespace] => Ok((
                        Channel::Namespace(*namespace),
                        EventFilter::kinds(kinds.clone()),
                    )),
                    _ => Err(RuntimeError::MixedNamespaces),
                }
            }
            Self::Direct(target) => Ok((
                Channel::direct(target.clone()),
                EventFilter::target(target.clone()),
            )),
        }
    }
}

/// The wired bus process.
pub struct RelayCore {
    config: RelayConfig,
    registry: Arc<SchemaRegistry>,
    dedup: Arc<InMemoryDedupStore>,
    // None only in degraded mode with the store absent.
    bus: Option<Arc<EventBus>>,
    active: Arc<Mutex<HashSet<(String, String)>>>,
}

impl RelayCore {
    /// Start the runtime: open the backing store and freeze the registry.
    ///
    /// The registry is taken by value: registration is over once the
    /// core starts, and every component sees the same `Arc` handle.
    pub fn start(config: RelayConfig, registry: SchemaRegistry) -> Result<Self, RuntimeError> {
        let log: Option<Arc<dyn EventLog>> = match config.log_backend {
            LogBackend::Memory => Some(Arc::new(InMemoryEventLog::new())),
            LogBackend::File => match FileEventLog::open(&config.log_dir) {
                Ok(log) => Some(Arc::new(log)),
                Err(e) => match config.mode {
                    OperatingMode::Required => {
                        error!(error = %e, dir = %config.log_dir.display(), "Backing store unavailable, aborting");
                        return Err(e.into());
                    }
                    OperatingMode::Degraded => {
                        warn!(
                            error = %e,
                            dir = %config.log_dir.display(),
                            "DEGRADED MODE: backing store unavailable; publishing and subscribing are DISABLED"
                        );
                        None
                    }
                },
            },
        };

        let bus = log.map(|log| {
            Arc::new(EventBus::with_broker(
                log,
                TopicBroker::with_capacity(config.channel_capacity),
            ))
        });
        let dedup = Arc::new(InMemoryDedupStore::with_retention(ChronoDuration::days(
            config.dedup_retention_days,
        )));

        info!(
            mode = ?config.mode,
            backend = ?config.log_backend,
            degraded = bus.is_none(),
            "Relay core started"
        );
        Ok(Self {
            config,
            registry: Arc::new(registry),
            dedup,
            bus,
            active: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Whether the runtime is running without a backing store.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.bus.is_none()
    }

    /// The frozen schema registry handle.
    #[must_use]
    pub fn registry(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.registry)
    }

    /// The runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The event bus, when the store is wired.
    #[must_use]
    pub fn bus(&self) -> Option<Arc<EventBus>> {
        self.bus.clone()
    }

    /// Publish an event (durable append + broker fan-out).
    pub async fn publish(&self, event: Event) -> Result<u64, PublishError> {
        match &self.bus {
            Some(bus) => bus.publish(event).await,
            None => {
                warn!("Publish refused: runtime is degraded");
                Err(PublishError::Degraded)
            }
        }
    }

    /// Fire-and-forget publish with a completion channel.
    pub fn publish_detached(
        &self,
        event: Event,
    ) -> oneshot::Receiver<Result<u64, PublishError>> {
        match &self.bus {
            Some(bus) => bus.publish_detached(event),
            None => {
                warn!("Detached publish refused: runtime is degraded");
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(Err(PublishError::Degraded));
                rx
            }
        }
    }

    /// Audit history query. In degraded mode the audit surface degrades
    /// to an empty page instead of failing.
    pub async fn history(&self, query: HistoryQuery) -> Result<HistoryPage, LogError> {
        match &self.bus {
            Some(bus) => bus.log().history(query).await,
            None => {
                warn!("History query in degraded mode, returning empty page");
                Ok(HistoryPage::default())
            }
        }
    }

    /// Start a subscription loop for `subscriber`.
    ///
    /// Exactly one loop may be active per (subscriber, channel); a second
    /// request is refused until the first subscription is dropped.
    pub fn subscribe(
        &self,
        subscriber: &str,
        selector: SubscriptionSelector,
        handlers: HandlerSet,
    ) -> Result<RelaySubscription, RuntimeError> {
        let bus = self.bus.as_ref().ok_or(RuntimeError::Degraded {
            operation: "subscribing",
        })?;
        let (channel, filter) = selector.channel_and_filter()?;

        let key = (subscriber.to_string(), channel.name());
        {
            let mut active = self.active.lock();
            if !active.insert(key.clone()) {
                return Err(RuntimeError::DuplicateSubscription {
                    subscriber: key.0,
                    channel: key.1,
                });
            }
        }

        let consumer = Consumer::new(
            subscriber,
            Arc::clone(&self.registry),
            Arc::clone(&self.dedup) as Arc<dyn DedupStore>,
            Arc::new(handlers),
            filter,
        );
        let handle = consumer.spawn(bus.subscribe(&channel), bus.log(), 0);

        info!(subscriber, channel = %channel, "Subscription registered");
        Ok(RelaySubscription {
            handle: Some(handle),
            key,
            active: Arc::clone(&self.active),
        })
    }

    /// A replay engine over this runtime's log and registry.
    pub fn replay_engine(&self, handlers: HandlerSet) -> Result<ReplayEngine, RuntimeError> {
        let bus = self.bus.as_ref().ok_or(RuntimeError::Degraded {
            operation: "replay",
        })?;
        Ok(ReplayEngine::new(
            bus.log(),
            Arc::clone(&self.registry),
            Arc::new(handlers),
        ))
    }

    /// A migration analyzer over this runtime's log and registry.
    pub fn migration_analyzer(&self) -> Result<MigrationAnalyzer, RuntimeError> {
        let bus = self.bus.as_ref().ok_or(RuntimeError::Degraded {
            operation: "migration analysis",
        })?;
        Ok(MigrationAnalyzer::new(
            Arc::clone(&self.registry),
            bus.log(),
        ))
    }
}

/// A registered subscription. Dropping it stops the loop and frees the
/// (subscriber, channel) slot for a successor.
pub struct RelaySubscription {
    handle: Option<ConsumerHandle>,
    key: (String, String),
    active: Arc<Mutex<HashSet<(String, String)>>>,
}

impl RelaySubscription {
    /// Signal the loop to stop after the in-flight record completes.
    pub fn stop(&self) {
        if let Some(handle) = &self.handle {
            handle.stop();
        }
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown().await;
        }
    }

    /// The loop's next read offset, if the loop is still owned.
    #[must_use]
    pub fn cursor(&self) -> Option<u64> {
        self.handle.as_ref().map(ConsumerHandle::cursor)
    }

    /// The loop's current state, if the loop is still owned.
    #[must_use]
    pub fn state(&self) -> Option<ConsumerState> {
        self.handle.as_ref().map(ConsumerHandle::state)
    }
}

impl Drop for RelaySubscription {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::register_platform_schemas;
    use shared_types::Payload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn memory_config() -> RelayConfig {
        RelayConfig {
            log_backend: LogBackend::Memory,
            ..Default::default()
        }
    }

    fn started_core() -> RelayCore {
        let mut registry = SchemaRegistry::new();
        register_platform_schemas(&mut registry).unwrap();
        RelayCore::start(memory_config(), registry).unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_history() {
        let core = started_core();
        let offset = core
            .publish(Event::new(
                EventKind::PolicyUpdated,
                "policy-engine",
                Payload::new(),
            ))
            .await
            .unwrap();
        assert_eq!(offset, 0);

        let page = core.history(HistoryQuery::default()).await.unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_subscription_refused_until_dropped() {
        let core = started_core();

        let sub = core
            .subscribe(
                "credit-projector",
                SubscriptionSelector::Namespace(Namespace::Credit),
                HandlerSet::new(),
            )
            .unwrap();

        let second = core.subscribe(
            "credit-projector",
            SubscriptionSelector::Namespace(Namespace::Credit),
            HandlerSet::new(),
        );
        assert!(matches!(
            second,
            Err(RuntimeError::DuplicateSubscription { .. })
        ));

        // A different subscriber on the same channel is fine.
        let other = core.subscribe(
            "audit-tail",
            SubscriptionSelector::Namespace(Namespace::Credit),
            HandlerSet::new(),
        );
        assert!(other.is_ok());

        sub.shutdown().await;
        let replacement = core.subscribe(
            "credit-projector",
            SubscriptionSelector::Namespace(Namespace::Credit),
            HandlerSet::new(),
        );
        assert!(replacement.is_ok());
    }

    #[tokio::test]
    async fn test_mixed_namespace_kind_set_refused() {
        let core = started_core();
        let result = core.subscribe(
            "mixed",
            SubscriptionSelector::Kinds(vec![
                EventKind::CreditConsumed,
                EventKind::MissionCreated,
            ]),
            HandlerSet::new(),
        );
        assert!(matches!(result, Err(RuntimeError::MixedNamespaces)));
    }

    #[tokio::test]
    async fn test_degraded_mode_refuses_but_does_not_crash() {
        let dir = tempfile::tempdir().unwrap();
        // Hold the log lock so the core cannot open the store.
        let _occupant = FileEventLog::open(dir.path()).unwrap();

        let config = RelayConfig {
            mode: OperatingMode::Degraded,
            log_backend: LogBackend::File,
            log_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let core = RelayCore::start(config, SchemaRegistry::new()).unwrap();
        assert!(core.is_degraded());

        let publish = core
            .publish(Event::new(
                EventKind::SystemBroadcast,
                "runtime",
                Payload::new(),
            ))
            .await;
        assert!(matches!(publish, Err(PublishError::Degraded)));

        let detached = core.publish_detached(Event::new(
            EventKind::SystemBroadcast,
            "runtime",
            Payload::new(),
        ));
        assert!(matches!(detached.await, Ok(Err(PublishError::Degraded))));

        let page = core.history(HistoryQuery::default()).await.unwrap();
        assert!(page.records.is_empty());

        assert!(matches!(
            core.subscribe("x", SubscriptionSelector::Broadcast, HandlerSet::new()),
            Err(RuntimeError::Degraded { .. })
        ));
    }

    #[tokio::test]
    async fn test_required_mode_store_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let _occupant = FileEventLog::open(dir.path()).unwrap();

        let config = RelayConfig {
            mode: OperatingMode::Required,
            log_backend: LogBackend::File,
            log_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let result = RelayCore::start(config, SchemaRegistry::new());
        assert!(matches!(result, Err(RuntimeError::Store(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_subscribe_and_replay() {
        let core = started_core();

        let live_calls = Arc::new(AtomicUsize::new(0));
        let mut handlers = HandlerSet::new();
        {
            let calls = Arc::clone(&live_calls);
            handlers.register_fn(EventKind::CreditAllocated, move |event| {
                assert!(event.payload.contains_key("metadata"));
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let sub = core
            .subscribe(
                "credit-projector",
                SubscriptionSelector::Namespace(Namespace::Credit),
                handlers.clone(),
            )
            .unwrap();

        // A v1 payload: the consumer upcasts before dispatch.
        core.publish(
            Event::new(
                EventKind::CreditAllocated,
                "credit-ledger",
                Payload::from_value(serde_json::json!({"account": "a", "amount": 9})).unwrap(),
            ),
        )
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while live_calls.load(Ordering::SeqCst) < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("live handler never ran");

        sub.shutdown().await;

        // Rebuild the projection from scratch through the same handlers.
        let replay_calls = Arc::new(AtomicUsize::new(0));
        let mut replay_handlers = HandlerSet::new();
        {
            let calls = Arc::clone(&replay_calls);
            replay_handlers.register_fn(EventKind::CreditAllocated, move |event| {
                assert!(event.payload.contains_key("metadata"));
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let engine = core.replay_engine(replay_handlers).unwrap();
        let summary = engine.replay(0).await.unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(replay_calls.load(Ordering::SeqCst), 1);
    }
}
