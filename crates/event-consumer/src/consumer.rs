//! # Idempotent Consumer
//!
//! One consumer owns one subscription loop. Broker messages are
//! notifications only: every ack is keyed by log offset, and the loop
//! drains the durable log from its cursor, so broker drops or lag never
//! skip dedup accounting.
//!
//! ## Redelivery
//!
//! A transient failure leaves the cursor in place; the next broker
//! notification or retry tick re-reads the same offset. A permanent
//! failure acks the offset with an error annotation and moves on.

use crate::dedup::{DedupRecord, DedupStore};
use crate::errors::ConsumeError;
use crate::handler::HandlerSet;
use chrono::Utc;
use event_log::{EventLog, LogRecord};
use parking_lot::Mutex;
use schema_registry::SchemaRegistry;
use shared_bus::{BrokerSubscription, EventFilter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_BATCH: usize = 64;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Observable states of a subscription loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting for the next notification.
    Idle,
    /// Draining the log tail.
    Reading,
    /// A handler is running.
    Processing,
    /// The last record was acked (handled, deduped, or permanently failed).
    Acked,
    /// The last record failed transiently and awaits redelivery.
    RetryPending,
}

/// Outcome of processing one log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The (subscriber, offset) pair was already processed; handler not
    /// invoked.
    AlreadyProcessed,
    /// Handler succeeded; offset acked.
    Handled,
    /// Permanent failure; offset acked with an error annotation.
    PermanentlyFailed {
        /// The recorded annotation.
        error: String,
    },
    /// Transient failure; offset left unacked for redelivery.
    RetryPending {
        /// The failure detail.
        error: String,
    },
}

/// The idempotent consumer for one subscriber name.
pub struct Consumer {
    subscriber: String,
    registry: Arc<SchemaRegistry>,
    dedup: Arc<dyn DedupStore>,
    handlers: Arc<HandlerSet>,
    filter: EventFilter,
    state: Arc<Mutex<ConsumerState>>,
    retry_interval: Duration,
}

impl Consumer {
    /// Create a consumer.
    #[must_use]
    pub fn new(
        subscriber: impl Into<String>,
        registry: Arc<SchemaRegistry>,
        dedup: Arc<dyn DedupStore>,
        handlers: Arc<HandlerSet>,
        filter: EventFilter,
    ) -> Self {
        Self {
            subscriber: subscriber.into(),
            registry,
            dedup,
            handlers,
            filter,
            state: Arc::new(Mutex::new(ConsumerState::Idle)),
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Override the redelivery tick for transient failures.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// The subscriber name.
    #[must_use]
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    fn set_state(&self, state: ConsumerState) {
        *self.state.lock() = state;
    }

    async fn ack(&self, record: &LogRecord, error: Option<String>) -> Result<(), ConsumeError> {
        self.dedup
            .insert(DedupRecord {
                subscriber: self.subscriber.clone(),
                offset: record.offset,
                event_id: record.event.id,
                kind: record.event.kind,
                processed_at: Utc::now(),
                error,
            })
            .await?;
        Ok(())
    }

    /// Run one record through the state machine.
    ///
    /// The dedup insert happens strictly after the handler returns, so a
    /// crash mid-handler leaves the offset unacked and redelivery
    /// repeats the attempt: at-least-once transport, at-most-once
    /// effect.
    pub async fn process_record(
        &self,
        record: &LogRecord,
    ) -> Result<ProcessOutcome, ConsumeError> {
        self.set_state(ConsumerState::Processing);

        // Idempotent short-circuit.
        if self.dedup.seen(&self.subscriber, record.offset).await? {
            self.set_state(ConsumerState::Acked);
            debug!(
                subscriber = %self.subscriber,
                offset = record.offset,
                "Duplicate delivery short-circuited"
            );
            return Ok(ProcessOutcome::AlreadyProcessed);
        }

        // Handlers never see a stale payload; a record ahead of the
        // registry is caught here too.
        let event = match self.registry.upcast(record.event.clone()) {
            Ok(event) => event,
            Err(e) => {
                // Permanent in live consumption; fatal only in replay.
                let error = e.to_string();
                warn!(
                    subscriber = %self.subscriber,
                    offset = record.offset,
                    error = %error,
                    "Upcast failed, acking with annotation"
                );
                self.ack(record, Some(error.clone())).await?;
                self.set_state(ConsumerState::Acked);
                return Ok(ProcessOutcome::PermanentlyFailed { error });
            }
        };

        match self.handlers.dispatch(&event).await {
            Ok(()) => {
                self.ack(record, None).await?;
                self.set_state(ConsumerState::Acked);
                Ok(ProcessOutcome::Handled)
            }
            Err(err) if err.is_transient() => {
                let error = err.to_string();
                debug!(
                    subscriber = %self.subscriber,
                    offset = record.offset,
                    error = %error,
                    "Transient failure, awaiting redelivery"
                );
                self.set_state(ConsumerState::RetryPending);
                Ok(ProcessOutcome::RetryPending { error })
            }
            Err(err) => {
                let error = err.to_string();
                warn!(
                    subscriber = %self.subscriber,
                    offset = record.offset,
                    error = %error,
                    "Permanent failure, acked with annotation"
                );
                self.ack(record, Some(error.clone())).await?;
                self.set_state(ConsumerState::Acked);
                Ok(ProcessOutcome::PermanentlyFailed { error })
            }
        }
    }

    /// Spawn the subscription loop.
    ///
    /// The loop drains the log from `start_offset`, then blocks on the
    /// broker subscription; each notification (or retry tick) triggers
    /// another drain. Stopping takes effect between records; an
    /// in-flight handler always completes.
    #[must_use]
    pub fn spawn(
        self,
        subscription: BrokerSubscription,
        log: Arc<dyn EventLog>,
        start_offset: u64,
    ) -> ConsumerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let cursor = Arc::new(AtomicU64::new(start_offset));
        let state = Arc::clone(&self.state);
        let subscriber = self.subscriber.clone();
        let retry_interval = self.retry_interval;

        let task = tokio::spawn(run_loop(
            self,
            subscription,
            log,
            Arc::clone(&cursor),
            stop_rx,
            retry_interval,
        ));

        info!(subscriber = %subscriber, start_offset, "Consumer loop started");
        ConsumerHandle {
            subscriber,
            stop_tx,
            task,
            cursor,
            state,
        }
    }
}

async fn run_loop(
    consumer: Consumer,
    mut subscription: BrokerSubscription,
    log: Arc<dyn EventLog>,
    cursor: Arc<AtomicU64>,
    mut stop_rx: watch::Receiver<bool>,
    retry_interval: Duration,
) {
    // Catch up on history before the first notification.
    drain(&consumer, &log, &cursor, &stop_rx).await;

    let mut tick = tokio::time::interval(retry_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        consumer.set_state(ConsumerState::Idle);
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            received = subscription.recv() => {
                match received {
                    // The event itself is read back from the log; the
                    // broker message is only the wake-up.
                    Some(_) => drain(&consumer, &log, &cursor, &stop_rx).await,
                    None => {
                        info!(subscriber = %consumer.subscriber, "Broker closed, consumer stopping");
                        break;
                    }
                }
            }
            _ = tick.tick() => {
                drain(&consumer, &log, &cursor, &stop_rx).await;
            }
        }
        if *stop_rx.borrow() {
            break;
        }
    }
    consumer.set_state(ConsumerState::Idle);
    info!(subscriber = %consumer.subscriber, "Consumer loop stopped");
}

async fn drain(
    consumer: &Consumer,
    log: &Arc<dyn EventLog>,
    cursor: &Arc<AtomicU64>,
    stop_rx: &watch::Receiver<bool>,
) {
    consumer.set_state(ConsumerState::Reading);
    loop {
        if *stop_rx.borrow() {
            return;
        }
        let from = cursor.load(Ordering::Acquire);
        let batch = match log.read(from, READ_BATCH).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(subscriber = %consumer.subscriber, error = %e, "Log read failed, will retry");
                return;
            }
        };
        if batch.is_empty() {
            return;
        }

        for record in batch {
            // Stop only between records; never interrupt a handler.
            if *stop_rx.borrow() {
                return;
            }
            if !consumer.filter.matches(&record.event) {
                cursor.store(record.offset + 1, Ordering::Release);
                continue;
            }
            match consumer.process_record(&record).await {
                Ok(ProcessOutcome::RetryPending { .. }) => {
                    // Leave the cursor; the next tick redelivers.
                    return;
                }
                Ok(_) => {
                    cursor.store(record.offset + 1, Ordering::Release);
                }
                Err(e) => {
                    warn!(
                        subscriber = %consumer.subscriber,
                        offset = record.offset,
                        error = %e,
                        "Consumer infrastructure error, will retry"
                    );
                    return;
                }
            }
        }
    }
}

/// Lifecycle handle for a spawned subscription loop.
///
/// Dropping the handle also stops the loop; there are no background
/// tasks without an owner.
pub struct ConsumerHandle {
    subscriber: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    cursor: Arc<AtomicU64>,
    state: Arc<Mutex<ConsumerState>>,
}

impl ConsumerHandle {
    /// The subscriber name this loop serves.
    #[must_use]
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    /// Signal the loop to stop after the in-flight record completes.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop and wait for the loop to finish.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }

    /// The next offset the loop will read.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// The loop's current state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        *self.state.lock()
    }

    /// Whether the loop task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
