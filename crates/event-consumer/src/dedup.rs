//! # Dedup Record Store
//!
//! Tracks which (subscriber, offset) pairs have been processed. Keys are
//! namespaced by subscriber, so consumers of different names write
//! concurrently without coordination. Records expire after a retention
//! window; the sweep runs piggybacked on inserts, the same discipline as
//! a time-bounded cache.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use shared_types::EventKind;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors from the dedup store. Transport-class: the consumer leaves the
/// record unacked and retries on redelivery.
#[derive(Debug, Clone, Error)]
pub enum DedupError {
    /// The backing store failed.
    #[error("Dedup store error: {message}")]
    Storage {
        /// Store-specific detail.
        message: String,
    },
}

/// One processed (subscriber, offset) pair.
///
/// `event_id` is a secondary audit field only; the (subscriber, offset)
/// pair is the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRecord {
    /// Owning subscriber name.
    pub subscriber: String,
    /// Log offset that was processed.
    pub offset: u64,
    /// Event id observed at processing time (audit only).
    pub event_id: Uuid,
    /// Kind observed at processing time.
    pub kind: EventKind,
    /// When processing finished.
    pub processed_at: DateTime<Utc>,
    /// Error annotation for permanently-failed processing.
    pub error: Option<String>,
}

/// The dedup store port.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Whether the pair has already been processed.
    async fn seen(&self, subscriber: &str, offset: u64) -> Result<bool, DedupError>;

    /// Fetch the record for a pair, if present.
    async fn get(&self, subscriber: &str, offset: u64)
        -> Result<Option<DedupRecord>, DedupError>;

    /// Insert a record. A pre-existing record for the pair wins: the
    /// first ack is authoritative.
    async fn insert(&self, record: DedupRecord) -> Result<(), DedupError>;

    /// Remove records older than the retention window. Returns the
    /// number removed.
    async fn sweep_expired(&self) -> Result<usize, DedupError>;
}

struct DedupInner {
    records: HashMap<(String, u64), DedupRecord>,
    last_sweep: DateTime<Utc>,
}

/// In-memory dedup store.
pub struct InMemoryDedupStore {
    inner: Mutex<DedupInner>,
    retention: Duration,
    sweep_interval: Duration,
}

impl InMemoryDedupStore {
    /// Default retention window in days.
    pub const DEFAULT_RETENTION_DAYS: i64 = 30;

    /// Default interval between piggybacked sweeps.
    pub const DEFAULT_SWEEP_INTERVAL_MINS: i64 = 60;

    /// Create a store with the default 30-day retention.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(Duration::days(Self::DEFAULT_RETENTION_DAYS))
    }

    /// Create a store with a custom retention window.
    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            inner: Mutex::new(DedupInner {
                records: HashMap::new(),
                last_sweep: Utc::now(),
            }),
            retention,
            sweep_interval: Duration::minutes(Self::DEFAULT_SWEEP_INTERVAL_MINS),
        }
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    fn sweep(inner: &mut DedupInner, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let before = inner.records.len();
        inner.records.retain(|_, record| record.processed_at > cutoff);
        before - inner.records.len()
    }
}

impl Default for InMemoryDedupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn seen(&self, subscriber: &str, offset: u64) -> Result<bool, DedupError> {
        let inner = self.inner.lock();
        Ok(inner
            .records
            .contains_key(&(subscriber.to_string(), offset)))
    }

    async fn get(
        &self,
        subscriber: &str,
        offset: u64,
    ) -> Result<Option<DedupRecord>, DedupError> {
        let inner = self.inner.lock();
        Ok(inner.records.get(&(subscriber.to_string(), offset)).cloned())
    }

    async fn insert(&self, record: DedupRecord) -> Result<(), DedupError> {
        let mut inner = self.inner.lock();

        let now = Utc::now();
        if now - inner.last_sweep > self.sweep_interval {
            let removed = Self::sweep(&mut inner, self.retention);
            inner.last_sweep = now;
            if removed > 0 {
                debug!(removed, "Dedup retention sweep");
            }
        }

        inner
            .records
            .entry((record.subscriber.clone(), record.offset))
            .or_insert(record);
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<usize, DedupError> {
        let mut inner = self.inner.lock();
        let removed = Self::sweep(&mut inner, self.retention);
        inner.last_sweep = Utc::now();
        Ok(removed)
    }
}
