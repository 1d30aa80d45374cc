//! # Durable Log Port
//!
//! The contract every log adapter satisfies. Producers and consumers hold
//! an `Arc<dyn EventLog>` and never know which backing store is wired.

use crate::errors::LogError;
use crate::record::{HistoryPage, HistoryQuery, LogRecord};
use async_trait::async_trait;
use shared_types::Event;

/// The append-only durable log.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event, returning its assigned offset.
    ///
    /// Atomic: either the record is durable with a unique offset, or an
    /// error surfaces to the producer. Offsets are strictly increasing
    /// across concurrent writers.
    async fn append(&self, event: Event) -> Result<u64, LogError>;

    /// Read up to `limit` records in order, starting at `from_offset`.
    ///
    /// Restartable: callers resume by passing the last observed offset
    /// plus one. An empty result means the tail was reached.
    async fn read(&self, from_offset: u64, limit: usize) -> Result<Vec<LogRecord>, LogError>;

    /// Audit query over the full history with filters and a page limit.
    async fn history(&self, query: HistoryQuery) -> Result<HistoryPage, LogError>;

    /// The offset of the newest record, or `None` for an empty log.
    async fn latest_offset(&self) -> Result<Option<u64>, LogError>;
}
