//! In-memory log adapter for unit tests and degraded development mode.
//!
//! Offset assignment and record storage share one mutex, which is the
//! single serialization point the append contract requires.

use crate::errors::LogError;
use crate::ports::EventLog;
use crate::record::{filter_history, HistoryPage, HistoryQuery, LogRecord};
use crate::DEFAULT_HISTORY_LIMIT;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::Event;

/// Volatile, process-local event log.
///
/// Offsets are indices into the backing vector, so reads are O(1) slices
/// rather than scans.
#[derive(Default)]
pub struct InMemoryEventLog {
    records: Mutex<Vec<LogRecord>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: Event) -> Result<u64, LogError> {
        let mut records = self.records.lock();
        let offset = records.len() as u64;
        records.push(LogRecord { offset, event });
        Ok(offset)
    }

    async fn read(&self, from_offset: u64, limit: usize) -> Result<Vec<LogRecord>, LogError> {
        let records = self.records.lock();
        let start = usize::try_from(from_offset).unwrap_or(usize::MAX);
        if start >= records.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(limit).min(records.len());
        Ok(records[start..end].to_vec())
    }

    async fn history(&self, query: HistoryQuery) -> Result<HistoryPage, LogError> {
        let records = self.records.lock();
        Ok(filter_history(&records, &query, DEFAULT_HISTORY_LIMIT))
    }

    async fn latest_offset(&self) -> Result<Option<u64>, LogError> {
        let records = self.records.lock();
        Ok(records.last().map(|r| r.offset))
    }
}
