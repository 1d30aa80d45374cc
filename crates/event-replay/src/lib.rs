//! # Replay Engine
//!
//! Projections are derived state: drop them, replay the log, and they
//! come back. The engine reads records in order, upcasts every stale
//! payload, and dispatches through the same `HandlerSet` the live
//! consumer uses, so a handler observes identical, current-schema
//! events whether it runs live or in a rebuild.
//!
//! ## Failure Semantics
//!
//! Unlike live consumption, where a permanent error is acked and
//! skipped, *any* upcast or handler failure during replay is fatal: the
//! rebuild halts and the error reports the last successfully applied
//! offset. Replaying past an inconsistency would bake it into the
//! projection silently.

use event_log::{EventLog, LogError};
use event_consumer::HandlerSet;
use schema_registry::{SchemaRegistry, UpcastError};
use shared_types::HandlerError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const REPLAY_BATCH: usize = 256;

/// A projection snapshot position to resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPosition {
    /// Offset of the last record already applied to the projection.
    pub last_applied: u64,
}

impl SnapshotPosition {
    /// The first offset a replay from this snapshot reads.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.last_applied + 1
    }
}

/// Result of a completed replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    /// Records dispatched to handlers.
    pub applied: u64,
    /// Records skipped because no handler targets their kind.
    pub skipped: u64,
    /// Offset of the last record applied, if any.
    pub last_offset: Option<u64>,
}

/// Fatal replay failures. Each carries the last successfully applied
/// offset so the operator can resume after fixing the cause.
#[derive(Debug, Clone, Error)]
pub enum ReplayError {
    /// An upcast step failed or was missing.
    #[error("Replay halted at offset {offset} (last applied: {last_applied:?}): {source}")]
    Upcast {
        /// Offset of the failing record.
        offset: u64,
        /// Last offset applied before the halt.
        last_applied: Option<u64>,
        /// The upcast failure.
        source: UpcastError,
    },

    /// A handler rejected a record.
    #[error("Replay halted at offset {offset} (last applied: {last_applied:?}): {source}")]
    Handler {
        /// Offset of the failing record.
        offset: u64,
        /// Last offset applied before the halt.
        last_applied: Option<u64>,
        /// The handler failure.
        source: HandlerError,
    },

    /// The log itself failed mid-replay.
    #[error("Replay halted reading the log (last applied: {last_applied:?}): {source}")]
    Log {
        /// Last offset applied before the halt.
        last_applied: Option<u64>,
        /// The log failure.
        source: LogError,
    },
}

impl ReplayError {
    /// The last offset applied before the halt, for resumption.
    #[must_use]
    pub fn last_applied(&self) -> Option<u64> {
        match self {
            Self::Upcast { last_applied, .. }
            | Self::Handler { last_applied, .. }
            | Self::Log { last_applied, .. } => *last_applied,
        }
    }
}

/// Rebuilds projections from the durable log.
pub struct ReplayEngine {
    log: Arc<dyn EventLog>,
    registry: Arc<SchemaRegistry>,
    handlers: Arc<HandlerSet>,
}

impl ReplayEngine {
    /// Create an engine over the given log, registry, and handlers.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        registry: Arc<SchemaRegistry>,
        handlers: Arc<HandlerSet>,
    ) -> Self {
        Self {
            log,
            registry,
            handlers,
        }
    }

    /// Replay the log from `from_offset` to the tail.
    ///
    /// Records whose kind has no registered handler are not part of the
    /// target projections and are skipped; everything else is upcast and
    /// dispatched, halting on the first failure.
    pub async fn replay(&self, from_offset: u64) -> Result<ReplaySummary, ReplayError> {
        let mut summary = ReplaySummary::default();
        let mut cursor = from_offset;
        info!(from_offset, "Replay started");

        loop {
            let batch = self
                .log
                .read(cursor, REPLAY_BATCH)
                .await
                .map_err(|source| ReplayError::Log {
                    last_applied: summary.last_offset,
                    source,
                })?;
            if batch.is_empty() {
                break;
            }
            cursor = batch.last().map_or(cursor, |r| r.offset + 1);

            for record in batch {
                if !self.handlers.handles(record.event.kind) {
                    summary.skipped += 1;
                    continue;
                }

                let event = self.registry.upcast(record.event).map_err(|source| {
                    ReplayError::Upcast {
                        offset: record.offset,
                        last_applied: summary.last_offset,
                        source,
                    }
                })?;

                self.handlers.dispatch(&event).await.map_err(|source| {
                    ReplayError::Handler {
                        offset: record.offset,
                        last_applied: summary.last_offset,
                        source,
                    }
                })?;

                summary.applied += 1;
                summary.last_offset = Some(record.offset);
                debug!(offset = record.offset, kind = %event.kind, "Replay applied record");
            }
        }

        info!(
            applied = summary.applied,
            skipped = summary.skipped,
            last_offset = ?summary.last_offset,
            "Replay complete"
        );
        Ok(summary)
    }

    /// Replay starting after a projection snapshot.
    pub async fn replay_from_snapshot(
        &self,
        snapshot: SnapshotPosition,
    ) -> Result<ReplaySummary, ReplayError> {
        self.replay(snapshot.next_offset()).await
    }
}
