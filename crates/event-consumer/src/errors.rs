//! Consumer infrastructure errors. These are failures of the machinery
//! around the handler (dedup store, log reads), not of the handler
//! itself; all are transport-class, so the affected offset stays unacked.

use crate::dedup::DedupError;
use event_log::LogError;
use thiserror::Error;

/// Errors from the consumer machinery.
#[derive(Debug, Clone, Error)]
pub enum ConsumeError {
    /// The dedup store failed; the offset must not be acked.
    #[error(transparent)]
    Dedup(#[from] DedupError),

    /// Reading the durable log failed.
    #[error(transparent)]
    Log(#[from] LogError),
}
