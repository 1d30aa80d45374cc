//! # Event Log - The Durable System of Record
//!
//! An append-only, totally ordered record of every published event,
//! addressable by a monotonically increasing offset.
//!
//! ## Guarantees
//!
//! - `append` is atomic and returns a strictly increasing offset even
//!   under concurrent writers; offset assignment is a single point of
//!   total ordering.
//! - A failed append is reported to the producer as an error, never
//!   swallowed; the log never silently drops an event.
//! - `read` is a restartable, bounded pagination: callers may resume from
//!   any previously observed offset.
//! - Log records are immutable. The only deletion path is the explicit,
//!   audited retention trim on the file adapter.
//!
//! ## Adapters
//!
//! - [`InMemoryEventLog`] for tests and degraded development mode.
//! - [`FileEventLog`] for durable single-node operation (JSON lines,
//!   fsync on append, process-level advisory lock).

pub mod errors;
pub mod file;
pub mod memory;
pub mod ports;
pub mod record;

pub use errors::LogError;
pub use file::FileEventLog;
pub use memory::InMemoryEventLog;
pub use ports::EventLog;
pub use record::{HistoryPage, HistoryQuery, LogRecord};

/// Default page size for history queries without an explicit limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;
