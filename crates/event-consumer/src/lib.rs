//! # Event Consumer - Effectively-Once Processing
//!
//! The broker is at-most-once and the log is at-least-once; this crate
//! turns the pair into exactly-once *effect* at the handler:
//!
//! 1. Dedup check on (subscriber, offset): the offset is the identity,
//!    never the event id.
//! 2. Transparent upcasting: handlers only ever see current-version
//!    payloads.
//! 3. Handler dispatch by kind.
//! 4. Ack bookkeeping driven by error class: permanent failures are
//!    acked with an annotation, transient failures stay unacked and are
//!    redelivered.
//!
//! ## State Machine
//!
//! ```text
//! IDLE → READING → PROCESSING → ACKED
//!                       │
//!                       └──────→ RETRY_PENDING (transient failure only)
//! ```

pub mod consumer;
pub mod dedup;
pub mod errors;
pub mod handler;

pub use consumer::{Consumer, ConsumerHandle, ConsumerState, ProcessOutcome};
pub use dedup::{DedupError, DedupRecord, DedupStore, InMemoryDedupStore};
pub use errors::ConsumeError;
pub use handler::{EventHandler, FnHandler, HandlerSet};
