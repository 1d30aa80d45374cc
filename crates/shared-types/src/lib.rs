//! # Shared Types Crate
//!
//! This crate contains the event envelope, the closed event taxonomy, and
//! the error taxonomy shared by every module that touches the bus.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-module types are defined here.
//! - **Closed Taxonomy**: `EventKind` is the complete set of event kinds;
//!   an unknown kind on the wire is a permanent validation error.
//! - **Open Payloads**: `Payload` is a schema-versioned JSON object map.
//!   Strongly-typed views exist only for the latest schema version and are
//!   constructed after upcasting (see `views`).

pub mod errors;
pub mod event;
pub mod kind;
pub mod views;

pub use errors::{EnvelopeError, ErrorClass, HandlerError};
pub use event::{Event, EventMeta, Payload, Severity};
pub use kind::{EventKind, Namespace};
