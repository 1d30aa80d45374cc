//! # Router
//!
//! Decides which broker channel receives an event. The durable log
//! receives every event unconditionally before routing happens, so this
//! is a pure function of (`target`, `kind`) with no I/O.
//!
//! ## Priority
//!
//! 1. `target` set → that target's private channel only.
//! 2. The reserved broadcast kind → the global broadcast channel.
//! 3. Otherwise → the channel of the kind's namespace prefix.

use crate::channel::Channel;
use shared_types::Event;

/// Derive the broker channel for an event. Deterministic: identical
/// (`kind`, `target`) pairs always produce the same channel.
#[must_use]
pub fn route(event: &Event) -> Channel {
    if let Some(target) = &event.target {
        return Channel::Direct(target.clone());
    }
    if event.kind.is_broadcast() {
        return Channel::Broadcast;
    }
    Channel::Namespace(event.kind.namespace())
}
