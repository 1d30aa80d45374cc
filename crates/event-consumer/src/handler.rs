//! # Handler Dispatch
//!
//! One handler per event kind. The same `HandlerSet` serves the live
//! consumer and the replay engine, which is what guarantees projections
//! see identical dispatch whether built live or rebuilt from history.

use async_trait::async_trait;
use shared_types::{Event, EventKind, HandlerError};
use std::collections::HashMap;
use std::sync::Arc;

/// An async event handler.
///
/// Receives upcast-current events only. Returning `Ok` acks the offset;
/// the error variant's class decides between ack-with-annotation and
/// redelivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply the event's effect.
    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Adapter for plain closures.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        (self.0)(event)
    }
}

/// Registry of handlers keyed by kind.
#[derive(Default, Clone)]
pub struct HandlerSet {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl HandlerSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one kind, replacing any previous one.
    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Register a closure for one kind.
    pub fn register_fn<F>(&mut self, kind: EventKind, f: F) -> &mut Self
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(FnHandler(f)))
    }

    /// Kinds with a registered handler.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }

    /// Whether a kind has a handler.
    #[must_use]
    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Dispatch an event to its kind's handler.
    ///
    /// A missing handler is a permanent error: redelivering cannot
    /// conjure one up, and the gap should be visible in the dedup store.
    pub async fn dispatch(&self, event: &Event) -> Result<(), HandlerError> {
        match self.handlers.get(&event.kind) {
            Some(handler) => handler.handle(event).await,
            None => Err(HandlerError::Permanent(format!(
                "no handler registered for kind {}",
                event.kind
            ))),
        }
    }
}
