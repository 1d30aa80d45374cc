//! # Typed Payload Views
//!
//! Per-kind strongly-typed projections of the open payload map. A view is
//! only valid for the latest schema version of its kind, so consumers
//! construct views after upcasting, never before.

use crate::errors::EnvelopeError;
use crate::event::Event;
use crate::kind::EventKind;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A strongly-typed view over the payload of one event kind.
pub trait PayloadView: DeserializeOwned {
    /// The kind this view is defined for.
    const KIND: EventKind;

    /// Build the view from an upcast-current event.
    fn from_event(event: &Event) -> Result<Self, EnvelopeError> {
        if event.kind != Self::KIND {
            return Err(EnvelopeError::KindMismatch {
                expected: Self::KIND.as_str(),
                actual: event.kind.as_str().to_string(),
            });
        }
        serde_json::from_value(event.payload.to_value()).map_err(|e| EnvelopeError::PayloadShape {
            kind: Self::KIND.as_str(),
            message: e.to_string(),
        })
    }
}

/// `mission.created` payload at the current schema version.
#[derive(Debug, Clone, Deserialize)]
pub struct MissionCreated {
    /// Mission identifier assigned by the scheduler.
    pub mission_id: String,
    /// Human-readable objective.
    pub objective: String,
    /// Scheduler priority, higher is sooner.
    #[serde(default)]
    pub priority: Option<i64>,
}

impl PayloadView for MissionCreated {
    const KIND: EventKind = EventKind::MissionCreated;
}

/// `credit.allocated` payload at the current schema version (v2).
///
/// v1 lacked `metadata`; the registered v1→v2 upcaster adds it as an
/// empty object, so this view is total over upcast history.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditAllocated {
    /// Account receiving the allocation.
    pub account: String,
    /// Allocated amount in credit units.
    pub amount: i64,
    /// Free-form allocation metadata (since v2).
    pub metadata: Map<String, Value>,
}

impl PayloadView for CreditAllocated {
    const KIND: EventKind = EventKind::CreditAllocated;
}

/// `credit.consumed` payload at the current schema version.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditConsumed {
    /// Account debited.
    pub account: String,
    /// Consumed amount in credit units.
    pub amount: i64,
    /// Operation that consumed the credits.
    #[serde(default)]
    pub operation: Option<String>,
}

impl PayloadView for CreditConsumed {
    const KIND: EventKind = EventKind::CreditConsumed;
}
