//! # Event Envelope
//!
//! The unit of communication between platform modules. The envelope is
//! immutable once appended to the durable log; everything here is about
//! constructing it correctly on the producer side.
//!
//! ## Identity
//!
//! `id` is unique per publish attempt and is regenerated when a producer
//! retries a failed publish. It is audit/trace data only: deduplication
//! keys on the log offset, never on `id`.

use crate::errors::EnvelopeError;
use crate::kind::EventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Severity attached to an event for audit filtering and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Diagnostic detail.
    Debug,
    /// Normal business activity.
    Info,
    /// Something degraded but handled.
    Warning,
    /// Operator attention required.
    Critical,
}

/// The open, schema-versioned key/value structure carried by every event.
///
/// Payload shapes evolve per kind; the shape version lives on the envelope
/// (`schema_version`), and older shapes are brought forward by the schema
/// registry's upcasters before any handler sees them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Create an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(EnvelopeError::NonObjectPayload("null")),
            Value::Bool(_) => Err(EnvelopeError::NonObjectPayload("bool")),
            Value::Number(_) => Err(EnvelopeError::NonObjectPayload("number")),
            Value::String(_) => Err(EnvelopeError::NonObjectPayload("string")),
            Value::Array(_) => Err(EnvelopeError::NonObjectPayload("array")),
        }
    }

    /// Insert a field, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a field is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over field names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// View as the underlying JSON object map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying JSON object map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// The payload as a `Value::Object` for deserializing typed views.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Producer metadata mirrored onto every event for audit purposes.
///
/// Never used for routing; the router reads only `kind` and `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Mirror of the envelope's schema version.
    pub schema_version: u32,
    /// Producing component name.
    pub producer: String,
    /// Source module (taxonomy namespace of the producer).
    pub module: String,
}

/// The event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique per publish attempt; audit/trace only, never the dedup key.
    pub id: Uuid,
    /// Member of the closed taxonomy; its namespace determines routing.
    pub kind: EventKind,
    /// Identifier of the producing component.
    pub source: String,
    /// Single addressee; `None` means broadcast semantics apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Open key/value structure, versioned by `schema_version`.
    pub payload: Payload,
    /// Version of the payload shape for this kind.
    pub schema_version: u32,
    /// Producer-assigned timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Correlates request/response and saga flows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Mission this event belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    /// Task within the mission, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Tenant for multi-tenant audit filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Acting principal, for audit filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Severity for audit filtering and alerting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Producer metadata (audit only).
    pub meta: EventMeta,
}

impl Event {
    /// Construct an event, assigning `id` and `occurred_at`.
    ///
    /// The schema version starts at 1; producers emitting a newer payload
    /// shape set it with [`Event::with_schema_version`].
    #[must_use]
    pub fn new(kind: EventKind, source: impl Into<String>, payload: Payload) -> Self {
        let source = source.into();
        Self {
            id: Uuid::new_v4(),
            kind,
            source: source.clone(),
            target: None,
            payload,
            schema_version: 1,
            occurred_at: Utc::now(),
            correlation_id: None,
            mission_id: None,
            task_id: None,
            tenant_id: None,
            actor_id: None,
            severity: None,
            meta: EventMeta {
                schema_version: 1,
                producer: source,
                module: kind.namespace().as_str().to_string(),
            },
        }
    }

    /// Set the payload shape version (kept in sync with `meta`).
    #[must_use]
    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self.meta.schema_version = version;
        self
    }

    /// Address the event to a single recipient.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Attach a mission id.
    #[must_use]
    pub fn with_mission(mut self, mission_id: impl Into<String>) -> Self {
        self.mission_id = Some(mission_id.into());
        self
    }

    /// Attach a task id.
    #[must_use]
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Attach a tenant id.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Attach an actor id.
    #[must_use]
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Attach a severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Override the producer timestamp.
    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Assign a fresh `id` for a new publish attempt.
    ///
    /// Called by the publish path on every attempt so retries are
    /// distinguishable in the audit trail.
    pub fn regenerate_id(&mut self) {
        self.id = Uuid::new_v4();
    }
}
