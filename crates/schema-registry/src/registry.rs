//! # Version Registry and Upcaster Engine
//!
//! Versions for a kind are contiguous starting at 1, and there is never
//! more than one upcaster for a given version step. Registering out of
//! order is a configuration error raised at startup, not a runtime event.

use shared_types::{Event, EventKind, Payload};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// A single-step payload transformation from version N to N+1.
///
/// Returns a message on failure; the engine wraps it with the kind and
/// the version step for diagnosis.
pub type UpcastFn = dyn Fn(Payload) -> Result<Payload, String> + Send + Sync;

/// Registration-time configuration errors. Fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A version was registered out of order.
    #[error("Non-sequential version for {kind}: attempted v{attempted}, expected v{expected}")]
    NonSequentialVersion {
        /// Kind being registered.
        kind: EventKind,
        /// The version the caller tried to register.
        attempted: u32,
        /// The only version that would have been accepted.
        expected: u32,
    },

    /// The kind already has version 1 registered.
    #[error("Initial version for {kind} is already registered")]
    AlreadyInitialized {
        /// Kind being registered.
        kind: EventKind,
    },
}

/// Upcast engine errors.
///
/// Permanent in live consumption (acked with an error annotation), fatal
/// during replay (halts the rebuild).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpcastError {
    /// A required version step has no registered upcaster.
    #[error("No upcaster registered for {kind} v{from}→v{to}")]
    MissingUpcaster {
        /// Kind being upcast.
        kind: EventKind,
        /// Version the payload is at.
        from: u32,
        /// Version the step would reach.
        to: u32,
    },

    /// An upcaster reported failure.
    #[error("Upcaster for {kind} v{from}→v{to} failed: {message}")]
    UpcasterFailed {
        /// Kind being upcast.
        kind: EventKind,
        /// Version the payload was at.
        from: u32,
        /// Version the step would have reached.
        to: u32,
        /// Failure detail from the upcaster.
        message: String,
    },

    /// The stored version is newer than anything registered: a producer
    /// and this process disagree about the schema, which is a deployment
    /// problem, not data to ack silently.
    #[error("Event at v{actual} is ahead of registered v{latest} for {kind}")]
    VersionAhead {
        /// Kind being upcast.
        kind: EventKind,
        /// Version carried by the event.
        actual: u32,
        /// Latest version this process knows.
        latest: u32,
    },
}

struct VersionEntry {
    version: u32,
    description: String,
    // None only for version 1, which has no inbound transition.
    upcaster: Option<Box<UpcastFn>>,
}

/// The process-wide schema version registry.
#[derive(Default)]
pub struct SchemaRegistry {
    versions: HashMap<EventKind, Vec<VersionEntry>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register version 1 of a kind with a shape description.
    ///
    /// Optional: a kind that is never registered is implicitly at
    /// version 1. Registering it makes the description queryable and is
    /// required before any later version can be added.
    pub fn register_initial(
        &mut self,
        kind: EventKind,
        description: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let chain = self.versions.entry(kind).or_default();
        if !chain.is_empty() {
            return Err(RegistryError::AlreadyInitialized { kind });
        }
        chain.push(VersionEntry {
            version: 1,
            description: description.into(),
            upcaster: None,
        });
        Ok(())
    }

    /// Register version `version` of a kind together with the upcaster
    /// from `version - 1`.
    ///
    /// # Errors
    ///
    /// `RegistryError::NonSequentialVersion` unless `version` is exactly
    /// one past the latest registered version (version 1 counts as
    /// registered implicitly).
    pub fn register_version<F>(
        &mut self,
        kind: EventKind,
        version: u32,
        description: impl Into<String>,
        upcaster: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(Payload) -> Result<Payload, String> + Send + Sync + 'static,
    {
        let chain = self.versions.entry(kind).or_default();
        if chain.is_empty() {
            // Implicit version 1.
            chain.push(VersionEntry {
                version: 1,
                description: String::new(),
                upcaster: None,
            });
        }
        let expected = chain.last().map_or(1, |e| e.version) + 1;
        if version != expected {
            return Err(RegistryError::NonSequentialVersion {
                kind,
                attempted: version,
                expected,
            });
        }
        chain.push(VersionEntry {
            version,
            description: description.into(),
            upcaster: Some(Box::new(upcaster)),
        });
        Ok(())
    }

    /// The latest registered version for a kind (1 if never registered).
    #[must_use]
    pub fn latest_version(&self, kind: EventKind) -> u32 {
        self.versions
            .get(&kind)
            .and_then(|chain| chain.last())
            .map_or(1, |entry| entry.version)
    }

    /// The shape description recorded for a specific version, if any.
    #[must_use]
    pub fn description(&self, kind: EventKind, version: u32) -> Option<&str> {
        self.versions.get(&kind)?.iter().find_map(|entry| {
            (entry.version == version).then_some(entry.description.as_str())
        })
    }

    /// Whether an event's payload is older than the current version.
    #[must_use]
    pub fn is_stale(&self, event: &Event) -> bool {
        event.schema_version < self.latest_version(event.kind)
    }

    /// Bring an event's payload forward to the latest version.
    ///
    /// Applies the single-step upcasters in order, threading the payload
    /// through each. A missing step or a failing upcaster is an error,
    /// never skipped.
    pub fn upcast(&self, event: Event) -> Result<Event, UpcastError> {
        let kind = event.kind;
        let latest = self.latest_version(kind);

        if event.schema_version > latest {
            return Err(UpcastError::VersionAhead {
                kind,
                actual: event.schema_version,
                latest,
            });
        }
        if event.schema_version == latest {
            return Ok(event);
        }

        let chain = self.versions.get(&kind);
        let mut current = event;
        for to in (current.schema_version + 1)..=latest {
            let from = to - 1;
            let upcaster = chain
                .and_then(|entries| entries.iter().find(|e| e.version == to))
                .and_then(|entry| entry.upcaster.as_deref())
                .ok_or(UpcastError::MissingUpcaster { kind, from, to })?;

            let input_keys: Vec<String> = current.payload.keys().cloned().collect();
            let output = upcaster(current.payload.clone()).map_err(|message| {
                UpcastError::UpcasterFailed {
                    kind,
                    from,
                    to,
                    message,
                }
            })?;

            let dropped: Vec<&String> = input_keys
                .iter()
                .filter(|key| !output.contains_key(key))
                .collect();
            if !dropped.is_empty() {
                warn!(kind = %kind, from, to, ?dropped, "Upcaster dropped payload fields");
                debug_assert!(
                    dropped.is_empty(),
                    "upcaster {kind} v{from}→v{to} dropped fields: {dropped:?}"
                );
            }

            current.payload = output;
            current.schema_version = to;
            current.meta.schema_version = to;
        }
        Ok(current)
    }
}
