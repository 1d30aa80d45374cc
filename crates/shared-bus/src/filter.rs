//! # Subscription Filters
//!
//! What a subscriber is interested in, independent of which channel
//! carried the notification. Consumers drain the durable log, so the
//! filter (not the channel) decides which records they process.

use shared_types::{Event, EventKind, Namespace};

/// Filter for selecting events out of the log tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<EventKind>,
    /// Only events addressed to this target (and broadcast-style events
    /// with no target at all are excluded when set).
    pub target: Option<String>,
}

impl EventFilter {
    /// A filter that accepts every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter for a set of kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds,
            target: None,
        }
    }

    /// A filter for every kind in one namespace.
    #[must_use]
    pub fn namespace(namespace: Namespace) -> Self {
        Self::kinds(
            EventKind::ALL
                .iter()
                .copied()
                .filter(|kind| kind.namespace() == namespace)
                .collect(),
        )
    }

    /// A filter for events addressed to one target.
    #[must_use]
    pub fn target(target: impl Into<String>) -> Self {
        Self {
            kinds: Vec::new(),
            target: Some(target.into()),
        }
    }

    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&event.kind);
        let target_match = match &self.target {
            Some(target) => event.target.as_deref() == Some(target.as_str()),
            None => true,
        };
        kind_match && target_match
    }
}
