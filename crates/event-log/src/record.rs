//! # Log Records and Audit Queries
//!
//! A `LogRecord` is the durable, immutable wrapper created the instant an
//! event is accepted by the log: the offset is assigned once and never
//! reused. `HistoryQuery` is the read-only audit filter contract consumed
//! by dashboards and compliance tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{Event, EventKind};

/// One durable, ordered entry in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Stable, monotonically increasing position; the dedup primary key.
    pub offset: u64,
    /// The event as accepted at append time.
    pub event: Event,
}

/// Audit history filter. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Restrict to one tenant.
    pub tenant_id: Option<String>,
    /// Restrict to one actor.
    pub actor_id: Option<String>,
    /// Restrict to a set of kinds. Empty means all kinds.
    pub kinds: Vec<EventKind>,
    /// Inclusive lower bound on `occurred_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `occurred_at`.
    pub until: Option<DateTime<Utc>>,
    /// Maximum records to return; `None` uses the adapter default.
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// Whether a record passes every filter.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        let event = &record.event;

        if let Some(tenant) = &self.tenant_id {
            if event.tenant_id.as_deref() != Some(tenant.as_str()) {
                return false;
            }
        }
        if let Some(actor) = &self.actor_id {
            if event.actor_id.as_deref() != Some(actor.as_str()) {
                return false;
            }
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if let Some(from) = self.from {
            if event.occurred_at < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.occurred_at > until {
                return false;
            }
        }
        true
    }
}

/// One page of audit history.
///
/// `truncated` signals that more matching records exist past the limit;
/// audit consumers render partial results rather than failing.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    /// Matching records in log order.
    pub records: Vec<LogRecord>,
    /// More matches exist beyond this page.
    pub truncated: bool,
}

/// Shared filter walk used by the log adapters.
#[must_use]
pub(crate) fn filter_history(
    records: &[LogRecord],
    query: &HistoryQuery,
    default_limit: usize,
) -> HistoryPage {
    let limit = query.limit.unwrap_or(default_limit);
    let mut page = HistoryPage::default();

    for record in records.iter().filter(|r| query.matches(r)) {
        if page.records.len() == limit {
            page.truncated = true;
            break;
        }
        page.records.push(record.clone());
    }
    page
}
