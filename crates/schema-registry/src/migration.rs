//! # Migration Analyzer
//!
//! Operator-facing tooling over the upcast engine: report how much stored
//! history is behind the latest schema versions, and preview what the
//! upcasters would produce, without mutating anything. Bulk rewriting of
//! the immutable log is deliberately out of scope here.

use crate::registry::{SchemaRegistry, UpcastError};
use event_log::{EventLog, LogError};
use shared_types::{EventKind, Payload};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const SCAN_BATCH: usize = 512;

/// Errors from migration tooling.
#[derive(Debug, Clone, Error)]
pub enum MigrationError {
    /// Reading the log failed.
    #[error(transparent)]
    Log(#[from] LogError),

    /// An upcaster failed during a dry run.
    #[error(transparent)]
    Upcast(#[from] UpcastError),
}

/// Staleness summary for one event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindMigrationStatus {
    /// The kind summarized.
    pub kind: EventKind,
    /// Latest registered schema version.
    pub latest_version: u32,
    /// Stored events of this kind.
    pub total: u64,
    /// Stored events behind the latest version.
    pub stale: u64,
}

/// Full staleness report over the log.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Per-kind summaries, only for kinds present in the log.
    pub kinds: Vec<KindMigrationStatus>,
    /// Total records scanned.
    pub scanned: u64,
}

impl MigrationReport {
    /// Total stale events across all kinds.
    #[must_use]
    pub fn stale_total(&self) -> u64 {
        self.kinds.iter().map(|k| k.stale).sum()
    }
}

/// Preview of one upcast transformation.
#[derive(Debug, Clone)]
pub struct MigrationPreview {
    /// Log offset of the previewed record.
    pub offset: u64,
    /// Version the stored payload is at.
    pub from_version: u32,
    /// Version the upcast chain reaches.
    pub to_version: u32,
    /// Payload as stored.
    pub before: Payload,
    /// Payload as the upcasters would produce it.
    pub after: Payload,
}

/// Read-only analyzer over a log and a registry.
pub struct MigrationAnalyzer {
    registry: Arc<SchemaRegistry>,
    log: Arc<dyn EventLog>,
}

impl MigrationAnalyzer {
    /// Create an analyzer over the given registry and log.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, log: Arc<dyn EventLog>) -> Self {
        Self { registry, log }
    }

    /// Count, per kind, how many stored events are behind the latest
    /// registered version.
    pub async fn analyze(&self) -> Result<MigrationReport, MigrationError> {
        let mut totals: HashMap<EventKind, (u64, u64)> = HashMap::new();
        let mut scanned: u64 = 0;
        let mut cursor: u64 = 0;

        loop {
            let batch = self.log.read(cursor, SCAN_BATCH).await?;
            if batch.is_empty() {
                break;
            }
            for record in &batch {
                let entry = totals.entry(record.event.kind).or_insert((0, 0));
                entry.0 += 1;
                if self.registry.is_stale(&record.event) {
                    entry.1 += 1;
                }
            }
            scanned += batch.len() as u64;
            cursor = batch.last().map_or(cursor, |r| r.offset + 1);
        }

        let mut kinds: Vec<KindMigrationStatus> = totals
            .into_iter()
            .map(|(kind, (total, stale))| KindMigrationStatus {
                kind,
                latest_version: self.registry.latest_version(kind),
                total,
                stale,
            })
            .collect();
        kinds.sort_by_key(|status| status.kind.as_str());

        let report = MigrationReport { kinds, scanned };
        info!(
            scanned = report.scanned,
            stale = report.stale_total(),
            "Migration analysis complete"
        );
        Ok(report)
    }

    /// Preview the upcast output for up to `limit` stale events of one
    /// kind. Nothing is written; a failing upcaster surfaces as an error
    /// so operators see the problem before any migration attempt.
    pub async fn dry_run(
        &self,
        kind: EventKind,
        limit: usize,
    ) -> Result<Vec<MigrationPreview>, MigrationError> {
        let latest = self.registry.latest_version(kind);
        let mut previews = Vec::new();
        let mut cursor: u64 = 0;

        while previews.len() < limit {
            let batch = self.log.read(cursor, SCAN_BATCH).await?;
            if batch.is_empty() {
                break;
            }
            cursor = batch.last().map_or(cursor, |r| r.offset + 1);

            for record in batch {
                if record.event.kind != kind || !self.registry.is_stale(&record.event) {
                    continue;
                }
                let before = record.event.payload.clone();
                let from_version = record.event.schema_version;
                let upcast = self.registry.upcast(record.event)?;
                previews.push(MigrationPreview {
                    offset: record.offset,
                    from_version,
                    to_version: latest,
                    before,
                    after: upcast.payload,
                });
                if previews.len() == limit {
                    break;
                }
            }
        }
        Ok(previews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::InMemoryEventLog;
    use serde_json::json;
    use shared_types::Event;

    fn payload(value: serde_json::Value) -> Payload {
        Payload::from_value(value).unwrap()
    }

    async fn seeded_log() -> Arc<InMemoryEventLog> {
        let log = Arc::new(InMemoryEventLog::new());
        for version in [1, 1, 2] {
            let event = Event::new(
                EventKind::CreditAllocated,
                "credit-ledger",
                payload(json!({"account": "a-1", "amount": 5})),
            )
            .with_schema_version(version);
            log.append(event).await.unwrap();
        }
        log.append(Event::new(
            EventKind::MissionCreated,
            "scheduler",
            payload(json!({"mission_id": "m-1", "objective": "scan"})),
        ))
        .await
        .unwrap();
        log
    }

    fn registry_with_v2() -> Arc<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        registry
            .register_version(EventKind::CreditAllocated, 2, "adds metadata", |mut p| {
                p.insert("metadata", json!({}));
                Ok(p)
            })
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_analyze_counts_stale_events() {
        let analyzer = MigrationAnalyzer::new(registry_with_v2(), seeded_log().await);
        let report = analyzer.analyze().await.unwrap();

        assert_eq!(report.scanned, 4);
        let credit = report
            .kinds
            .iter()
            .find(|k| k.kind == EventKind::CreditAllocated)
            .unwrap();
        assert_eq!(credit.total, 3);
        assert_eq!(credit.stale, 2);
        assert_eq!(credit.latest_version, 2);

        let mission = report
            .kinds
            .iter()
            .find(|k| k.kind == EventKind::MissionCreated)
            .unwrap();
        assert_eq!(mission.stale, 0);
    }

    #[tokio::test]
    async fn test_dry_run_previews_without_mutation() {
        let log = seeded_log().await;
        let analyzer = MigrationAnalyzer::new(registry_with_v2(), log.clone());

        let previews = analyzer
            .dry_run(EventKind::CreditAllocated, 10)
            .await
            .unwrap();
        assert_eq!(previews.len(), 2);
        for preview in &previews {
            assert_eq!(preview.from_version, 1);
            assert_eq!(preview.to_version, 2);
            assert!(!preview.before.contains_key("metadata"));
            assert!(preview.after.contains_key("metadata"));
        }

        // The log itself is untouched.
        let records = log.read(0, 10).await.unwrap();
        assert!(!records[0].event.payload.contains_key("metadata"));
    }
}
