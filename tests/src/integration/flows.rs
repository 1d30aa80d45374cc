//! # End-to-End Flows
//!
//! The platform modules' view of the substrate: publish through the
//! runtime, watch live consumers apply effects, audit the history, and
//! rebuild projections by replay, including the durable-log-across-
//! restart path the business modules rely on after a deploy.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use event_consumer::HandlerSet;
    use event_log::{EventLog, FileEventLog, HistoryQuery};
    use event_replay::SnapshotPosition;
    use parking_lot::Mutex;
    use relay_runtime::{
        register_platform_schemas, LogBackend, RelayConfig, RelayCore, SubscriptionSelector,
    };
    use schema_registry::SchemaRegistry;
    use serde_json::json;
    use shared_types::{Event, EventKind, Namespace, Payload, Severity};

    fn memory_core() -> RelayCore {
        let mut registry = SchemaRegistry::new();
        register_platform_schemas(&mut registry).unwrap();
        RelayCore::start(
            RelayConfig {
                log_backend: LogBackend::Memory,
                ..Default::default()
            },
            registry,
        )
        .unwrap()
    }

    fn credit_allocated(account: &str, amount: i64) -> Event {
        Event::new(
            EventKind::CreditAllocated,
            "credit-ledger",
            Payload::from_value(json!({"account": account, "amount": amount})).unwrap(),
        )
        .with_tenant("tenant-a")
        .with_actor("svc-ledger")
    }

    async fn wait_for(calls: &Arc<AtomicUsize>, at_least: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while calls.load(Ordering::SeqCst) < at_least {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition never reached");
    }

    #[tokio::test]
    async fn publish_consume_audit_replay_round_trip() {
        let core = memory_core();

        // Live projection over the credit namespace.
        let ledger_total = Arc::new(AtomicUsize::new(0));
        let applied = Arc::new(AtomicUsize::new(0));
        let mut handlers = HandlerSet::new();
        {
            let total = Arc::clone(&ledger_total);
            let applied = Arc::clone(&applied);
            handlers.register_fn(EventKind::CreditAllocated, move |event| {
                let amount = event
                    .payload
                    .get("amount")
                    .and_then(serde_json::Value::as_i64)
                    .ok_or_else(|| {
                        shared_types::HandlerError::Validation("amount missing".into())
                    })?;
                total.fetch_add(amount as usize, Ordering::SeqCst);
                applied.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let sub = core
            .subscribe(
                "credit-projector",
                SubscriptionSelector::Namespace(Namespace::Credit),
                handlers,
            )
            .unwrap();

        core.publish(credit_allocated("a-1", 10)).await.unwrap();
        core.publish(credit_allocated("a-2", 32)).await.unwrap();
        wait_for(&applied, 2).await;
        assert_eq!(ledger_total.load(Ordering::SeqCst), 42);
        sub.shutdown().await;

        // Audit surface sees both, filterable by tenant.
        let page = core
            .history(HistoryQuery {
                tenant_id: Some("tenant-a".into()),
                kinds: vec![EventKind::CreditAllocated],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(!page.truncated);

        // Rebuild the same projection from offset zero.
        let rebuilt_total = Arc::new(AtomicUsize::new(0));
        let mut replay_handlers = HandlerSet::new();
        {
            let total = Arc::clone(&rebuilt_total);
            replay_handlers.register_fn(EventKind::CreditAllocated, move |event| {
                let amount = event
                    .payload
                    .get("amount")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(0);
                total.fetch_add(amount as usize, Ordering::SeqCst);
                Ok(())
            });
        }
        let engine = core.replay_engine(replay_handlers).unwrap();
        let summary = engine.replay(0).await.unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(
            rebuilt_total.load(Ordering::SeqCst),
            ledger_total.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn two_subscribers_each_get_their_own_effect_exactly_once() {
        let core = memory_core();

        let scheduler_calls = Arc::new(AtomicUsize::new(0));
        let audit_calls = Arc::new(AtomicUsize::new(0));

        let mut scheduler_handlers = HandlerSet::new();
        {
            let calls = Arc::clone(&scheduler_calls);
            scheduler_handlers.register_fn(EventKind::MissionCreated, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let mut audit_handlers = HandlerSet::new();
        {
            let calls = Arc::clone(&audit_calls);
            audit_handlers.register_fn(EventKind::MissionCreated, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let sub_a = core
            .subscribe(
                "mission-scheduler",
                SubscriptionSelector::Namespace(Namespace::Mission),
                scheduler_handlers,
            )
            .unwrap();
        let sub_b = core
            .subscribe(
                "audit-trail",
                SubscriptionSelector::Namespace(Namespace::Mission),
                audit_handlers,
            )
            .unwrap();

        core.publish(
            Event::new(
                EventKind::MissionCreated,
                "mission-scheduler",
                Payload::from_value(json!({"mission_id": "m-1", "objective": "relay"})).unwrap(),
            )
            .with_severity(Severity::Info)
            .with_correlation_id(uuid::Uuid::new_v4())
            .with_mission("m-1")
            .with_task("t-0"),
        )
        .await
        .unwrap();

        wait_for(&scheduler_calls, 1).await;
        wait_for(&audit_calls, 1).await;

        // Give the loops time to mistakenly re-process, then check counts.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler_calls.load(Ordering::SeqCst), 1);
        assert_eq!(audit_calls.load(Ordering::SeqCst), 1);

        sub_a.shutdown().await;
        sub_b.shutdown().await;
    }

    #[tokio::test]
    async fn file_backed_history_survives_restart_and_replays() {
        let dir = tempfile::tempdir().unwrap();

        // First process lifetime: publish three allocations at v1.
        {
            let log = FileEventLog::open(dir.path()).unwrap();
            for (account, amount) in [("a-1", 5i64), ("a-2", 7), ("a-3", 30)] {
                log.append(
                    Event::new(
                        EventKind::CreditAllocated,
                        "credit-ledger",
                        Payload::from_value(json!({"account": account, "amount": amount}))
                            .unwrap(),
                    ),
                )
                .await
                .unwrap();
            }
        }

        // Second process lifetime: schema moved to v2, projection rebuilt.
        let mut registry = SchemaRegistry::new();
        register_platform_schemas(&mut registry).unwrap();
        let config = RelayConfig {
            log_backend: LogBackend::File,
            log_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let core = RelayCore::start(config, registry).unwrap();

        let payloads = Arc::new(Mutex::new(Vec::new()));
        let mut handlers = HandlerSet::new();
        {
            let payloads = Arc::clone(&payloads);
            handlers.register_fn(EventKind::CreditAllocated, move |event| {
                assert_eq!(event.schema_version, 2);
                payloads.lock().push(event.payload.clone());
                Ok(())
            });
        }
        let engine = core.replay_engine(handlers).unwrap();
        let summary = engine.replay(0).await.unwrap();

        assert_eq!(summary.applied, 3);
        for payload in payloads.lock().iter() {
            assert!(payload.contains_key("metadata"));
        }
    }

    #[tokio::test]
    async fn snapshot_resume_applies_only_the_tail() {
        let core = memory_core();
        for i in 0..6 {
            core.publish(credit_allocated("a", i)).await.unwrap();
        }

        let applied = Arc::new(AtomicUsize::new(0));
        let mut handlers = HandlerSet::new();
        {
            let applied = Arc::clone(&applied);
            handlers.register_fn(EventKind::CreditAllocated, move |_| {
                applied.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let engine = core.replay_engine(handlers).unwrap();
        let summary = engine
            .replay_from_snapshot(SnapshotPosition { last_applied: 3 })
            .await
            .unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(applied.load(Ordering::SeqCst), 2);
        assert_eq!(summary.last_offset, Some(5));
    }

    #[tokio::test]
    async fn migration_analyzer_reports_runtime_staleness() {
        let core = memory_core();
        // Two v1 events (stale against the registered v2) and one current.
        core.publish(credit_allocated("a-1", 1)).await.unwrap();
        core.publish(credit_allocated("a-2", 2)).await.unwrap();
        let mut current = credit_allocated("a-3", 3).with_schema_version(2);
        current.payload.insert("metadata", json!({}));
        core.publish(current).await.unwrap();

        let analyzer = core.migration_analyzer().unwrap();
        let report = analyzer.analyze().await.unwrap();
        let credit = report
            .kinds
            .iter()
            .find(|status| status.kind == EventKind::CreditAllocated)
            .unwrap();
        assert_eq!(credit.total, 3);
        assert_eq!(credit.stale, 2);

        let previews = analyzer
            .dry_run(EventKind::CreditAllocated, 10)
            .await
            .unwrap();
        assert_eq!(previews.len(), 2);
        assert!(previews.iter().all(|p| p.after.contains_key("metadata")));
    }
}
