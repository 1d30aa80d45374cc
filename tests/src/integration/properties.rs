//! # Guarantee Scenarios
//!
//! The substrate's core guarantees, each exercised across crate
//! boundaries the way the platform modules exercise them:
//!
//! 1. Idempotency: redelivery of a (subscriber, offset) pair never
//!    re-triggers the handler effect.
//! 2. Upcast determinism and field preservation.
//! 3. Sequential version enforcement at registration.
//! 4. Routing determinism.
//! 5. Replay consistency over mixed-version history.
//! 6. Permanent-vs-transient failure handling.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use event_consumer::{Consumer, DedupStore, HandlerSet, InMemoryDedupStore, ProcessOutcome};
    use event_log::{EventLog, InMemoryEventLog, LogRecord};
    use event_replay::ReplayEngine;
    use parking_lot::Mutex;
    use schema_registry::{RegistryError, SchemaRegistry};
    use serde_json::json;
    use shared_bus::{route, EventFilter};
    use shared_types::{Event, EventKind, HandlerError, Payload};

    fn payload(value: serde_json::Value) -> Payload {
        Payload::from_value(value).unwrap()
    }

    fn consumer(
        registry: SchemaRegistry,
        handlers: HandlerSet,
        dedup: Arc<InMemoryDedupStore>,
    ) -> Consumer {
        Consumer::new(
            "guarantee-tests",
            Arc::new(registry),
            dedup,
            Arc::new(handlers),
            EventFilter::all(),
        )
    }

    // =========================================================================
    // IDEMPOTENCY
    // =========================================================================

    #[tokio::test]
    async fn idempotency_same_offset_delivered_twice_runs_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handlers = HandlerSet::new();
        {
            let calls = Arc::clone(&calls);
            handlers.register_fn(EventKind::CreditConsumed, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let consumer = consumer(
            SchemaRegistry::new(),
            handlers,
            Arc::new(InMemoryDedupStore::new()),
        );

        let record = LogRecord {
            offset: 7,
            event: Event::new(EventKind::CreditConsumed, "credit-ledger", Payload::new()),
        };

        // The transport redelivers the identical log record.
        consumer.process_record(&record).await.unwrap();
        consumer.process_record(&record).await.unwrap();
        consumer.process_record(&record).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idempotency_event_id_is_not_the_dedup_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handlers = HandlerSet::new();
        {
            let calls = Arc::clone(&calls);
            handlers.register_fn(EventKind::CreditConsumed, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let consumer = consumer(
            SchemaRegistry::new(),
            handlers,
            Arc::new(InMemoryDedupStore::new()),
        );

        // Same offset, different event id (a retried publish would look
        // like this if it were ever double-appended): still deduped.
        let mut record = LogRecord {
            offset: 3,
            event: Event::new(EventKind::CreditConsumed, "credit-ledger", Payload::new()),
        };
        consumer.process_record(&record).await.unwrap();
        record.event.regenerate_id();
        let outcome = consumer.process_record(&record).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::AlreadyProcessed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // =========================================================================
    // UPCASTING
    // =========================================================================

    #[test]
    fn upcast_applied_twice_is_byte_identical() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_version(EventKind::CreditAllocated, 2, "adds metadata", |mut p| {
                p.insert("metadata", json!({}));
                Ok(p)
            })
            .unwrap();

        let event = Event::new(
            EventKind::CreditAllocated,
            "credit-ledger",
            payload(json!({"account": "a-9", "amount": 3})),
        );

        let first = registry.upcast(event.clone()).unwrap();
        let second = registry.upcast(event).unwrap();
        assert_eq!(
            serde_json::to_vec(&first.payload).unwrap(),
            serde_json::to_vec(&second.payload).unwrap()
        );
    }

    #[test]
    fn upcast_output_keys_superset_of_input_keys() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_version(EventKind::MissionCreated, 2, "adds priority", |mut p| {
                p.insert("priority", json!(0));
                Ok(p)
            })
            .unwrap();
        registry
            .register_version(EventKind::MissionCreated, 3, "adds deadline", |mut p| {
                p.insert("deadline", json!(null));
                Ok(p)
            })
            .unwrap();

        let input = payload(json!({
            "mission_id": "m-1",
            "objective": "chart the delta",
            "tags": ["survey"]
        }));
        let input_keys: Vec<String> = input.keys().cloned().collect();

        let upcast = registry
            .upcast(Event::new(EventKind::MissionCreated, "scheduler", input))
            .unwrap();
        for key in &input_keys {
            assert!(
                upcast.payload.contains_key(key),
                "field {key} lost in upcast chain"
            );
        }
    }

    #[test]
    fn registering_v3_before_v2_is_a_configuration_error() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_initial(EventKind::PolicyUpdated, "policy_id")
            .unwrap();

        let result =
            registry.register_version(EventKind::PolicyUpdated, 3, "too eager", |p| Ok(p));
        assert!(matches!(
            result,
            Err(RegistryError::NonSequentialVersion {
                attempted: 3,
                expected: 2,
                ..
            })
        ));
    }

    // =========================================================================
    // ROUTING
    // =========================================================================

    #[test]
    fn routing_identical_events_always_same_channel() {
        let template = Event::new(
            EventKind::CreditConsumed,
            "credit-ledger",
            payload(json!({"account": "a", "amount": 1})),
        );
        let expected = route(&template);

        for _ in 0..100 {
            let mut attempt = template.clone();
            attempt.regenerate_id();
            assert_eq!(route(&attempt), expected);
        }
    }

    // =========================================================================
    // REPLAY CONSISTENCY
    // =========================================================================

    #[tokio::test]
    async fn replay_of_mixed_version_history_yields_only_current_payloads() {
        // Log: credit.allocated at versions [1, 1, 2]; v1→v2 adds `metadata`.
        let log = Arc::new(InMemoryEventLog::new());
        for version in [1u32, 1, 2] {
            let mut event = Event::new(
                EventKind::CreditAllocated,
                "credit-ledger",
                payload(json!({"account": "a", "amount": 1})),
            )
            .with_schema_version(version);
            if version == 2 {
                event.payload.insert("metadata", json!({"source": "native-v2"}));
            }
            log.append(event).await.unwrap();
        }

        let mut registry = SchemaRegistry::new();
        registry
            .register_version(EventKind::CreditAllocated, 2, "adds metadata", |mut p| {
                p.insert("metadata", json!({}));
                Ok(p)
            })
            .unwrap();

        let projection = Arc::new(Mutex::new(Vec::new()));
        let mut handlers = HandlerSet::new();
        {
            let projection = Arc::clone(&projection);
            handlers.register_fn(EventKind::CreditAllocated, move |event| {
                projection.lock().push(event.payload.clone());
                Ok(())
            });
        }

        let engine = ReplayEngine::new(log, Arc::new(registry), Arc::new(handlers));
        let summary = engine.replay(0).await.unwrap();

        assert_eq!(summary.applied, 3);
        let updates = projection.lock();
        assert_eq!(updates.len(), 3);
        for update in updates.iter() {
            assert!(update.contains_key("metadata"));
        }
    }

    // =========================================================================
    // PERMANENT VS TRANSIENT
    // =========================================================================

    #[tokio::test]
    async fn validation_error_acked_timeout_error_redelivered() {
        let mut handlers = HandlerSet::new();
        // Event A's handler: validation failure (permanent).
        handlers.register_fn(EventKind::PolicyViolation, |_| {
            Err(HandlerError::Validation("unknown rule".into()))
        });
        // Event B's handler: timeout (transient), succeeding on retry.
        let b_attempts = Arc::new(AtomicUsize::new(0));
        {
            let attempts = Arc::clone(&b_attempts);
            handlers.register_fn(EventKind::CreditConsumed, move |_| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(HandlerError::Timeout("ledger store".into()))
                } else {
                    Ok(())
                }
            });
        }

        let dedup = Arc::new(InMemoryDedupStore::new());
        let consumer = consumer(SchemaRegistry::new(), handlers, dedup.clone());

        let record_a = LogRecord {
            offset: 0,
            event: Event::new(EventKind::PolicyViolation, "policy-engine", Payload::new()),
        };
        let record_b = LogRecord {
            offset: 1,
            event: Event::new(EventKind::CreditConsumed, "credit-ledger", Payload::new()),
        };

        // A is permanent: acked with annotation, never retried.
        let outcome_a = consumer.process_record(&record_a).await.unwrap();
        assert!(matches!(outcome_a, ProcessOutcome::PermanentlyFailed { .. }));
        assert!(dedup.seen("guarantee-tests", 0).await.unwrap());
        assert_eq!(
            consumer.process_record(&record_a).await.unwrap(),
            ProcessOutcome::AlreadyProcessed
        );

        // B is transient: unacked, redelivery invokes the handler again.
        let outcome_b = consumer.process_record(&record_b).await.unwrap();
        assert!(matches!(outcome_b, ProcessOutcome::RetryPending { .. }));
        assert!(!dedup.seen("guarantee-tests", 1).await.unwrap());

        let retried = consumer.process_record(&record_b).await.unwrap();
        assert_eq!(retried, ProcessOutcome::Handled);
        assert_eq!(b_attempts.load(Ordering::SeqCst), 2);
    }
}
