//! # Platform Schema Versions
//!
//! The version chains for the built-in taxonomy. Registered once during
//! startup, before any consumer or replay engine is constructed.
//!
//! Each upcaster transforms one version step and preserves every input
//! field; added fields get neutral defaults so older history stays
//! truthful.

use schema_registry::{RegistryError, SchemaRegistry};
use serde_json::json;
use shared_types::EventKind;

/// Register the version chains of the built-in taxonomy.
pub fn register_platform_schemas(registry: &mut SchemaRegistry) -> Result<(), RegistryError> {
    registry.register_initial(EventKind::MissionCreated, "mission_id, objective")?;
    registry.register_version(
        EventKind::MissionCreated,
        2,
        "adds scheduler priority (default 0)",
        |mut payload| {
            if !payload.contains_key("priority") {
                payload.insert("priority", json!(0));
            }
            Ok(payload)
        },
    )?;

    registry.register_initial(EventKind::CreditAllocated, "account, amount")?;
    registry.register_version(
        EventKind::CreditAllocated,
        2,
        "adds free-form allocation metadata",
        |mut payload| {
            if !payload.contains_key("metadata") {
                payload.insert("metadata", json!({}));
            }
            Ok(payload)
        },
    )?;

    registry.register_initial(EventKind::CreditConsumed, "account, amount, operation")?;
    registry.register_initial(EventKind::PolicyUpdated, "policy_id, revision")?;
    registry.register_initial(EventKind::SystemBroadcast, "message")?;

    Ok(())
}
