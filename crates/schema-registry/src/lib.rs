//! # Schema Registry - Versioning and Upcasting
//!
//! An append-only, immutable event history outlives every payload shape
//! change. This crate keeps the two compatible: the registry records the
//! current schema version per event kind, and the upcaster engine brings
//! any stored payload forward to it, one version step at a time.
//!
//! ## Lifecycle
//!
//! The registry is an explicit, constructed object: the runtime populates
//! it during startup (`register_initial` / `register_version`), wraps it
//! in an `Arc`, and hands the same handle to the consumers and the replay
//! engine. After startup it is read-only. There is no ambient global.
//!
//! ## Upcaster Contract
//!
//! Each upcaster transforms exactly one version step (N → N+1). It must
//! be pure: no I/O, no randomness, deterministic output for a given
//! input. It must preserve every input field it does not explicitly
//! supersede; dropping a field silently is a defect the engine flags.

pub mod migration;
pub mod registry;

pub use migration::{KindMigrationStatus, MigrationAnalyzer, MigrationError, MigrationPreview, MigrationReport};
pub use registry::{RegistryError, SchemaRegistry, UpcastError};
