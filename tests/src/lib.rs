//! # Agent Relay Test Suite
//!
//! Unified test crate for cross-crate scenarios.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── integration/
//! │   ├── properties.rs   # The substrate's testable guarantees
//! │   └── flows.rs        # End-to-end publish → consume → replay flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relay-tests
//! cargo test -p relay-tests integration::properties::
//! ```

pub mod integration;
