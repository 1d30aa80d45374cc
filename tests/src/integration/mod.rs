//! Cross-crate integration scenarios.

pub mod flows;
pub mod properties;
