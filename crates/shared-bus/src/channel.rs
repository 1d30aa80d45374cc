//! # Topic Channels
//!
//! Named real-time fan-out paths with no persistence guarantee. One
//! channel exists per taxonomy namespace, one global broadcast channel,
//! and one private channel per direct-message target.

use shared_types::Namespace;
use std::fmt;

/// A broker channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The global broadcast channel every module may watch.
    Broadcast,
    /// The shared channel for one taxonomy namespace.
    Namespace(Namespace),
    /// The private channel of a single addressee.
    Direct(String),
}

impl Channel {
    /// The broker-internal name of this channel.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Broadcast => "broadcast".to_string(),
            Self::Namespace(ns) => ns.as_str().to_string(),
            Self::Direct(target) => format!("direct.{target}"),
        }
    }

    /// A direct channel for the given target.
    #[must_use]
    pub fn direct(target: impl Into<String>) -> Self {
        Self::Direct(target.into())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
