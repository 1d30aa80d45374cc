//! # Event Taxonomy
//!
//! The closed, namespaced set of event kinds that may flow through the bus.
//! The namespace prefix (segment before the first `.`) determines broker
//! routing; the full dotted string is the wire representation.

use crate::errors::EnvelopeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Top-level namespaces of the taxonomy.
///
/// One broker channel exists per namespace (plus the global broadcast
/// channel and per-target direct channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Mission scheduler events.
    Mission,
    /// Credit ledger events.
    Credit,
    /// Policy engine events.
    Policy,
    /// Governance layer events.
    Governance,
    /// Distribution service events.
    Distribution,
    /// Platform lifecycle and broadcast events.
    System,
}

impl Namespace {
    /// The wire prefix for this namespace.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mission => "mission",
            Self::Credit => "credit",
            Self::Policy => "policy",
            Self::Governance => "governance",
            Self::Distribution => "distribution",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All event kinds registered in the platform taxonomy.
///
/// The set is closed: producers cannot invent kinds at runtime, and a
/// string that does not parse to a member is rejected as a validation
/// error before it ever reaches the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A mission was created by the scheduler.
    MissionCreated,
    /// A mission was assigned to an agent.
    MissionAssigned,
    /// A mission completed successfully.
    MissionCompleted,
    /// A mission failed or was aborted.
    MissionFailed,
    /// Credits were allocated to an account.
    CreditAllocated,
    /// Credits were consumed by an operation.
    CreditConsumed,
    /// Credits were refunded after a failed operation.
    CreditRefunded,
    /// A policy document was updated.
    PolicyUpdated,
    /// A policy violation was detected.
    PolicyViolation,
    /// A governance proposal was submitted.
    GovernanceProposalSubmitted,
    /// A vote was cast on a governance proposal.
    GovernanceVoteCast,
    /// A payout was scheduled by the distribution service.
    DistributionPayoutScheduled,
    /// A payout settled.
    DistributionPayoutSettled,
    /// Reserved kind for platform-wide broadcast announcements.
    SystemBroadcast,
    /// A platform module came online.
    SystemModuleStarted,
    /// A platform module went offline.
    SystemModuleStopped,
}

impl EventKind {
    /// Every registered kind, in taxonomy order.
    pub const ALL: [EventKind; 16] = [
        Self::MissionCreated,
        Self::MissionAssigned,
        Self::MissionCompleted,
        Self::MissionFailed,
        Self::CreditAllocated,
        Self::CreditConsumed,
        Self::CreditRefunded,
        Self::PolicyUpdated,
        Self::PolicyViolation,
        Self::GovernanceProposalSubmitted,
        Self::GovernanceVoteCast,
        Self::DistributionPayoutScheduled,
        Self::DistributionPayoutSettled,
        Self::SystemBroadcast,
        Self::SystemModuleStarted,
        Self::SystemModuleStopped,
    ];

    /// The dotted wire string for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissionCreated => "mission.created",
            Self::MissionAssigned => "mission.assigned",
            Self::MissionCompleted => "mission.completed",
            Self::MissionFailed => "mission.failed",
            Self::CreditAllocated => "credit.allocated",
            Self::CreditConsumed => "credit.consumed",
            Self::CreditRefunded => "credit.refunded",
            Self::PolicyUpdated => "policy.updated",
            Self::PolicyViolation => "policy.violation",
            Self::GovernanceProposalSubmitted => "governance.proposal_submitted",
            Self::GovernanceVoteCast => "governance.vote_cast",
            Self::DistributionPayoutScheduled => "distribution.payout_scheduled",
            Self::DistributionPayoutSettled => "distribution.payout_settled",
            Self::SystemBroadcast => "system.broadcast",
            Self::SystemModuleStarted => "system.module_started",
            Self::SystemModuleStopped => "system.module_stopped",
        }
    }

    /// The namespace this kind routes under.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        match self {
            Self::MissionCreated
            | Self::MissionAssigned
            | Self::MissionCompleted
            | Self::MissionFailed => Namespace::Mission,
            Self::CreditAllocated | Self::CreditConsumed | Self::CreditRefunded => {
                Namespace::Credit
            }
            Self::PolicyUpdated | Self::PolicyViolation => Namespace::Policy,
            Self::GovernanceProposalSubmitted | Self::GovernanceVoteCast => Namespace::Governance,
            Self::DistributionPayoutScheduled | Self::DistributionPayoutSettled => {
                Namespace::Distribution
            }
            Self::SystemBroadcast | Self::SystemModuleStarted | Self::SystemModuleStopped => {
                Namespace::System
            }
        }
    }

    /// Whether this is the reserved platform-wide broadcast kind.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::SystemBroadcast)
    }
}

impl FromStr for EventKind {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| EnvelopeError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
