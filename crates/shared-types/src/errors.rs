//! # Error Taxonomy
//!
//! Defines the error types shared across the bus and its consumers, and
//! the transient/permanent classification that drives retry behavior.
//!
//! ## Classification Rules
//!
//! - Transport failures are always transient: the message stays unacked
//!   and the transport redelivers it.
//! - Validation failures are always permanent: the message is acked with
//!   an error annotation and never retried.
//! - Handler failures carry a declared class; anything unclassified
//!   defaults to transient (retry is preferred over silent loss).

use thiserror::Error;

/// Whether a failure should be retried or recorded and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Redelivery is expected; do not ack.
    Transient,
    /// Ack with an error annotation; never retry.
    Permanent,
}

/// Errors raised while constructing or validating an event envelope.
///
/// All envelope errors are permanent: the payload itself is malformed and
/// redelivery cannot fix it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The kind string is not a member of the registered taxonomy.
    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    /// The payload was not a JSON object.
    #[error("Payload must be a JSON object, got {0}")]
    NonObjectPayload(&'static str),

    /// A typed view was requested for the wrong kind.
    #[error("Kind mismatch: view expects {expected}, event is {actual}")]
    KindMismatch {
        /// Kind the view is defined for.
        expected: &'static str,
        /// Kind carried by the event.
        actual: String,
    },

    /// A typed view could not be built from the payload shape.
    #[error("Payload does not match the current schema for {kind}: {message}")]
    PayloadShape {
        /// Kind whose view failed to build.
        kind: &'static str,
        /// Deserializer message.
        message: String,
    },
}

/// Errors returned by event handlers.
///
/// The variant declares the retry class; use `Transient`/`Permanent` for
/// business failures and the named variants where the cause is known.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// A retryable failure (downstream unavailable, lock contention, ...).
    #[error("Transient handler failure: {0}")]
    Transient(String),

    /// A non-retryable failure (invariant violated, impossible input, ...).
    #[error("Permanent handler failure: {0}")]
    Permanent(String),

    /// The event content failed validation inside the handler.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A downstream call timed out.
    #[error("Downstream timeout: {0}")]
    Timeout(String),
}

impl HandlerError {
    /// The retry class declared by this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transient(_) | Self::Timeout(_) => ErrorClass::Transient,
            Self::Permanent(_) | Self::Validation(_) => ErrorClass::Permanent,
        }
    }

    /// Whether redelivery is expected for this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<EnvelopeError> for HandlerError {
    fn from(err: EnvelopeError) -> Self {
        HandlerError::Validation(err.to_string())
    }
}

// Unclassified string errors default to transient.
impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Transient(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Transient(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_classes() {
        assert_eq!(
            HandlerError::Timeout("ledger".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            HandlerError::Validation("missing amount".into()).class(),
            ErrorClass::Permanent
        );
        assert!(HandlerError::Transient("busy".into()).is_transient());
        assert!(!HandlerError::Permanent("bad state".into()).is_transient());
    }

    #[test]
    fn test_unclassified_defaults_to_transient() {
        let err: HandlerError = "projection store hiccup".into();
        assert_eq!(err.class(), ErrorClass::Transient);
    }

    #[test]
    fn test_envelope_errors_become_validation() {
        let err: HandlerError = EnvelopeError::UnknownKind("nope".into()).into();
        assert_eq!(err.class(), ErrorClass::Permanent);
    }
}
