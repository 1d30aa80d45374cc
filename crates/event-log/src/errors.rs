//! Log adapter errors. All variants are transport-class failures: the
//! caller retries the append, the consumer leaves the record unacked.

use thiserror::Error;

/// Errors from durable log operations.
#[derive(Debug, Clone, Error)]
pub enum LogError {
    /// Underlying storage I/O failed.
    #[error("Log I/O error: {message}")]
    Io {
        /// Operating system error detail.
        message: String,
    },

    /// A record could not be serialized or parsed.
    #[error("Log serialization error: {message}")]
    Serialization {
        /// Codec error detail.
        message: String,
    },

    /// Another process holds the log directory lock.
    #[error("Log directory locked: {message}")]
    Locked {
        /// Lock acquisition detail.
        message: String,
    },
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        LogError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LogError {
    fn from(err: serde_json::Error) -> Self {
        LogError::Serialization {
            message: err.to_string(),
        }
    }
}
