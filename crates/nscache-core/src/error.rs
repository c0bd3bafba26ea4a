//! Error types for nscache.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Transport errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Backend replies
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Server(String),

    // Rejected requests
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Cannot increment or decrement non-numeric value: {0}")]
    NonNumericValue(String),

    // Namespace errors
    #[error("Namespace counter missing: {0}")]
    NamespaceCounterMissing(String),

    #[error("Namespace counter for {namespace} holds non-numeric value {value:?}")]
    CorruptNamespaceCounter { namespace: String, value: String },

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error originates from the transport rather than the data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_) | Error::Io(_))
    }
}
