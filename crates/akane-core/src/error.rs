//! Error types for the Akane core collaborators.
//!
//! Gate denials are deliberately absent: a denied command is ordinary control
//! flow and is modelled as a value by the framework, not as an error.

use thiserror::Error;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a [`Store`](crate::Store) implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O error while reading or writing the backing medium.
    #[error("store I/O error: {0}")]
    Io(String),

    /// The persisted data could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(String),

    /// The store cannot serve requests right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Responder Errors
// =============================================================================

/// Errors raised while notifying the requester.
#[derive(Debug, Clone, Error)]
pub enum ResponderError {
    /// The transport refused or failed to deliver the reply.
    #[error("failed to send reply: {0}")]
    SendFailed(String),

    /// No live connection to deliver through.
    #[error("responder not connected")]
    NotConnected,
}

/// Result type for responder operations.
pub type ResponderResult<T> = Result<T, ResponderError>;
