//! Error types for the Akane framework.

use thiserror::Error;

/// The error type command bodies and hooks may fail with.
///
/// Any `std::error::Error + Send + Sync` converts into it with `?`.
pub type HandlerError = tower::BoxError;

/// Result type returned by handler bodies and hooks.
pub type HandlerResult = Result<(), HandlerError>;

/// A caught failure of one handler or hook invocation.
///
/// Both returned errors and panics are captured at the dispatch boundary so
/// that neither escapes to the rest of the pipeline.
#[derive(Debug, Error)]
pub enum HandlerFault {
    /// The handler returned an error.
    #[error("{0}")]
    Failed(HandlerError),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Errors raised while building a [`HandlerRegistry`](crate::HandlerRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two descriptors share a name.
    #[error("duplicate handler name: {0}")]
    DuplicateName(String),

    /// A descriptor declares an empty invocation token.
    #[error("handler '{0}' declares an empty invocation token")]
    EmptyToken(String),

    /// A descriptor name is empty or contains whitespace.
    #[error("invalid handler name: '{0}'")]
    InvalidName(String),

    /// No descriptors were registered.
    #[error("handler registry is empty")]
    Empty,
}

/// Result type for registry construction.
pub type RegistryResult<T> = Result<T, RegistryError>;
