//! Runtime error types.

use akane_core::StoreError;
use akane_framework::RegistryError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No handler registry was supplied.
    #[error("No handler registry configured")]
    RegistryMissing,

    /// No responder was supplied.
    #[error("No responder configured")]
    ResponderMissing,

    /// The handler registry failed validation.
    #[error("Invalid handler registry: {0}")]
    Registry(#[from] RegistryError),

    /// Loading or saving records failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A shutdown signal handler could not be installed.
    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur while installing the global subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),

    #[error("Failed to open log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),
}
