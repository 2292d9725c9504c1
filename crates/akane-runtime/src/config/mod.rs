//! Configuration module for the Akane runtime.
//!
//! Configuration is layered with figment (defaults, files, `AKANE_*`
//! environment variables, programmatic overrides) and validated before the
//! runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AkaneConfig, BotConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    SpanEventConfig, StoreConfig,
};
pub use validation::validate_config;
