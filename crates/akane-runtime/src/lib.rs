//! Akane Runtime - Orchestration layer for the Akane chat bot.
//!
//! This crate provides:
//! - Layered configuration (`akane.toml`, profiles, `AKANE_*` variables)
//! - Logging setup on `tracing-subscriber`
//! - [`JsonFileStore`], a JSON-file backed record store with autosave
//! - [`AkaneRuntime`], which feeds normalized events into the dispatch engine
//!   and shuts down cleanly on Ctrl+C or SIGTERM
//!
//! ```ignore
//! use akane_runtime::AkaneRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = AkaneRuntime::builder()
//!         .linked_handlers()
//!         .responder(responder)
//!         .build()
//!         .await?;
//!
//!     runtime.run(&normalizer, events).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod store;

// Re-exports
pub use config::{
    AkaneConfig, BotConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, Profile,
    StoreConfig, load_config, load_config_from_file,
};
pub use error::{LoggingError, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{AkaneRuntime, RuntimeBuilder};
pub use store::JsonFileStore;

// Re-export tracing for use by handler crates
pub use tracing;

/// Prelude module for convenient imports.
///
/// Provides the commonly used logging macros alongside the runtime types.
pub mod prelude {
    pub use super::{AkaneConfig, AkaneRuntime};
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
