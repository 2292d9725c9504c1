//! # Akane
//!
//! An ordered, permission-gated command dispatcher for chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐    ┌────────────┐    ┌──────────────────────────────────────┐
//! │ Transport │──▶│ Normalizer │──▶│ DispatchEngine                       │
//! └───────────┘    └────────────┘    │  before hooks                        │
//!                                    │  passives ─▶ commands (first wins) │──▶ Responder
//!                                    │  after hooks                         │
//!                                    └──────────────────────────────────────┘
//!                                                     │
//!                                                   Store
//! ```
//!
//! - **Core** ([`core`]): messages, user/group records and the
//!   [`Normalizer`](core::Normalizer), [`Store`](core::Store) and
//!   [`Responder`](core::Responder) contracts
//! - **Framework** ([`framework`]): handler descriptors, the registry, the
//!   matcher, permission and cooldown gates, hooks and the dispatch engine
//! - **Runtime** ([`runtime`]): configuration, logging, the JSON record store
//!   and the event loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use akane::prelude::*;
//!
//! fn ping() -> HandlerDescriptor {
//!     HandlerDescriptor::builder("ping")
//!         .command("ping")
//!         .category("general")
//!         .cooldown(3)
//!         .execute(|_ctx| async { "pong" })
//!         .build()
//! }
//! submit_handler!(ping);
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = AkaneRuntime::builder()
//!         .linked_handlers()
//!         .responder(responder)
//!         .build()
//!         .await?;
//!     runtime.run(&normalizer, events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `akane.toml` (default)
//! - `yaml-config`: read `akane.yaml`
//! - `json-log`: JSON log output

pub use akane_core as core;
pub use akane_framework as framework;
pub use akane_runtime as runtime;

pub use akane_framework::submit_handler;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use akane::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use akane_runtime::{AkaneConfig, AkaneRuntime, JsonFileStore};

    // Handlers
    pub use akane_framework::{
        DispatchEngine, DispatchReport, ExecutionContext, HandlerDescriptor, HandlerError,
        HandlerRegistry, HandlerResult, submit_handler,
    };

    // Data model and collaborators
    pub use akane_core::{
        GroupRecord, InboundMessage, Normalizer, PrefixSet, Responder, ResponderResult,
        SenderRoles, Store, UserRecord,
    };

    // Logging
    pub use akane_runtime::tracing::{debug, error, info, trace, warn};
}
