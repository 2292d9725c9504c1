//! # Akane Core
//!
//! The data model and collaborator contracts of the Akane chat bot.
//!
//! This crate owns nothing that talks to a network. It defines what the
//! dispatch pipeline consumes and what it needs from the outside world:
//!
//! - **Messages**: [`InboundMessage`], the normalized form of one chat event,
//!   plus [`PrefixSet`] for command prefix detection.
//! - **Records**: [`UserRecord`] and [`GroupRecord`], the per-sender and
//!   per-chat persisted state the permission and cooldown gates read.
//! - **Collaborators**: [`Normalizer`] (raw event → message), [`Store`]
//!   (record persistence) and [`Responder`] (the reply side channel).
//!
//! ```text
//! ┌───────────┐   raw    ┌────────────┐  InboundMessage  ┌──────────────┐
//! │ Transport │────────▶│ Normalizer │─────────────────▶│ Dispatcher   │
//! └───────────┘          └────────────┘                  │ (framework)  │
//!                                           Store ◀─────│              │
//!                                       Responder ◀─────│              │
//!                                                        └──────────────┘
//! ```

pub mod error;
pub mod message;
pub mod normalizer;
pub mod record;
pub mod responder;
pub mod store;

pub use error::{ResponderError, ResponderResult, StoreError, StoreResult};
pub use message::{InboundMessage, MessageBuilder, PrefixSet, QuotedMessage, SenderRoles};
pub use normalizer::Normalizer;
pub use record::{CooldownMap, GroupRecord, UserRecord};
pub use responder::{BoxedResponder, Responder};
pub use store::{BoxedStore, MemoryStore, Store, StoreSnapshot, UserUpdate};

/// Milliseconds since the Unix epoch, the timestamp unit used across records.
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        GroupRecord, InboundMessage, Normalizer, Responder, SenderRoles, Store, UserRecord,
    };
}
