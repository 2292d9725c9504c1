//! The reply side channel used to notify the requester.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ResponderResult;
use crate::message::InboundMessage;

/// Delivers text back to whoever sent a message.
///
/// The dispatcher uses it for denial, cooldown and execution-error notices;
/// handlers use it for their own output. The transport behind it is opaque.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Replies to `message` in its chat.
    async fn reply(&self, message: &InboundMessage, text: &str) -> ResponderResult<()>;

    /// Reacts to `message` with an emoji.
    async fn react(&self, message: &InboundMessage, emoji: &str) -> ResponderResult<()>;
}

/// Shared, type-erased responder handle.
pub type BoxedResponder = Arc<dyn Responder>;
