//! The execution context handed to handler bodies and hooks.
//!
//! One base [`ExecutionContext`] is created per inbound message. Handlers that
//! need a rewritten invocation (no-prefix commands) get a scoped copy whose
//! message view carries the rewritten fields; every other handler shares the
//! base. Dispatch-wide state set with [`set_state`](ExecutionContext::set_state)
//! is visible from every copy, so a before hook can leave data for an after
//! hook.
//!
//! ```rust,ignore
//! .execute(|ctx| async move {
//!     if ctx.is_owner() {
//!         ctx.reply(&format!("args: {:?}", ctx.args())).await?;
//!     }
//!     Ok::<_, HandlerError>(())
//! })
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use akane_core::{BoxedResponder, GroupRecord, InboundMessage, ResponderResult, UserRecord};
use parking_lot::Mutex;

use crate::matcher::Invocation;
use crate::registry::HandlerRegistry;

type AnyArc = Arc<dyn Any + Send + Sync>;

// =============================================================================
// Extensions
// =============================================================================

/// A type-keyed map of shared clients (HTTP clients, API wrappers, caches)
/// made available to every handler.
///
/// Values are stored as `Arc<T>`, so trait objects work too:
///
/// ```rust,ignore
/// let mut ext = Extensions::new();
/// ext.insert::<dyn Translator>(Arc::new(DeepL::new(key)));
/// let translator = ext.get::<dyn Translator>();
/// ```
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, AnyArc>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|arc| arc.downcast_ref::<Arc<T>>().map(Arc::clone))
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

// =============================================================================
// ExecutionContext
// =============================================================================

/// Everything a handler can see about the message being dispatched.
#[derive(Clone)]
pub struct ExecutionContext {
    message: Arc<InboundMessage>,
    user: Arc<UserRecord>,
    group: Option<Arc<GroupRecord>>,
    responder: BoxedResponder,
    registry: Arc<HandlerRegistry>,
    extensions: Arc<Extensions>,
    state: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
    handler: Option<String>,
}

impl ExecutionContext {
    pub(crate) fn new(
        message: InboundMessage,
        user: UserRecord,
        group: Option<GroupRecord>,
        responder: BoxedResponder,
        registry: Arc<HandlerRegistry>,
        extensions: Arc<Extensions>,
    ) -> Self {
        Self {
            message: Arc::new(message),
            user: Arc::new(user),
            group: group.map(Arc::new),
            responder,
            registry,
            extensions,
            state: Arc::default(),
            handler: None,
        }
    }

    /// Returns a copy bound to one handler, with `rewrite` applied to its
    /// view of the message. The base context is left untouched.
    pub(crate) fn scoped(&self, handler: &str, rewrite: Option<&Invocation>) -> Self {
        let mut scoped = self.clone();
        scoped.handler = Some(handler.to_string());
        if let Some(invocation) = rewrite {
            let mut message = (*self.message).clone();
            invocation.apply(&mut message);
            scoped.message = Arc::new(message);
        }
        scoped
    }

    // ─── Message ──────────────────────────────────────────────────────────────

    pub fn message(&self) -> &InboundMessage {
        &self.message
    }

    pub fn command(&self) -> &str {
        &self.message.command
    }

    pub fn text(&self) -> &str {
        &self.message.text
    }

    pub fn args(&self) -> &[String] {
        &self.message.args
    }

    /// The detected prefix; empty when the body had none.
    pub fn prefix(&self) -> &str {
        &self.message.prefix
    }

    pub fn sender(&self) -> &str {
        &self.message.sender
    }

    pub fn chat(&self) -> &str {
        &self.message.chat
    }

    pub fn is_group(&self) -> bool {
        self.message.is_group
    }

    // ─── Permissions ──────────────────────────────────────────────────────────

    pub fn is_real_owner(&self) -> bool {
        self.message.roles.real_owner
    }

    pub fn is_owner(&self) -> bool {
        self.message.roles.owner
    }

    pub fn is_admin(&self) -> bool {
        self.message.roles.admin
    }

    pub fn is_bot_admin(&self) -> bool {
        self.message.roles.bot_admin
    }

    pub fn is_premium(&self) -> bool {
        self.user.premium
    }

    pub fn is_vip(&self) -> bool {
        self.user.vip
    }

    // ─── Records ──────────────────────────────────────────────────────────────

    /// The sender's record as loaded at the start of dispatch.
    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    /// The group's record as loaded at the start of dispatch.
    pub fn group(&self) -> Option<&GroupRecord> {
        self.group.as_deref()
    }

    // ─── Services ─────────────────────────────────────────────────────────────

    pub fn responder(&self) -> &BoxedResponder {
        &self.responder
    }

    /// Replies to the message being dispatched.
    pub async fn reply(&self, text: &str) -> ResponderResult<()> {
        self.responder.reply(&self.message, text).await
    }

    /// Reacts to the message being dispatched.
    pub async fn react(&self, emoji: &str) -> ResponderResult<()> {
        self.responder.react(&self.message, emoji).await
    }

    /// The registry this message is being dispatched against.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Looks up a shared client by type.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.extensions.get::<T>()
    }

    /// Name of the handler this context is bound to; `None` inside hooks.
    pub fn handler_name(&self) -> Option<&str> {
        self.handler.as_deref()
    }

    // ─── Dispatch state ───────────────────────────────────────────────────────

    /// Stores a value for the rest of this dispatch. One value per type;
    /// later calls overwrite.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get_state<T: Clone + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn take_state<T: 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("message", &self.message.id)
            .field("sender", &self.message.sender)
            .field("command", &self.message.command)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}
