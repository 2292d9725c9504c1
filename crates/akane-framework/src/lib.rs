//! # Akane Framework
//!
//! The inbound-event dispatch engine and everything it is built from.
//!
//! This layer provides:
//! - [`HandlerDescriptor`]s describing command and passive handlers, collected
//!   into an immutable, ordered [`HandlerRegistry`]
//! - [`CommandMatcher`] for the prefixed and no-prefix command grammars
//! - [`ConditionEvaluator`] for permission/requirement gates
//! - [`CooldownTracker`] and [`CooldownGate`] for per-user rate limiting
//! - [`HookRunner`] for error-isolated before/after hooks
//! - [`DispatchEngine`], which ties them together for one message at a time
//!
//! # Pipeline
//!
//! ```text
//! InboundMessage
//!   └─▶ before hooks (every descriptor, registration order)
//!   └─▶ matching loop (registration order)
//!         ├─ passive handler ─────────────────────────▶ execute, keep going
//!         └─ command handler ─▶ conditions ─▶ cooldown ─▶ execute, stop
//!   └─▶ after hooks (every descriptor, with the command winner)
//! ```

pub mod condition;
pub mod context;
pub mod cooldown;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod matcher;
pub mod registry;
pub mod replies;

pub use condition::{ConditionEvaluator, Denial, Verdict};
pub use context::{ExecutionContext, Extensions};
pub use cooldown::{
    Clock, CooldownGate, CooldownStatus, CooldownTracker, GateSlot, ManualClock, SystemClock,
};
pub use descriptor::{DescriptorBuilder, Grammar, HandlerDescriptor, Requirements};
pub use dispatcher::{DispatchEngine, DispatchReport, EngineBuilder};
pub use error::{HandlerError, HandlerFault, HandlerResult, RegistryError, RegistryResult};
pub use handler::{AfterHookFn, BoxFuture, ExecuteFn, HandlerOutput, HookFn};
pub use hooks::HookRunner;
pub use matcher::{CommandMatcher, Invocation, MatchOutcome};
pub use registry::{HandlerRegistry, LinkedHandler, RegistryBuilder};
pub use replies::ReplyTemplates;

#[doc(hidden)]
pub use linkme;
