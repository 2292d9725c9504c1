//! The dispatch engine.
//!
//! [`DispatchEngine`] takes one normalized [`InboundMessage`] at a time and
//! runs it through the pipeline:
//!
//! ```text
//! load records ─▶ before hooks ─▶ matching loop ─▶ after hooks ─▶ report
//!                                   │
//!                                   ├─ match ─▶ gates ─▶ cooldown ─▶ execute
//!                                   │
//!                                   └─ stops after the first command attempt
//! ```
//!
//! Passive handlers run for every message they reach. Exactly one command
//! handler is attempted per message: the first, in registration order, that
//! matches and passes its gates. Denials and cooldown blocks are reported to
//! the sender and the loop moves on.
//!
//! Nothing escapes [`dispatch`](DispatchEngine::dispatch): store failures,
//! handler errors and panics are all logged and recorded in the returned
//! [`DispatchReport`].
//!
//! The engine also implements [`tower::Service<InboundMessage>`] so that it
//! can sit behind tower middleware.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use akane_core::{BoxedResponder, BoxedStore, GroupRecord, InboundMessage, UserRecord};
use futures::FutureExt;
use serde::Serialize;
use tower::Service;
use tracing::{Instrument, debug, debug_span, error, trace, warn};

use crate::condition::{ConditionEvaluator, Denial, Verdict};
use crate::context::{ExecutionContext, Extensions};
use crate::cooldown::{Clock, CooldownGate, CooldownTracker, GateSlot, SystemClock};
use crate::descriptor::HandlerDescriptor;
use crate::handler::{BoxFuture, guarded};
use crate::hooks::HookRunner;
use crate::matcher::CommandMatcher;
use crate::registry::HandlerRegistry;
use crate::replies::ReplyTemplates;

// ============================================================================
// DispatchReport
// ============================================================================

/// What happened while dispatching one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub message_id: String,
    /// The command that executed successfully, if any.
    pub executed: Option<String>,
    /// The command that was attempted, successfully or not.
    pub attempted: Option<String>,
    /// Passive handlers that ran to completion, in order.
    pub passives: Vec<String>,
    /// Handlers stopped by a gate, with the reason.
    pub denied: Vec<(String, Denial)>,
    /// Commands stopped by their cooldown, with the seconds remaining.
    pub cooldown_blocked: Vec<(String, u64)>,
    /// Handlers whose body failed or panicked.
    pub faulted: Vec<String>,
    /// Descriptors whose before or after hook failed or panicked.
    pub hook_faults: Vec<String>,
    /// Set when the pipeline was abandoned before matching.
    pub aborted: Option<String>,
}

impl DispatchReport {
    fn new(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            ..Default::default()
        }
    }

    /// Returns `true` if any handler body ran to completion.
    pub fn handled(&self) -> bool {
        self.executed.is_some() || !self.passives.is_empty()
    }
}

// ============================================================================
// DispatchEngine
// ============================================================================

struct EngineInner {
    registry: Arc<HandlerRegistry>,
    store: BoxedStore,
    responder: BoxedResponder,
    clock: Arc<dyn Clock>,
    gate: CooldownGate,
    replies: ReplyTemplates,
    extensions: Arc<Extensions>,
}

/// Dispatches inbound messages against a handler registry.
///
/// Cloning is cheap; clones share the registry, collaborators and the
/// in-flight cooldown gate.
#[derive(Clone)]
pub struct DispatchEngine {
    inner: Arc<EngineInner>,
}

impl DispatchEngine {
    pub fn builder(
        registry: impl Into<Arc<HandlerRegistry>>,
        store: BoxedStore,
        responder: BoxedResponder,
    ) -> EngineBuilder {
        EngineBuilder {
            registry: registry.into(),
            store,
            responder,
            clock: Arc::new(SystemClock),
            replies: ReplyTemplates::default(),
            extensions: Extensions::new(),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.inner.registry
    }

    pub fn replies(&self) -> &ReplyTemplates {
        &self.inner.replies
    }

    /// Runs the full pipeline for one message.
    pub async fn dispatch(&self, message: InboundMessage) -> DispatchReport {
        let span = debug_span!(
            "dispatch",
            message_id = %message.id,
            sender = %message.sender,
            chat = %message.chat,
        );
        self.run(message).instrument(span).await
    }

    async fn run(&self, message: InboundMessage) -> DispatchReport {
        let inner = &self.inner;
        let mut report = DispatchReport::new(&message.id);
        let now = inner.clock.now_millis();

        let user = match inner
            .store
            .load_user(&message.sender, UserRecord::seed(&message, now))
            .await
        {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "Failed to load sender record");
                report.aborted = Some(e.to_string());
                return report;
            }
        };

        let group = if message.is_group {
            match inner.store.load_group(&message.chat, GroupRecord::seed(now)).await {
                Ok(group) => Some(group),
                Err(e) => {
                    error!(error = %e, "Failed to load group record");
                    report.aborted = Some(e.to_string());
                    return report;
                }
            }
        } else {
            None
        };

        let base = Arc::new(ExecutionContext::new(
            message,
            user,
            group,
            Arc::clone(&inner.responder),
            Arc::clone(&inner.registry),
            Arc::clone(&inner.extensions),
        ));

        report.hook_faults = HookRunner::run_before(&inner.registry, &base).await;

        let winner = self.run_handlers(&base, &mut report).await;

        let after_faults = HookRunner::run_after(&inner.registry, &base, winner.as_ref()).await;
        report.hook_faults.extend(after_faults);
        report.executed = winner.map(|d| d.name().to_string());

        debug!(
            executed = report.executed.as_deref().unwrap_or("-"),
            passives = report.passives.len(),
            "Dispatch finished"
        );
        report
    }

    /// The matching loop. Returns the command that executed successfully.
    async fn run_handlers(
        &self,
        base: &Arc<ExecutionContext>,
        report: &mut DispatchReport,
    ) -> Option<Arc<HandlerDescriptor>> {
        let inner = &self.inner;
        let message = base.message();

        for descriptor in inner.registry.iter() {
            let Some(execute) = descriptor.execute() else {
                continue;
            };
            let outcome = CommandMatcher::matches(descriptor, message);
            if !outcome.should_execute {
                continue;
            }
            let name = descriptor.name();

            let verdict = ConditionEvaluator::evaluate(
                descriptor.requirements(),
                message,
                base.user(),
                base.group(),
            );
            if let Verdict::Denied(denial) = verdict {
                debug!(handler = name, reason = %denial, "Handler denied");
                self.notify(base, inner.replies.denial(denial)).await;
                report.denied.push((name.to_string(), denial));
                continue;
            }

            let slot = if outcome.is_command && descriptor.cooldown_secs() > 0 {
                match self.claim_cooldown(descriptor, base).await {
                    Ok(slot) => Some(slot),
                    Err(remaining) => {
                        debug!(handler = name, remaining, "Handler on cooldown");
                        self.notify(base, &inner.replies.cooldown(name, remaining))
                            .await;
                        report.cooldown_blocked.push((name.to_string(), remaining));
                        continue;
                    }
                }
            } else {
                None
            };

            trace!(handler = name, command = outcome.is_command, "Executing handler");
            let ctx = Arc::new(base.scoped(name, outcome.rewrite.as_ref()));
            let result = guarded(execute(ctx)).await;

            if outcome.is_command {
                report.attempted = Some(name.to_string());
            }

            match result {
                Ok(()) if outcome.is_command => {
                    if slot.is_some() {
                        self.record_cooldown(descriptor, base).await;
                    }
                    return Some(Arc::clone(descriptor));
                }
                Ok(()) => report.passives.push(name.to_string()),
                Err(fault) => {
                    error!(handler = name, error = %fault, "Handler failed");
                    report.faulted.push(name.to_string());
                    if outcome.is_command {
                        let notice = inner.replies.error(name, &fault.to_string());
                        self.notify(base, &notice).await;
                    }
                }
            }

            if outcome.is_command {
                debug!(handler = name, "Command attempted, stopping matching");
                return None;
            }
        }

        None
    }

    /// Claims the in-flight slot for this sender and command, then checks the
    /// stored cooldown. `Err` carries the seconds remaining.
    async fn claim_cooldown(
        &self,
        descriptor: &HandlerDescriptor,
        base: &ExecutionContext,
    ) -> Result<GateSlot, u64> {
        let inner = &self.inner;
        let name = descriptor.name();
        let window = descriptor.cooldown_secs();

        let Some(slot) = inner.gate.try_acquire(base.sender(), name) else {
            return Err(window);
        };

        // Re-read so a dispatch that finished while this one was running is seen.
        let now = inner.clock.now_millis();
        let seed = UserRecord::seed(base.message(), now);
        let status = match inner.store.load_user(base.sender(), seed).await {
            Ok(fresh) => CooldownTracker::check(&fresh.cooldowns, name, window, now),
            Err(e) => {
                warn!(error = %e, "Failed to re-read sender record, using snapshot");
                CooldownTracker::check(&base.user().cooldowns, name, window, now)
            }
        };

        if status.can_use {
            Ok(slot)
        } else {
            Err(status.remaining_secs)
        }
    }

    async fn record_cooldown(&self, descriptor: &HandlerDescriptor, base: &ExecutionContext) {
        let inner = &self.inner;
        let name = descriptor.name().to_string();
        let now = inner.clock.now_millis();
        let update = Box::new(move |user: &mut UserRecord| {
            CooldownTracker::record(&mut user.cooldowns, &name, now);
        });
        if let Err(e) = inner.store.modify_user(base.sender(), update).await {
            error!(handler = descriptor.name(), error = %e, "Failed to record cooldown");
        }
    }

    async fn notify(&self, base: &ExecutionContext, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Err(e) = base.reply(text).await {
            warn!(error = %e, "Failed to send notice");
        }
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("handlers", &self.inner.registry.len())
            .field("extensions", &self.inner.extensions)
            .finish_non_exhaustive()
    }
}

impl Service<InboundMessage> for DispatchEngine {
    type Response = DispatchReport;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<DispatchReport, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, message: InboundMessage) -> Self::Future {
        let engine = self.clone();
        async move { Ok(engine.dispatch(message).await) }.boxed()
    }
}

// ============================================================================
// EngineBuilder
// ============================================================================

/// Builder for [`DispatchEngine`].
pub struct EngineBuilder {
    registry: Arc<HandlerRegistry>,
    store: BoxedStore,
    responder: BoxedResponder,
    clock: Arc<dyn Clock>,
    replies: ReplyTemplates,
    extensions: Extensions,
}

impl EngineBuilder {
    /// Replaces the wall clock used for cooldowns.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn replies(mut self, replies: ReplyTemplates) -> Self {
        self.replies = replies;
        self
    }

    /// Makes a shared client available to handlers through
    /// [`ExecutionContext::get`].
    pub fn extension<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Replaces the whole extension map.
    pub fn extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn build(self) -> DispatchEngine {
        DispatchEngine {
            inner: Arc::new(EngineInner {
                registry: self.registry,
                store: self.store,
                responder: self.responder,
                clock: self.clock,
                gate: CooldownGate::new(),
                replies: self.replies,
                extensions: Arc::new(self.extensions),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use akane_core::{
        MemoryStore, PrefixSet, SenderRoles, Store, StoreError, StoreResult, UserUpdate,
    };
    use async_trait::async_trait;
    use futures::future::{Ready, ready};
    use parking_lot::Mutex;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use super::*;
    use crate::context::tests::RecordingResponder;
    use crate::cooldown::ManualClock;
    use crate::descriptor::DescriptorBuilder;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Harness {
        engine: DispatchEngine,
        store: Arc<MemoryStore>,
        responder: Arc<RecordingResponder>,
        clock: Arc<ManualClock>,
    }

    fn harness(registry: HandlerRegistry) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(RecordingResponder::default());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let engine = DispatchEngine::builder(registry, store.clone(), responder.clone())
            .clock(clock.clone())
            .build();
        Harness {
            engine,
            store,
            responder,
            clock,
        }
    }

    fn msg(body: &str) -> InboundMessage {
        InboundMessage::builder("m1", "alice@s", "alice@s")
            .body(body)
            .prefixes(&PrefixSet::new(["!"]))
            .build()
    }

    fn group_msg(body: &str, metadata_resolved: bool) -> InboundMessage {
        InboundMessage::builder("m2", "alice@s", "room@g")
            .body(body)
            .group(true)
            .group_exists(metadata_resolved)
            .prefixes(&PrefixSet::new(["!"]))
            .build()
    }

    fn command(name: &str, token: &str) -> DescriptorBuilder {
        HandlerDescriptor::builder(name).command(token)
    }

    fn passive(name: &str) -> DescriptorBuilder {
        HandlerDescriptor::builder(name)
    }

    fn log_as(
        log: &Log,
        entry: &'static str,
    ) -> impl Fn(Arc<ExecutionContext>) -> Ready<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_ctx| {
            log.lock().push(entry.to_string());
            ready(())
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().clone()
    }

    #[tokio::test]
    async fn test_passive_then_command_then_stop() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(passive("b").execute(log_as(&log, "b")).build())
            .register(command("a", "ping").execute(log_as(&log, "a")).build())
            .register(command("c", "ping").execute(log_as(&log, "c")).build())
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("!ping")).await;

        assert_eq!(entries(&log), ["b", "a"]);
        assert_eq!(report.executed.as_deref(), Some("a"));
        assert_eq!(report.passives, ["b"]);
        assert!(report.handled());
    }

    #[tokio::test]
    async fn test_passive_after_the_winner_is_not_reached() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(command("a", "ping").execute(log_as(&log, "a")).build())
            .register(passive("b").execute(log_as(&log, "b")).build())
            .build()
            .unwrap();
        let h = harness(registry);

        h.engine.dispatch(msg("!ping")).await;
        assert_eq!(entries(&log), ["a"]);
    }

    #[tokio::test]
    async fn test_missing_prefix_blocks_prefixed_commands() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(
                command("ping", "ping")
                    .execute(log_as(&log, "ping"))
                    .build(),
            )
            .register(passive("watch").execute(log_as(&log, "watch")).build())
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("ping")).await;

        assert_eq!(entries(&log), ["watch"]);
        assert_eq!(report.executed, None);
        assert_eq!(report.attempted, None);
    }

    #[tokio::test]
    async fn test_no_command_match_records_no_cooldown() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(
                command("daily", "daily")
                    .cooldown(60)
                    .execute(log_as(&log, "daily"))
                    .build(),
            )
            .register(
                passive("antilink")
                    .execute(log_as(&log, "antilink"))
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("hello there")).await;

        assert_eq!(entries(&log), ["antilink"]);
        assert!(report.executed.is_none());
        assert!(h.store.user("alice@s").unwrap().cooldowns.is_empty());
    }

    #[tokio::test]
    async fn test_denial_notifies_and_continues() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(
                command("restart", "restart")
                    .owner_only()
                    .execute(log_as(&log, "restart"))
                    .build(),
            )
            .register(
                command("fallback", "restart")
                    .execute(log_as(&log, "fallback"))
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("!restart")).await;

        assert_eq!(entries(&log), ["fallback"]);
        assert_eq!(report.denied, [("restart".to_string(), Denial::Owner)]);
        assert_eq!(h.responder.replies(), [ReplyTemplates::default().owner]);
        assert_eq!(report.executed.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_group_check_reported_before_admin() {
        let registry = HandlerRegistry::builder()
            .register(
                command("kick", "kick")
                    .group_only()
                    .admin_only()
                    .execute(|_ctx| async {})
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("!kick")).await;
        assert_eq!(report.denied, [("kick".to_string(), Denial::Group)]);
    }

    #[tokio::test]
    async fn test_group_settings_gate_through_dispatch() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(
                command("hentai", "nsfw")
                    .nsfw()
                    .execute(log_as(&log, "hentai"))
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(group_msg("!nsfw", true)).await;
        assert_eq!(report.denied, [("hentai".to_string(), Denial::Nsfw)]);
        assert!(h.store.group("room@g").is_some());

        // Unresolved group metadata still leaves the stored setting in charge.
        let report = h.engine.dispatch(group_msg("!nsfw", false)).await;
        assert_eq!(report.denied, [("hentai".to_string(), Denial::Nsfw)]);
        assert_eq!(report.executed, None);
        assert!(entries(&log).is_empty());
        assert_eq!(h.store.group("room@g").map(|g| g.nsfw), Some(false));
    }

    #[tokio::test]
    async fn test_cooldown_blocks_until_window_elapses() {
        let registry = HandlerRegistry::builder()
            .register(
                command("daily", "daily")
                    .cooldown(5)
                    .execute(|_ctx| async { "claimed" })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let first = h.engine.dispatch(msg("!daily")).await;
        assert_eq!(first.executed.as_deref(), Some("daily"));
        assert_eq!(
            h.store.user("alice@s").unwrap().cooldowns.get("daily"),
            Some(&1_000_000)
        );

        h.clock.advance(2_000);
        let second = h.engine.dispatch(msg("!daily")).await;
        assert_eq!(second.executed, None);
        assert_eq!(second.cooldown_blocked, [("daily".to_string(), 3)]);

        h.clock.advance(3_000);
        let third = h.engine.dispatch(msg("!daily")).await;
        assert_eq!(third.executed.as_deref(), Some("daily"));

        assert_eq!(
            h.responder.replies(),
            [
                "claimed",
                "⏳ Please wait 3 seconds before using the *daily* command again.",
                "claimed",
            ]
        );
    }

    #[tokio::test]
    async fn test_cooldown_is_shared_across_chats() {
        let registry = HandlerRegistry::builder()
            .register(
                command("daily", "daily")
                    .cooldown(30)
                    .execute(|_ctx| async {})
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        h.engine.dispatch(msg("!daily")).await;
        let report = h.engine.dispatch(group_msg("!daily", true)).await;
        assert_eq!(report.cooldown_blocked, [("daily".to_string(), 30)]);
    }

    #[tokio::test]
    async fn test_failed_command_does_not_refresh_cooldown() {
        let log = Log::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let registry = HandlerRegistry::builder()
            .register(
                command("flaky", "flaky")
                    .cooldown(60)
                    .execute(move |_ctx| {
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        async move {
                            if n == 0 {
                                Err("first try fails")
                            } else {
                                Ok(())
                            }
                        }
                    })
                    .build(),
            )
            .register(
                command("shadow", "flaky")
                    .execute(log_as(&log, "shadow"))
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let first = h.engine.dispatch(msg("!flaky")).await;
        assert_eq!(first.faulted, ["flaky"]);
        assert_eq!(first.attempted.as_deref(), Some("flaky"));
        assert_eq!(first.executed, None);
        assert!(entries(&log).is_empty());
        assert!(h.store.user("alice@s").unwrap().cooldowns.is_empty());
        assert_eq!(
            h.responder.replies(),
            ["❌ Error executing command: first try fails"]
        );

        let second = h.engine.dispatch(msg("!flaky")).await;
        assert_eq!(second.executed.as_deref(), Some("flaky"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_handlers_are_contained() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(
                passive("crashy_passive")
                    .execute(|_ctx| async {
                        if true {
                            panic!("passive blew up");
                        }
                    })
                    .build(),
            )
            .register(
                command("ping", "ping")
                    .execute(log_as(&log, "ping"))
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("!ping")).await;

        assert_eq!(report.faulted, ["crashy_passive"]);
        assert_eq!(report.executed.as_deref(), Some("ping"));
        // Passive faults are logged, not reported to the sender.
        assert!(h.responder.replies().is_empty());
    }

    #[tokio::test]
    async fn test_no_prefix_rewrite_is_scoped_to_its_handler() {
        let log = Log::default();
        let seen = Arc::clone(&log);
        let observed = Arc::clone(&log);
        let registry = HandlerRegistry::builder()
            .register(
                command("play", "play")
                    .no_prefix()
                    .owner_only()
                    .execute(|_ctx| async {})
                    .build(),
            )
            .register(
                passive("observer")
                    .execute(move |ctx: Arc<ExecutionContext>| {
                        observed.lock().push(format!("observer:{}", ctx.command()));
                        ready(())
                    })
                    .build(),
            )
            .register(
                HandlerDescriptor::builder("eval")
                    .commands([">", "play"])
                    .no_prefix()
                    .execute(move |ctx: Arc<ExecutionContext>| {
                        let args = ctx.args().join(",");
                        seen.lock().push(format!("eval:{}:{args}", ctx.command()));
                        ready(())
                    })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("Play imagine dragons")).await;

        assert_eq!(report.denied, [("play".to_string(), Denial::Owner)]);
        assert_eq!(entries(&log), ["observer:", "eval:play:imagine,dragons"]);
    }

    fn winner_recorder(log: &Log) -> DescriptorBuilder {
        let log = Arc::clone(log);
        passive("audit").after(move |_ctx, executed: Option<Arc<HandlerDescriptor>>| {
            let winner = executed.map(|d| d.name().to_string()).unwrap_or_default();
            log.lock().push(format!("after:{winner}"));
            ready(())
        })
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_and_isolate_faults() {
        let log = Log::default();
        let greeter_log = Arc::clone(&log);
        let registry = HandlerRegistry::builder()
            .register(
                winner_recorder(&log)
                    .before(|_ctx| async { Err::<(), _>("audit backend down") })
                    .build(),
            )
            .register(
                passive("greeter")
                    .before(move |_ctx| {
                        greeter_log.lock().push("before:greeter".to_string());
                        ready(())
                    })
                    .build(),
            )
            .register(
                command("ping", "ping")
                    .execute(|_ctx| async { "pong" })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("!ping")).await;
        assert_eq!(entries(&log), ["before:greeter", "after:ping"]);
        assert_eq!(report.hook_faults, ["audit"]);
        assert_eq!(h.responder.replies(), ["pong"]);

        h.engine.dispatch(msg("just chatting")).await;
        assert_eq!(entries(&log).last().map(String::as_str), Some("after:"));
    }

    #[tokio::test]
    async fn test_after_hooks_see_no_winner_when_the_command_faults() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(winner_recorder(&log).build())
            .register(
                command("broken", "broken")
                    .execute(|_ctx| async { Err::<(), _>("database is on fire") })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let report = h.engine.dispatch(msg("!broken")).await;

        assert_eq!(report.attempted.as_deref(), Some("broken"));
        assert_eq!(report.faulted, ["broken"]);
        assert_eq!(report.executed, None);
        assert_eq!(entries(&log), ["after:"]);
    }

    #[tokio::test]
    async fn test_before_hook_state_reaches_handler() {
        #[derive(Clone)]
        struct Stamp(&'static str);

        let registry = HandlerRegistry::builder()
            .register(
                passive("stamper")
                    .before(|ctx: Arc<ExecutionContext>| async move {
                        ctx.set_state(Stamp("stamped"))
                    })
                    .build(),
            )
            .register(
                command("check", "check")
                    .execute(|ctx: Arc<ExecutionContext>| async move {
                        ctx.get_state::<Stamp>().map(|s| s.0)
                    })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        h.engine.dispatch(msg("!check")).await;
        assert_eq!(h.responder.replies(), ["stamped"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_dispatches_fire_a_cooldown_command_once() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let (s, r, n) = (started.clone(), release.clone(), runs.clone());
        let registry = HandlerRegistry::builder()
            .register(
                command("slow", "slow")
                    .cooldown(10)
                    .execute(move |_ctx| {
                        let (s, r, n) = (s.clone(), r.clone(), n.clone());
                        async move {
                            n.fetch_add(1, Ordering::SeqCst);
                            s.notify_one();
                            r.notified().await;
                        }
                    })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let engine = h.engine.clone();
        let first = tokio::spawn(async move { engine.dispatch(msg("!slow")).await });
        started.notified().await;

        let second = h.engine.dispatch(msg("!slow")).await;
        assert_eq!(second.cooldown_blocked, [("slow".to_string(), 10)]);

        release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.executed.as_deref(), Some("slow"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_owner_seed_grants_premium_commands() {
        let registry = HandlerRegistry::builder()
            .register(
                command("vip", "vip")
                    .vip_only()
                    .execute(|_ctx| async { "welcome" })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);
        let message = InboundMessage::builder("m1", "boss@s", "boss@s")
            .body("!vip")
            .roles(SenderRoles {
                owner: true,
                ..Default::default()
            })
            .prefixes(&PrefixSet::new(["!"]))
            .build();

        let report = h.engine.dispatch(message).await;
        assert_eq!(report.executed.as_deref(), Some("vip"));
    }

    #[tokio::test]
    async fn test_extensions_are_visible_to_handlers() {
        let registry = HandlerRegistry::builder()
            .register(
                command("quota", "quota")
                    .execute(|ctx: Arc<ExecutionContext>| async move {
                        ctx.get::<u32>().map(|q| format!("quota {q}"))
                    })
                    .build(),
            )
            .build()
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(RecordingResponder::default());
        let engine = DispatchEngine::builder(registry, store, responder.clone())
            .extension(Arc::new(25u32))
            .build();

        engine.dispatch(msg("!quota")).await;
        assert_eq!(responder.replies(), ["quota 25"]);
    }

    struct OfflineStore;

    #[async_trait]
    impl Store for OfflineStore {
        async fn load_user(&self, _id: &str, _seed: UserRecord) -> StoreResult<UserRecord> {
            Err(StoreError::Unavailable("offline".into()))
        }

        async fn load_group(&self, _id: &str, _seed: GroupRecord) -> StoreResult<GroupRecord> {
            Err(StoreError::Unavailable("offline".into()))
        }

        async fn modify_user(&self, _id: &str, _update: UserUpdate) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_aborts_quietly() {
        let log = Log::default();
        let registry = HandlerRegistry::builder()
            .register(
                command("ping", "ping")
                    .execute(log_as(&log, "ping"))
                    .build(),
            )
            .build()
            .unwrap();
        let responder = Arc::new(RecordingResponder::default());
        let engine =
            DispatchEngine::builder(registry, Arc::new(OfflineStore), responder.clone()).build();

        let report = engine.dispatch(msg("!ping")).await;

        assert!(report.aborted.is_some());
        assert!(entries(&log).is_empty());
        assert!(responder.replies().is_empty());
    }

    #[tokio::test]
    async fn test_serves_as_a_tower_service() {
        let registry = HandlerRegistry::builder()
            .register(
                command("ping", "ping")
                    .execute(|_ctx| async { "pong" })
                    .build(),
            )
            .build()
            .unwrap();
        let h = harness(registry);

        let mut engine = h.engine.clone();
        let mut task = tokio_test::task::spawn(());
        tokio_test::assert_ready_ok!(task.enter(|cx, _| engine.poll_ready(cx)));

        let report = h.engine.clone().oneshot(msg("!ping")).await.unwrap();
        assert_eq!(report.executed.as_deref(), Some("ping"));
        assert_eq!(report.message_id, "m1");
    }
}
