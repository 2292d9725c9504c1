//! Handler descriptors.
//!
//! A [`HandlerDescriptor`] is the static declaration of one handler: its
//! invocation tokens, the gates it needs to pass, its cooldown window, and up
//! to three optional callables (before hook, command body, after hook).
//!
//! Descriptors are built once at startup and never change afterwards.
//!
//! ```rust,ignore
//! let menu = HandlerDescriptor::builder("menu")
//!     .commands(["menu", "help"])
//!     .category("general")
//!     .description("List available commands")
//!     .cooldown(3)
//!     .execute(|ctx| async move { render_menu(&ctx) })
//!     .build();
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::handler::{erase_after, erase_execute, AfterHookFn, ExecuteFn, HandlerOutput, HookFn};

/// How a descriptor is invoked, derived from its declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    /// No tokens; runs for every message that passes its gates.
    Passive,
    /// Invoked by `<prefix><token>`.
    PrefixedCommand,
    /// Invoked by a body starting with `<token>` and no prefix.
    NoPrefixCommand,
}

/// Boolean gates a descriptor requires before it may execute.
///
/// Gates are checked in declaration order; the first one that fails is
/// reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub group: bool,
    pub private: bool,
    pub real_owner: bool,
    pub owner: bool,
    pub admin: bool,
    pub bot_admin: bool,
    pub premium: bool,
    pub vip: bool,
    pub quoted: bool,
    pub nsfw: bool,
    pub game: bool,
}

impl Requirements {
    /// Returns `true` when no gate is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// HandlerDescriptor
// ============================================================================

/// The static declaration of one handler.
pub struct HandlerDescriptor {
    name: String,
    tokens: Vec<String>,
    no_prefix: bool,
    grammar: Grammar,
    category: Option<String>,
    description: Option<String>,
    usage: Option<String>,
    requirements: Requirements,
    cooldown_secs: u64,
    before: Option<HookFn>,
    execute: Option<ExecuteFn>,
    after: Option<AfterHookFn>,
}

impl HandlerDescriptor {
    /// Starts building a descriptor with the given unique name.
    pub fn builder(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    /// The unique handler name. Also used as the cooldown key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invocation tokens, lowercased. Empty for passive handlers.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The invocation grammar.
    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Returns `true` when the descriptor declares at least one token.
    pub fn is_command(&self) -> bool {
        self.grammar != Grammar::Passive
    }

    /// Whether the no-prefix grammar was requested. Meaningless without tokens.
    pub fn is_no_prefix(&self) -> bool {
        self.no_prefix
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn usage(&self) -> Option<&str> {
        self.usage.as_deref()
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Cooldown window in seconds; zero disables it.
    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    pub fn before(&self) -> Option<&HookFn> {
        self.before.as_ref()
    }

    pub fn execute(&self) -> Option<&ExecuteFn> {
        self.execute.as_ref()
    }

    pub fn after(&self) -> Option<&AfterHookFn> {
        self.after.as_ref()
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("tokens", &self.tokens)
            .field("grammar", &self.grammar)
            .field("requirements", &self.requirements)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("has_before", &self.before.is_some())
            .field("has_execute", &self.execute.is_some())
            .field("has_after", &self.after.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DescriptorBuilder
// ============================================================================

/// Builder for [`HandlerDescriptor`].
pub struct DescriptorBuilder {
    name: String,
    tokens: Vec<String>,
    no_prefix: bool,
    category: Option<String>,
    description: Option<String>,
    usage: Option<String>,
    requirements: Requirements,
    cooldown_secs: u64,
    before: Option<HookFn>,
    execute: Option<ExecuteFn>,
    after: Option<AfterHookFn>,
}

impl DescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokens: Vec::new(),
            no_prefix: false,
            category: None,
            description: None,
            usage: None,
            requirements: Requirements::default(),
            cooldown_secs: 0,
            before: None,
            execute: None,
            after: None,
        }
    }

    /// Adds one invocation token.
    pub fn command(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    /// Adds several invocation tokens.
    pub fn commands<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Matches tokens against the start of the body instead of after a prefix.
    pub fn no_prefix(mut self) -> Self {
        self.no_prefix = true;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Cooldown window in seconds.
    pub fn cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    /// Replaces all gates at once.
    pub fn requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn group_only(mut self) -> Self {
        self.requirements.group = true;
        self
    }

    pub fn private_only(mut self) -> Self {
        self.requirements.private = true;
        self
    }

    pub fn real_owner_only(mut self) -> Self {
        self.requirements.real_owner = true;
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.requirements.owner = true;
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.requirements.admin = true;
        self
    }

    pub fn bot_admin_required(mut self) -> Self {
        self.requirements.bot_admin = true;
        self
    }

    pub fn premium_only(mut self) -> Self {
        self.requirements.premium = true;
        self
    }

    pub fn vip_only(mut self) -> Self {
        self.requirements.vip = true;
        self
    }

    pub fn requires_quoted(mut self) -> Self {
        self.requirements.quoted = true;
        self
    }

    /// Requires the group's NSFW setting to be enabled.
    pub fn nsfw(mut self) -> Self {
        self.requirements.nsfw = true;
        self
    }

    /// Requires the group's game setting to be enabled.
    pub fn game(mut self) -> Self {
        self.requirements.game = true;
        self
    }

    /// Sets the command body.
    pub fn execute<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: HandlerOutput,
    {
        self.execute = Some(erase_execute(f));
        self
    }

    /// Sets the before hook, run for every message ahead of matching.
    pub fn before<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: HandlerOutput,
    {
        self.before = Some(erase_execute(f));
        self
    }

    /// Sets the after hook, run for every message once matching is done.
    pub fn after<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<ExecutionContext>, Option<Arc<HandlerDescriptor>>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: HandlerOutput,
    {
        self.after = Some(erase_after(f));
        self
    }

    /// Finishes the descriptor. Tokens are lowercased and deduplicated;
    /// the grammar is derived from them.
    pub fn build(self) -> HandlerDescriptor {
        let mut tokens: Vec<String> = Vec::with_capacity(self.tokens.len());
        for token in self.tokens {
            let token = token.trim().to_lowercase();
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }

        let grammar = match (tokens.is_empty(), self.no_prefix) {
            (true, _) => Grammar::Passive,
            (false, false) => Grammar::PrefixedCommand,
            (false, true) => Grammar::NoPrefixCommand,
        };

        HandlerDescriptor {
            name: self.name,
            tokens,
            no_prefix: self.no_prefix,
            grammar,
            category: self.category,
            description: self.description,
            usage: self.usage,
            requirements: self.requirements,
            cooldown_secs: self.cooldown_secs,
            before: self.before,
            execute: self.execute,
            after: self.after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grammar_is_derived_from_tokens() {
        let passive = HandlerDescriptor::builder("antilink").build();
        assert_eq!(passive.grammar(), Grammar::Passive);
        assert!(!passive.is_command());

        let passive_no_prefix = HandlerDescriptor::builder("watch").no_prefix().build();
        assert_eq!(passive_no_prefix.grammar(), Grammar::Passive);

        let prefixed = HandlerDescriptor::builder("ping").command("ping").build();
        assert_eq!(prefixed.grammar(), Grammar::PrefixedCommand);

        let bare = HandlerDescriptor::builder("eval")
            .commands([">", "ev"])
            .no_prefix()
            .build();
        assert_eq!(bare.grammar(), Grammar::NoPrefixCommand);
    }

    #[test]
    fn test_tokens_are_lowercased_and_deduplicated() {
        let d = HandlerDescriptor::builder("menu")
            .commands(["Menu", "HELP", "menu"])
            .build();
        assert_eq!(d.tokens(), ["menu", "help"]);
    }

    #[test]
    fn test_requirement_setters_toggle_gates() {
        let d = HandlerDescriptor::builder("kick")
            .command("kick")
            .group_only()
            .admin_only()
            .bot_admin_required()
            .build();
        let r = d.requirements();
        assert!(r.group && r.admin && r.bot_admin);
        assert!(!r.owner && !r.private);
        assert!(!r.is_empty());
        assert!(Requirements::default().is_empty());
    }
}
