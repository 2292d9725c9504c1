//! Normalized inbound messages.
//!
//! An [`InboundMessage`] is created once per raw transport event by a
//! [`Normalizer`](crate::Normalizer). The dispatch pipeline treats it as
//! read-only; the derived `command`/`text`/`args` fields are recomputed per
//! handler by the no-prefix grammar, on a scoped copy rather than in place.
//!
//! # Derived fields
//!
//! When the body starts with a configured prefix the builder derives:
//!
//! ```text
//! body:    "!play  imagine dragons"
//! prefix:  "!"
//! command: "play"                     (first token, lowercased)
//! text:    "imagine dragons"          (remainder, trimmed)
//! args:    ["imagine", "dragons"]     (remainder split on whitespace)
//! ```
//!
//! Without a prefix all three are empty.

use serde::{Deserialize, Serialize};

// ============================================================================
// Sender roles
// ============================================================================

/// Permission-relevant flags about the sender, resolved by the normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderRoles {
    /// The sender is one of the bot's real owners (the operator account).
    pub real_owner: bool,
    /// The sender is a configured owner. Real owners are always owners.
    pub owner: bool,
    /// The sender administers the group the message was sent in.
    pub admin: bool,
    /// The bot itself administers the group the message was sent in.
    pub bot_admin: bool,
}

/// Reference to the message being replied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    /// Identifier of the quoted message.
    pub id: String,
    /// Sender of the quoted message.
    pub sender: String,
    /// Text body of the quoted message (empty for media).
    #[serde(default)]
    pub body: String,
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A normalized chat event as seen by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport message identifier.
    pub id: String,
    /// Sender identifier.
    pub sender: String,
    /// Display name the sender advertised, if any.
    pub push_name: Option<String>,
    /// Chat identifier (group id or the private chat id).
    pub chat: String,
    /// Whether the chat is a group chat.
    pub is_group: bool,
    /// Whether group metadata for `chat` could be resolved.
    pub group_exists: bool,
    /// Raw body text.
    pub body: String,
    /// Detected prefix, empty if the body carries none.
    pub prefix: String,
    /// Derived command token (lowercase).
    pub command: String,
    /// Derived argument text.
    pub text: String,
    /// Derived argument list.
    pub args: Vec<String>,
    /// The message this one replies to.
    pub quoted: Option<QuotedMessage>,
    /// Mentioned user identifiers.
    pub mentions: Vec<String>,
    /// Sender role flags.
    pub roles: SenderRoles,
    /// Sent by the bot's own account.
    pub from_me: bool,
}

impl InboundMessage {
    /// Starts building a message for `sender` in `chat`.
    pub fn builder(
        id: impl Into<String>,
        sender: impl Into<String>,
        chat: impl Into<String>,
    ) -> MessageBuilder {
        MessageBuilder::new(id, sender, chat)
    }

    /// Returns `true` if a prefix was detected on the body.
    pub fn has_prefix(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Returns `true` if this message quotes another one.
    pub fn is_quoted(&self) -> bool {
        self.quoted.is_some()
    }
}

// ============================================================================
// PrefixSet
// ============================================================================

/// The set of configured command prefixes.
///
/// Detection prefers the longest matching prefix so that `"!!"` wins over
/// `"!"` when both are configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSet {
    prefixes: Vec<String>,
}

impl PrefixSet {
    /// Creates a prefix set, dropping empty entries and duplicates.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        prefixes.dedup();
        Self { prefixes }
    }

    /// Returns the longest configured prefix `body` starts with.
    pub fn detect(&self, body: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| body.starts_with(p.as_str()))
            .map(String::as_str)
    }

    /// Returns `true` if no prefix is configured.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Iterates the configured prefixes, longest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}

// ============================================================================
// MessageBuilder
// ============================================================================

/// Builder for [`InboundMessage`] that derives the command fields.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: InboundMessage,
    prefixes: Option<PrefixSet>,
    explicit_prefix: Option<String>,
}

impl MessageBuilder {
    fn new(id: impl Into<String>, sender: impl Into<String>, chat: impl Into<String>) -> Self {
        Self {
            message: InboundMessage {
                id: id.into(),
                sender: sender.into(),
                chat: chat.into(),
                ..Default::default()
            },
            prefixes: None,
            explicit_prefix: None,
        }
    }

    /// Sets the raw body text.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.message.body = body.into();
        self
    }

    /// Marks the chat as a group chat whose metadata resolved.
    pub fn group(mut self, is_group: bool) -> Self {
        self.message.is_group = is_group;
        self.message.group_exists = is_group;
        self
    }

    /// Overrides whether group metadata resolved.
    pub fn group_exists(mut self, exists: bool) -> Self {
        self.message.group_exists = exists;
        self
    }

    /// Sets the sender's advertised display name.
    pub fn push_name(mut self, name: impl Into<String>) -> Self {
        self.message.push_name = Some(name.into());
        self
    }

    /// Sets the quoted message reference.
    pub fn quoted(mut self, quoted: QuotedMessage) -> Self {
        self.message.quoted = Some(quoted);
        self
    }

    /// Adds a mentioned user.
    pub fn mention(mut self, user: impl Into<String>) -> Self {
        self.message.mentions.push(user.into());
        self
    }

    /// Sets the sender role flags.
    pub fn roles(mut self, roles: SenderRoles) -> Self {
        self.message.roles = roles;
        self
    }

    /// Marks the message as sent by the bot itself.
    pub fn from_me(mut self, from_me: bool) -> Self {
        self.message.from_me = from_me;
        self
    }

    /// Detects the prefix from the given set when building.
    pub fn prefixes(mut self, prefixes: &PrefixSet) -> Self {
        self.prefixes = Some(prefixes.clone());
        self
    }

    /// Uses `prefix` as the detected prefix if the body starts with it.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.explicit_prefix = Some(prefix.into());
        self
    }

    /// Finishes the message, deriving `prefix`, `command`, `text` and `args`.
    pub fn build(self) -> InboundMessage {
        let mut message = self.message;
        if message.roles.real_owner {
            message.roles.owner = true;
        }

        let detected = match (&self.explicit_prefix, &self.prefixes) {
            (Some(p), _) if !p.is_empty() && message.body.starts_with(p.as_str()) => {
                Some(p.clone())
            }
            (Some(_), _) => None,
            (None, Some(set)) => set.detect(&message.body).map(str::to_string),
            (None, None) => None,
        };

        if let Some(prefix) = detected {
            let rest = message.body[prefix.len()..].trim_start();
            let (command, remainder) = match rest.split_once(char::is_whitespace) {
                Some((command, remainder)) => (command, remainder.trim()),
                None => (rest, ""),
            };
            message.command = command.to_lowercase();
            message.text = remainder.to_string();
            message.args = remainder.split_whitespace().map(str::to_string).collect();
            message.prefix = prefix;
        }

        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_derives_command_fields() {
        let prefixes = PrefixSet::new(["!", "."]);
        let msg = InboundMessage::builder("1", "alice", "chat")
            .body("!Play  imagine dragons ")
            .prefixes(&prefixes)
            .build();

        assert_eq!(msg.prefix, "!");
        assert_eq!(msg.command, "play");
        assert_eq!(msg.text, "imagine dragons");
        assert_eq!(msg.args, vec!["imagine", "dragons"]);
    }

    #[test]
    fn test_builder_without_prefix_leaves_derived_fields_empty() {
        let prefixes = PrefixSet::new(["!"]);
        let msg = InboundMessage::builder("1", "alice", "chat")
            .body("play imagine dragons")
            .prefixes(&prefixes)
            .build();

        assert!(!msg.has_prefix());
        assert!(msg.command.is_empty());
        assert!(msg.text.is_empty());
        assert!(msg.args.is_empty());
    }

    #[test]
    fn test_explicit_prefix_must_start_the_body() {
        let msg = InboundMessage::builder("1", "alice", "chat")
            .body("ping")
            .prefix("!")
            .build();
        assert!(!msg.has_prefix());

        let msg = InboundMessage::builder("1", "alice", "chat")
            .body("!ping")
            .prefix("!")
            .build();
        assert_eq!(msg.command, "ping");
        assert!(msg.args.is_empty());
    }

    #[test]
    fn test_prefix_set_prefers_longest() {
        let prefixes = PrefixSet::new(["!", "!!", "", "!"]);
        assert_eq!(prefixes.iter().count(), 2);
        assert_eq!(prefixes.detect("!!menu"), Some("!!"));
        assert_eq!(prefixes.detect("!menu"), Some("!"));
        assert_eq!(prefixes.detect("menu"), None);
    }

    #[test]
    fn test_real_owner_implies_owner() {
        let msg = InboundMessage::builder("1", "op", "chat")
            .roles(SenderRoles {
                real_owner: true,
                ..Default::default()
            })
            .build();
        assert!(msg.roles.owner);
    }
}
