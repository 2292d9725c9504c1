//! Command matching.
//!
//! Two grammars are supported:
//!
//! ```text
//! prefixed   "!Ping now"   prefix "!"  command "ping"  text "now"
//! no-prefix  "ev 1 + 1"    token "ev"  text "1 + 1"    args ["1", "+", "1"]
//! ```
//!
//! Matching never mutates the inbound message. When a no-prefix match needs
//! the invocation fields recomputed, the outcome carries an [`Invocation`] that
//! the dispatcher applies to a copy scoped to that one handler.

use akane_core::InboundMessage;

use crate::descriptor::{Grammar, HandlerDescriptor};

/// Invocation fields recomputed for a no-prefix match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The matched token.
    pub command: String,
    /// Recomputed `(text, args)`, present only when the body had a trailing
    /// argument portion.
    pub arguments: Option<(String, Vec<String>)>,
}

impl Invocation {
    /// Writes the invocation into a message copy.
    pub fn apply(&self, message: &mut InboundMessage) {
        message.command = self.command.clone();
        if let Some((text, args)) = &self.arguments {
            message.text = text.clone();
            message.args = args.clone();
        }
    }
}

/// Result of matching one descriptor against one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Whether the descriptor's body should run.
    pub should_execute: bool,
    /// Whether the descriptor is a command (as opposed to a passive handler).
    pub is_command: bool,
    /// Fields to apply to the handler's view of the message.
    pub rewrite: Option<Invocation>,
}

impl MatchOutcome {
    fn skip(is_command: bool) -> Self {
        Self {
            should_execute: false,
            is_command,
            rewrite: None,
        }
    }
}

/// Decides whether a descriptor applies to a message.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandMatcher;

impl CommandMatcher {
    pub fn matches(descriptor: &HandlerDescriptor, message: &InboundMessage) -> MatchOutcome {
        match descriptor.grammar() {
            Grammar::Passive => MatchOutcome {
                should_execute: true,
                is_command: false,
                rewrite: None,
            },
            Grammar::PrefixedCommand => Self::match_prefixed(descriptor, message),
            Grammar::NoPrefixCommand => Self::match_no_prefix(descriptor, message),
        }
    }

    fn match_prefixed(descriptor: &HandlerDescriptor, message: &InboundMessage) -> MatchOutcome {
        if !message.has_prefix() || !message.body.starts_with(&message.prefix) {
            return MatchOutcome::skip(false);
        }
        let command = message.command.to_lowercase();
        MatchOutcome {
            should_execute: descriptor.tokens().iter().any(|t| *t == command),
            is_command: true,
            rewrite: None,
        }
    }

    fn match_no_prefix(descriptor: &HandlerDescriptor, message: &InboundMessage) -> MatchOutcome {
        for token in descriptor.tokens() {
            let Some(rest) = strip_token(&message.body, token) else {
                continue;
            };

            let arguments = if rest.is_empty() {
                None
            } else if let Some(trailing) = rest.strip_prefix(' ') {
                let text = trailing.trim().to_string();
                let args = text.split_whitespace().map(str::to_string).collect();
                Some((text, args))
            } else {
                // "player" must not match "play".
                continue;
            };

            return MatchOutcome {
                should_execute: true,
                is_command: true,
                rewrite: Some(Invocation {
                    command: token.clone(),
                    arguments,
                }),
            };
        }
        MatchOutcome::skip(true)
    }
}

/// Strips a lowercase `token` from the start of `body`, comparing
/// case-insensitively, and returns the untouched remainder.
fn strip_token<'a>(body: &'a str, token: &str) -> Option<&'a str> {
    let mut folded = String::with_capacity(token.len());
    for (idx, ch) in body.char_indices() {
        if folded.len() >= token.len() {
            return (folded == token).then(|| &body[idx..]);
        }
        folded.extend(ch.to_lowercase());
        if !token.starts_with(folded.as_str()) {
            return None;
        }
    }
    (folded == token).then_some("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use akane_core::PrefixSet;

    fn message(body: &str) -> InboundMessage {
        let prefixes = PrefixSet::new(["!", "."]);
        InboundMessage::builder("m1", "alice@s", "alice@s")
            .body(body)
            .prefixes(&prefixes)
            .build()
    }

    fn prefixed() -> HandlerDescriptor {
        HandlerDescriptor::builder("ping").commands(["ping", "p"]).build()
    }

    fn bare() -> HandlerDescriptor {
        HandlerDescriptor::builder("play")
            .command("play")
            .no_prefix()
            .build()
    }

    #[test]
    fn test_passive_always_executes() {
        let d = HandlerDescriptor::builder("antilink").build();
        let outcome = CommandMatcher::matches(&d, &message("hello"));
        assert!(outcome.should_execute);
        assert!(!outcome.is_command);
    }

    #[test]
    fn test_prefixed_matches_any_token_case_insensitively() {
        let outcome = CommandMatcher::matches(&prefixed(), &message("!PING"));
        assert!(outcome.should_execute && outcome.is_command);
        assert_eq!(outcome.rewrite, None);

        assert!(CommandMatcher::matches(&prefixed(), &message(".p")).should_execute);
    }

    #[test]
    fn test_prefixed_requires_prefix() {
        let outcome = CommandMatcher::matches(&prefixed(), &message("ping"));
        assert!(!outcome.should_execute);
    }

    #[test]
    fn test_prefixed_rejects_other_commands() {
        let outcome = CommandMatcher::matches(&prefixed(), &message("!pong"));
        assert!(!outcome.should_execute);
        assert!(outcome.is_command);
    }

    #[test]
    fn test_no_prefix_exact_match_keeps_arguments() {
        let outcome = CommandMatcher::matches(&bare(), &message("Play"));
        assert!(outcome.should_execute);
        let rewrite = outcome.rewrite.unwrap();
        assert_eq!(rewrite.command, "play");
        assert_eq!(rewrite.arguments, None);
    }

    #[test]
    fn test_no_prefix_recomputes_arguments() {
        let outcome = CommandMatcher::matches(&bare(), &message("play  Bohemian   Rhapsody "));
        let rewrite = outcome.rewrite.unwrap();
        let (text, args) = rewrite.arguments.unwrap();
        assert_eq!(text, "Bohemian   Rhapsody");
        assert_eq!(args, ["Bohemian", "Rhapsody"]);
    }

    #[test]
    fn test_no_prefix_requires_delimiter() {
        let outcome = CommandMatcher::matches(&bare(), &message("player one"));
        assert!(!outcome.should_execute);
        assert!(outcome.is_command);
    }

    #[test]
    fn test_no_prefix_handles_symbol_tokens() {
        let d = HandlerDescriptor::builder("eval")
            .commands([">", "ev"])
            .no_prefix()
            .build();
        let outcome = CommandMatcher::matches(&d, &message("> 1 + 1"));
        let rewrite = outcome.rewrite.unwrap();
        assert_eq!(rewrite.command, ">");
        assert_eq!(rewrite.arguments.unwrap().1, ["1", "+", "1"]);
    }

    #[test]
    fn test_invocation_applies_to_a_copy() {
        let original = message("play song");
        let outcome = CommandMatcher::matches(&bare(), &original);
        let mut scoped = original.clone();
        outcome.rewrite.unwrap().apply(&mut scoped);

        assert_eq!(scoped.command, "play");
        assert_eq!(scoped.text, "song");
        assert_eq!(original.command, "");
    }

    #[test]
    fn test_strip_token_folds_case_without_touching_remainder() {
        assert_eq!(strip_token("ÉCHO Hi", "écho"), Some(" Hi"));
        assert_eq!(strip_token("ev", "ev"), Some(""));
        assert_eq!(strip_token("e", "ev"), None);
        assert_eq!(strip_token("eval", "ev"), Some("al"));
    }
}
