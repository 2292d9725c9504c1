//! Console Bot Example
//!
//! Every line typed on stdin is one inbound message from `--sender`; replies
//! are printed to stdout. Handlers are registered with `submit_handler!` and
//! collected by the runtime at startup.
//!
//! ```text
//! stdin ──line──▶ mpsc ──▶ ConsoleNormalizer ──▶ AkaneRuntime ──▶ ConsoleResponder ──▶ stdout
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --config demos/console_bot/akane.toml
//! cargo run --package console-bot -- --sender alice --group lounge
//! ```
//!
//! Try `!menu`, `!ping`, `!roll 20`, `> hello` (real owner only) or, in a
//! group, a message containing an invite link.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use akane::prelude::*;
use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(version, about = "Chat with an Akane bot from the terminal")]
struct Args {
    /// Configuration file (defaults to akane.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Profile used to pick akane.{profile}.toml
    #[arg(short, long)]
    profile: Option<String>,

    /// Who the typed messages come from
    #[arg(short, long, default_value = "console")]
    sender: String,

    /// Pretend the messages are sent in this group chat
    #[arg(short, long)]
    group: Option<String>,
}

// ============================================================================
// Transport side
// ============================================================================

struct ConsoleNormalizer {
    sender: String,
    group: Option<String>,
    prefixes: PrefixSet,
    next_id: AtomicU64,
}

impl Normalizer for ConsoleNormalizer {
    type Raw = String;

    fn normalize(&self, raw: String) -> Option<InboundMessage> {
        let body = raw.trim();
        if body.is_empty() {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let chat = self.group.as_deref().unwrap_or(&self.sender);

        Some(
            InboundMessage::builder(format!("console-{id}"), self.sender.as_str(), chat)
                .body(body)
                .push_name(self.sender.as_str())
                .group(self.group.is_some())
                .group_exists(self.group.is_some())
                .prefixes(&self.prefixes)
                .build(),
        )
    }
}

struct ConsoleResponder;

#[async_trait]
impl Responder for ConsoleResponder {
    async fn reply(&self, message: &InboundMessage, text: &str) -> ResponderResult<()> {
        println!("[{}] {}", message.chat, text);
        Ok(())
    }

    async fn react(&self, message: &InboundMessage, emoji: &str) -> ResponderResult<()> {
        println!("[{}] ({emoji} on {})", message.chat, message.id);
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Counts commands that ran, shared through the engine's extensions.
#[derive(Default)]
struct Stats {
    commands: AtomicU64,
}

fn ping() -> HandlerDescriptor {
    HandlerDescriptor::builder("ping")
        .command("ping")
        .category("general")
        .description("Checks that the bot is alive")
        .cooldown(3)
        .execute(|ctx| async move {
            ctx.react("🏓").await?;
            Ok::<_, HandlerError>("Pong!")
        })
        .build()
}
submit_handler!(ping);

fn menu() -> HandlerDescriptor {
    HandlerDescriptor::builder("menu")
        .commands(["menu", "help"])
        .category("general")
        .description("Lists every command")
        .execute(|ctx| async move {
            let mut out = String::from("📜 Commands\n");
            for (category, handlers) in ctx.registry().by_category() {
                let _ = writeln!(out, "\n{category}");
                for handler in handlers {
                    let prefix = if handler.is_no_prefix() { "" } else { ctx.prefix() };
                    let token = handler.tokens().first().map(String::as_str).unwrap_or("");
                    let _ = writeln!(
                        out,
                        "  {prefix}{token} {}  {}",
                        handler.usage().unwrap_or(""),
                        handler.description().unwrap_or(""),
                    );
                }
            }
            out
        })
        .build()
}
submit_handler!(menu);

fn roll() -> HandlerDescriptor {
    HandlerDescriptor::builder("roll")
        .commands(["roll", "dice"])
        .category("fun")
        .description("Rolls a die")
        .usage("[sides]")
        .cooldown(10)
        .execute(|ctx| async move {
            let sides: u64 = match ctx.args().first() {
                Some(arg) => arg.parse().map_err(|_| format!("'{arg}' is not a number"))?,
                None => 6,
            };
            if sides == 0 {
                return Err(HandlerError::from("a die needs at least one side"));
            }
            let seed = akane::core::unix_millis() ^ ctx.sender().len() as u64;
            Ok::<_, HandlerError>(format!("🎲 {}", seed % sides + 1))
        })
        .build()
}
submit_handler!(roll);

fn stats() -> HandlerDescriptor {
    HandlerDescriptor::builder("stats")
        .command("stats")
        .category("owner")
        .description("Shows how many commands ran")
        .owner_only()
        .execute(|ctx| async move {
            let count = ctx
                .get::<Stats>()
                .map(|s| s.commands.load(Ordering::Relaxed))
                .unwrap_or_default();
            format!("📊 {count} commands since startup")
        })
        // Every command that executes successfully passes through here.
        .after(|ctx, executed| async move {
            if executed.is_some()
                && let Some(stats) = ctx.get::<Stats>()
            {
                stats.commands.fetch_add(1, Ordering::Relaxed);
            }
        })
        .build()
}
submit_handler!(stats);

fn echo() -> HandlerDescriptor {
    HandlerDescriptor::builder("echo")
        .no_prefix()
        .commands([">", "ev"])
        .category("owner")
        .description("Echoes the text back")
        .real_owner_only()
        .execute(|ctx| async move {
            match ctx.text() {
                "" => "Nothing to echo".to_string(),
                text => text.to_string(),
            }
        })
        .build()
}
submit_handler!(echo);

fn antilink() -> HandlerDescriptor {
    HandlerDescriptor::builder("antilink")
        .execute(|ctx| async move {
            let link = ctx.is_group() && ctx.message().body.contains("chat.whatsapp.com/");
            (link && !ctx.is_admin()).then_some("🚫 Group invite links are not allowed here")
        })
        .build()
}
submit_handler!(antilink);

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = AkaneRuntime::builder()
        .linked_handlers()
        .responder(Arc::new(ConsoleResponder))
        .extension(Arc::new(Stats::default()));
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build().await?;

    let normalizer = ConsoleNormalizer {
        sender: args.sender,
        group: args.group,
        prefixes: runtime.config().bot.prefix_set(),
        next_id: AtomicU64::new(0),
    };

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    info!("Type a message, Ctrl+D to quit");
    runtime.run(&normalizer, rx).await?;

    Ok(())
}
