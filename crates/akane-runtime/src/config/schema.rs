//! Configuration schema definitions.
//!
//! ```toml
//! [bot]
//! name = "Akane"
//! prefixes = ["!", "."]
//! owners = ["6281234567890@s.whatsapp.net"]
//! real_owners = ["6281234567890@s.whatsapp.net"]
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [logging.filters]
//! akane_framework = "trace"
//!
//! [store]
//! path = "data/database.json"
//! autosave_secs = 30
//!
//! [replies]
//! owner = "Owner only."
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use akane_core::{PrefixSet, SenderRoles};
use akane_framework::ReplyTemplates;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AkaneConfig {
    /// Identity, prefixes and owners.
    pub bot: BotConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Record persistence.
    pub store: StoreConfig,

    /// User-facing notices sent by the dispatcher.
    pub replies: ReplyTemplates,
}

// =============================================================================
// Bot
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Display name, used in logs and menus.
    pub name: String,

    /// Command prefixes. The longest one matching a body wins.
    pub prefixes: Vec<String>,

    /// Sender ids with the owner role.
    pub owners: Vec<String>,

    /// Sender ids with the real-owner role. Every real owner is also an owner.
    pub real_owners: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Akane".to_string(),
            prefixes: ["!", ".", "/", "#"].map(String::from).to_vec(),
            owners: Vec::new(),
            real_owners: Vec::new(),
        }
    }
}

impl BotConfig {
    pub fn prefix_set(&self) -> PrefixSet {
        PrefixSet::new(&self.prefixes)
    }

    /// The configured roles of `sender`.
    pub fn roles_for(&self, sender: &str) -> SenderRoles {
        let real_owner = self.real_owners.iter().any(|id| id == sender);
        SenderRoles {
            real_owner,
            owner: real_owner || self.owners.iter().any(|id| id == sender),
            ..Default::default()
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Newline-delimited JSON. Needs the `json-log` feature; falls back to
    /// `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    pub file_path: Option<PathBuf>,

    pub thread_ids: bool,

    /// Include source file and line.
    pub file_location: bool,

    pub span_events: SpanEventConfig,

    /// Per-target levels, e.g. `akane_framework = "trace"`.
    pub filters: HashMap<String, LogLevel>,

    pub rotation: LogRotation,

    /// Rotated files to keep; zero keeps all of them.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
            rotation: LogRotation::Never,
            max_files: 5,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON database file.
    pub path: PathBuf,

    /// Seconds between background saves; zero disables them. The store is
    /// always saved on shutdown.
    pub autosave_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/database.json"),
            autosave_secs: 30,
        }
    }
}
