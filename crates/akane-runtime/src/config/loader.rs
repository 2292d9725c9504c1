//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`akane.{profile}.toml`)
//! 3. Main config file (`akane.toml` / `config.toml`)
//! 4. Environment variables (`AKANE_*`)
//! 5. Programmatic overrides
//!
//! YAML files (`akane.yaml`, `akane.yml`) are searched as well when the
//! `yaml-config` feature is enabled.
//!
//! # Environment Variable Mapping
//!
//! Variables use the `AKANE_` prefix with `__` as the section separator:
//!
//! - `AKANE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `AKANE_STORE__PATH=/var/lib/akane/db.json` → `store.path = "/var/lib/akane/db.json"`
//! - `AKANE_BOT__OWNERS=[alice,bob]` → `bot.owners = ["alice", "bob"]`
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/akane.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::AkaneConfig;

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `AKANE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("AKANE_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables `AKANE_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges values over every other source.
    pub fn merge(mut self, config: AkaneConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<AkaneConfig> {
        let profile = self.profile.clone();
        let config: AkaneConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            prefixes = config.bot.prefixes.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AkaneConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with AKANE_ prefix");
            figment = figment.merge(Env::prefixed("AKANE_").ignore(&["profile"]).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("akane"));
        }
        paths
    }

    /// Merges the profile file and then the base file from the first search
    /// path that has a base file.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let candidates = base_file_names();
        for dir in self.resolve_search_paths() {
            for base_name in &candidates {
                let base_path = dir.join(base_name);
                if !base_path.exists() {
                    continue;
                }

                if let Some((stem, ext)) = base_name.rsplit_once('.') {
                    let profile_path = dir.join(format!("{stem}.{}.{ext}", self.profile));
                    if profile_path.exists() {
                        debug!(path = %profile_path.display(), "Loading profile-specific config");
                        figment = merge_or_skip(figment, &profile_path);
                    }
                }

                info!(path = %base_path.display(), "Loading configuration file");
                return merge_or_skip(figment, &base_path);
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

fn base_file_names() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut names = Vec::new();
    #[cfg(feature = "toml-config")]
    names.extend(["akane.toml", "config.toml"]);
    #[cfg(feature = "yaml-config")]
    names.extend(["akane.yaml", "akane.yml", "config.yaml", "config.yml"]);
    names
}

/// Merges one file, dispatching on its extension. Only formats enabled by
/// features are accepted.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

fn merge_or_skip(figment: Figment, path: &Path) -> Figment {
    match merge_config_file(figment.clone(), path) {
        Ok(merged) => merged,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping configuration file");
            figment
        }
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<AkaneConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file, plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<AkaneConfig> {
    ConfigLoader::new().file(path).load()
}
