//! Configuration validation.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{AkaneConfig, BotConfig, LogOutput, LoggingConfig, StoreConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &AkaneConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    validate_store_config(&config.store)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.name.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.name"));
    }

    if bot.prefixes.is_empty() {
        return Err(ConfigError::validation("At least one command prefix is required"));
    }

    let mut seen = HashSet::new();
    for prefix in &bot.prefixes {
        if prefix.is_empty() {
            return Err(ConfigError::validation("Command prefixes cannot be empty"));
        }
        if prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Command prefix '{prefix}' contains whitespace"
            )));
        }
        if !seen.insert(prefix) {
            return Err(ConfigError::DuplicatePrefix(prefix.clone()));
        }
    }

    if bot
        .owners
        .iter()
        .chain(&bot.real_owners)
        .any(|id| id.trim().is_empty())
    {
        return Err(ConfigError::validation("Owner ids cannot be empty"));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    for target in logging.filters.keys() {
        if target.trim().is_empty() {
            return Err(ConfigError::validation("Log filter targets cannot be empty"));
        }
    }
    Ok(())
}

fn validate_store_config(store: &StoreConfig) -> ConfigResult<()> {
    if store.path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("store.path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AkaneConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let mut config = AkaneConfig::default();
        config.bot.prefixes.push(String::new());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_prefixes() {
        let mut config = AkaneConfig::default();
        config.bot.prefixes.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_prefix() {
        let mut config = AkaneConfig::default();
        config.bot.prefixes = vec!["!".into(), ".".into(), "!".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicatePrefix(p)) if p == "!"
        ));
    }

    #[test]
    fn test_rejects_blank_owner() {
        let mut config = AkaneConfig::default();
        config.bot.real_owners = vec![" ".into()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_a_path() {
        let mut config = AkaneConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "logging.file_path"
        ));
        config.logging.file_path = Some(PathBuf::from("logs/akane.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_empty_store_path() {
        let mut config = AkaneConfig::default();
        config.store.path = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }
}
