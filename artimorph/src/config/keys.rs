//! Typed access to individual configuration settings by `section.key` name.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::{ConfigError, ConfigFile};

/// Accepted values for `logging.level`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ApiBaseUrl,
    ApiKey,
    ConversionPollInterval,
    ConversionTimeout,
    ConversionRequestTimeout,
    StorageModelsDir,
    LoggingDirectory,
    LoggingLevel,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::ApiBaseUrl,
            ConfigKey::ApiKey,
            ConfigKey::ConversionPollInterval,
            ConfigKey::ConversionTimeout,
            ConfigKey::ConversionRequestTimeout,
            ConfigKey::StorageModelsDir,
            ConfigKey::LoggingDirectory,
            ConfigKey::LoggingLevel,
        ]
    }

    pub fn section(self) -> &'static str {
        match self {
            ConfigKey::ApiBaseUrl | ConfigKey::ApiKey => "api",
            ConfigKey::ConversionPollInterval
            | ConfigKey::ConversionTimeout
            | ConfigKey::ConversionRequestTimeout => "conversion",
            ConfigKey::StorageModelsDir => "storage",
            ConfigKey::LoggingDirectory | ConfigKey::LoggingLevel => "logging",
        }
    }

    pub fn key_name(self) -> &'static str {
        match self {
            ConfigKey::ApiBaseUrl => "base_url",
            ConfigKey::ApiKey => "api_key",
            ConfigKey::ConversionPollInterval => "poll_interval",
            ConfigKey::ConversionTimeout => "timeout",
            ConfigKey::ConversionRequestTimeout => "request_timeout",
            ConfigKey::StorageModelsDir => "models_dir",
            ConfigKey::LoggingDirectory => "directory",
            ConfigKey::LoggingLevel => "level",
        }
    }

    /// Full `section.key` name.
    pub fn name(self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// True for values that should not be echoed in full.
    pub fn is_secret(self) -> bool {
        self == ConfigKey::ApiKey
    }

    /// Current value as text; empty when unset.
    pub fn get(self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::ApiBaseUrl => config.api.base_url.clone(),
            ConfigKey::ApiKey => config.api.api_key.clone().unwrap_or_default(),
            ConfigKey::ConversionPollInterval => config.conversion.poll_interval.to_string(),
            ConfigKey::ConversionTimeout => config.conversion.timeout.to_string(),
            ConfigKey::ConversionRequestTimeout => config.conversion.request_timeout.to_string(),
            ConfigKey::StorageModelsDir => config.storage.models_dir.display().to_string(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
        }
    }

    /// Validate and store a value.
    pub fn set(self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::ApiBaseUrl => {
                let url = reqwest::Url::parse(value).map_err(|e| self.invalid(value, e))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(self.invalid(value, "must be an http(s) URL"));
                }
                config.api.base_url = value.trim_end_matches('/').to_string();
            }
            ConfigKey::ApiKey => {
                config.api.api_key = (!value.is_empty()).then(|| value.to_string());
            }
            ConfigKey::ConversionPollInterval => {
                config.conversion.poll_interval = self.parse_secs(value)?;
            }
            ConfigKey::ConversionTimeout => {
                config.conversion.timeout = self.parse_secs(value)?;
            }
            ConfigKey::ConversionRequestTimeout => {
                config.conversion.request_timeout = self.parse_secs(value)?;
            }
            ConfigKey::StorageModelsDir => {
                config.storage.models_dir = self.parse_path(value)?;
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = self.parse_path(value)?;
            }
            ConfigKey::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(self.invalid(value, format!("expected one of {}", LOG_LEVELS.join(", "))));
                }
                config.logging.level = level;
            }
        }
        Ok(())
    }

    fn parse_secs(self, value: &str) -> Result<u64, ConfigError> {
        match value.parse::<u64>() {
            Ok(0) => Err(self.invalid(value, "must be at least 1 second")),
            Ok(secs) => Ok(secs),
            Err(e) => Err(self.invalid(value, e)),
        }
    }

    fn parse_path(self, value: &str) -> Result<PathBuf, ConfigError> {
        if value.is_empty() {
            return Err(self.invalid(value, "path must not be empty"));
        }
        Ok(expand_home(value))
    }

    fn invalid(self, value: &str, reason: impl fmt::Display) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert!(matches!(
            "api.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_and_get() {
        let mut config = ConfigFile::default();
        ConfigKey::ConversionPollInterval.set(&mut config, " 3 ").unwrap();
        ConfigKey::LoggingLevel.set(&mut config, "DEBUG").unwrap();
        ConfigKey::ApiBaseUrl
            .set(&mut config, "https://example.test/v2/")
            .unwrap();

        assert_eq!(ConfigKey::ConversionPollInterval.get(&config), "3");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.api.base_url, "https://example.test/v2");
    }

    #[test]
    fn test_empty_api_key_clears() {
        let mut config = ConfigFile::default();
        ConfigKey::ApiKey.set(&mut config, "tsk_1").unwrap();
        assert_eq!(config.api.api_key.as_deref(), Some("tsk_1"));
        ConfigKey::ApiKey.set(&mut config, "").unwrap();
        assert!(config.api.api_key.is_none());
        assert!(ConfigKey::ApiKey.is_secret());
    }

    #[test]
    fn test_validation() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::ConversionTimeout.set(&mut config, "0").is_err());
        assert!(ConfigKey::ConversionTimeout.set(&mut config, "-5").is_err());
        assert!(ConfigKey::ApiBaseUrl.set(&mut config, "ftp://x").is_err());
        assert!(ConfigKey::ApiBaseUrl.set(&mut config, "not a url").is_err());
        assert!(ConfigKey::LoggingLevel.set(&mut config, "loud").is_err());
        assert!(ConfigKey::StorageModelsDir.set(&mut config, "").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_home_expansion() {
        let mut config = ConfigFile::default();
        ConfigKey::StorageModelsDir.set(&mut config, "~/models").unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.storage.models_dir, home.join("models"));
        }
    }
}
