//! Effective conversion settings from config, environment and CLI flags.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiClient, ReqwestTransport, TransportError};
use crate::conversion::PollConfig;

use super::file::{ConfigError, ConfigFile};

/// Environment variable consulted for the API key.
pub const API_KEY_ENV: &str = "ARTIMORPH_API_KEY";

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub models_dir: Option<PathBuf>,
    pub poll_interval: Option<u64>,
    pub timeout: Option<u64>,
}

/// Everything needed to run a conversion.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionSettings {
    pub base_url: String,
    pub api_key: String,
    pub poll: PollConfig,
    pub request_timeout: Duration,
    pub models_dir: PathBuf,
}

impl ConversionSettings {
    /// Resolve settings: CLI flag, then environment, then config file.
    pub fn resolve(config: &ConfigFile, overrides: SettingsOverrides) -> Result<Self, ConfigError> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        Self::resolve_with_env(config, overrides, env_key)
    }

    fn resolve_with_env(
        config: &ConfigFile,
        overrides: SettingsOverrides,
        env_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = overrides
            .api_key
            .into_iter()
            .chain(env_key)
            .chain(config.api.api_key.clone())
            .map(|k| k.trim().to_string())
            .find(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let poll_interval = overrides
            .poll_interval
            .unwrap_or(config.conversion.poll_interval);
        let timeout = overrides.timeout.unwrap_or(config.conversion.timeout);
        if poll_interval == 0 || timeout == 0 {
            return Err(ConfigError::InvalidValue {
                key: "conversion".to_string(),
                value: format!("poll_interval={} timeout={}", poll_interval, timeout),
                reason: "intervals must be at least 1 second".to_string(),
            });
        }

        Ok(Self {
            base_url: overrides
                .base_url
                .unwrap_or_else(|| config.api.base_url.clone()),
            api_key,
            poll: PollConfig::default()
                .with_interval(Duration::from_secs(poll_interval))
                .with_timeout(Duration::from_secs(timeout)),
            request_timeout: Duration::from_secs(config.conversion.request_timeout),
            models_dir: overrides
                .models_dir
                .unwrap_or_else(|| config.storage.models_dir.clone()),
        })
    }

    /// Build an API client over a reqwest transport.
    pub fn api_client(&self) -> Result<ApiClient, TransportError> {
        let transport = ReqwestTransport::with_timeout(self.request_timeout)?;
        Ok(ApiClient::new(
            Arc::new(transport),
            self.base_url.clone(),
            self.api_key.clone(),
        ))
    }
}

impl std::fmt::Debug for ConversionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("poll", &self.poll)
            .field("request_timeout", &self.request_timeout)
            .field("models_dir", &self.models_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: Option<&str>) -> ConfigFile {
        let mut config = ConfigFile::default();
        config.api.api_key = key.map(String::from);
        config
    }

    #[test]
    fn test_cli_beats_env_beats_config() {
        let config = config_with_key(Some("from_config"));

        let settings = ConversionSettings::resolve_with_env(
            &config,
            SettingsOverrides {
                api_key: Some("from_cli".into()),
                ..Default::default()
            },
            Some("from_env".into()),
        )
        .unwrap();
        assert_eq!(settings.api_key, "from_cli");

        let settings = ConversionSettings::resolve_with_env(
            &config,
            SettingsOverrides::default(),
            Some("from_env".into()),
        )
        .unwrap();
        assert_eq!(settings.api_key, "from_env");

        let settings =
            ConversionSettings::resolve_with_env(&config, SettingsOverrides::default(), None)
                .unwrap();
        assert_eq!(settings.api_key, "from_config");
    }

    #[test]
    fn test_blank_env_is_skipped() {
        let settings = ConversionSettings::resolve_with_env(
            &config_with_key(Some("from_config")),
            SettingsOverrides::default(),
            Some("  ".into()),
        )
        .unwrap();
        assert_eq!(settings.api_key, "from_config");
    }

    #[test]
    fn test_missing_key() {
        let err = ConversionSettings::resolve_with_env(
            &config_with_key(None),
            SettingsOverrides::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn test_poll_overrides() {
        let settings = ConversionSettings::resolve_with_env(
            &config_with_key(Some("k")),
            SettingsOverrides {
                poll_interval: Some(1),
                timeout: Some(30),
                models_dir: Some(PathBuf::from("/tmp/m")),
                ..Default::default()
            },
            None,
        )
        .unwrap();

        assert_eq!(settings.poll.interval, Duration::from_secs(1));
        assert_eq!(settings.poll.timeout, Duration::from_secs(30));
        assert_eq!(settings.models_dir, PathBuf::from("/tmp/m"));
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = ConversionSettings::resolve_with_env(
            &config_with_key(Some("k")),
            SettingsOverrides {
                poll_interval: Some(0),
                ..Default::default()
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = ConversionSettings::resolve_with_env(
            &config_with_key(Some("super_secret")),
            SettingsOverrides::default(),
            None,
        )
        .unwrap();
        assert!(!format!("{:?}", settings).contains("super_secret"));
    }
}
