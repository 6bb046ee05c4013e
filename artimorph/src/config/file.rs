//! INI configuration file.
//!
//! ```text
//! [api]
//! base_url = https://api.tripo3d.ai/v2/openapi
//! api_key = tsk_...
//!
//! [conversion]
//! poll_interval = 5
//! timeout = 600
//! request_timeout = 60
//!
//! [storage]
//! models_dir = /home/user/Documents/ArtiMorph/Models
//!
//! [logging]
//! directory = /home/user/.artimorph/logs
//! level = info
//! ```

use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::api::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::conversion::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS};
use crate::store::default_models_dir;

/// Errors from loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("no API key configured; set api.api_key, ARTIMORPH_API_KEY or pass --api-key")]
    MissingApiKey,
}

/// Directory holding the config file and default logs: `~/.artimorph`.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".artimorph")
}

/// Path of the config file: `~/.artimorph/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

/// `[api]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSection {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// `[conversion]` section; all values in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSection {
    pub poll_interval: u64,
    pub timeout: u64,
    pub request_timeout: u64,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSection {
    pub models_dir: PathBuf,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSection {
    pub directory: PathBuf,
    pub level: String,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub api: ApiSection,
    pub conversion: ConversionSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            api: ApiSection {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key: None,
            },
            conversion: ConversionSection {
                poll_interval: DEFAULT_POLL_INTERVAL_SECS,
                timeout: DEFAULT_POLL_TIMEOUT_SECS,
                request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            storage: StorageSection {
                models_dir: default_models_dir(),
            },
            logging: LoggingSection {
                directory: config_dir().join("logs"),
                level: "info".to_string(),
            },
        }
    }
}

impl ConfigFile {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for key in super::ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }

        Ok(config)
    }

    /// Save to the default location, creating `~/.artimorph` if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut ini = Ini::new();
        for key in super::ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }
}
