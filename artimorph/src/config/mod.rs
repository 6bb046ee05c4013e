//! User configuration stored in `~/.artimorph/config.ini`.
//!
//! [`ConfigFile`] holds the typed sections, [`ConfigKey`] addresses single
//! settings by `section.key` for the `config` CLI commands, and
//! [`ConversionSettings`] merges the file with environment and CLI values.

mod file;
mod keys;
mod settings;

pub use file::{
    config_dir, config_file_path, ApiSection, ConfigError, ConfigFile, ConversionSection,
    LoggingSection, StorageSection,
};
pub use keys::ConfigKey;
pub use settings::{ConversionSettings, SettingsOverrides, API_KEY_ENV};
