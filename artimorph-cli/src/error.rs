//! CLI error type.

use std::io;
use std::path::PathBuf;

use artimorph::api::TransportError;
use artimorph::config::ConfigError;
use artimorph::conversion::ConversionError;
use artimorph::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    ConfigFile(#[from] ConfigError),

    /// Rendered with the user-facing message rather than the raw cause.
    #[error("{}", .0.user_message())]
    Conversion(#[from] ConversionError),

    #[error("Model store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to read image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("Prompt failed: {0}")]
    Prompt(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Conversion(ConversionError::Cancelled) => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artimorph::conversion::{FailureCause, OFFLINE_MESSAGE};

    #[test]
    fn test_conversion_errors_show_user_message() {
        let err = CliError::from(ConversionError::UploadFailed(FailureCause::Offline(
            "dns".into(),
        )));
        assert_eq!(err.to_string(), OFFLINE_MESSAGE);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_cancel_exit_code() {
        assert_eq!(CliError::from(ConversionError::Cancelled).exit_code(), 130);
    }
}
