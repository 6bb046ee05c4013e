//! Error taxonomy for conversion attempts.

use std::time::Duration;

use thiserror::Error;

use crate::api::{EnvelopeError, HttpResponse, TransportError};
use crate::store::StoreError;

use super::progress::TaskStatus;

/// Message shown for any failure caused by lost connectivity.
pub const OFFLINE_MESSAGE: &str =
    "The network connection appears to be offline. Check your connection and try again.";

/// Underlying reason a stage failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureCause {
    /// The API host could not be reached.
    #[error("network unreachable: {0}")]
    Offline(String),

    /// A request hit the client timeout.
    #[error("request timed out: {0}")]
    TimedOut(String),

    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Non-zero application status code in the envelope.
    #[error("API error {code}: {message}{}", suggestion_suffix(.suggestion))]
    Api {
        code: i64,
        message: String,
        suggestion: Option<String>,
    },

    /// The response was not a well-formed envelope for the endpoint.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (suggestion: {})", s))
        .unwrap_or_default()
}

impl FailureCause {
    /// Cause for a non-2xx API response.
    pub fn from_status(response: &HttpResponse) -> Self {
        FailureCause::Http {
            status: response.status,
            body: response.body_text(),
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, FailureCause::Offline(_))
    }
}

impl From<TransportError> for FailureCause {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Offline(msg) => FailureCause::Offline(msg),
            TransportError::TimedOut(msg) => FailureCause::TimedOut(msg),
            TransportError::Status(status) => FailureCause::Http {
                status,
                body: String::new(),
            },
            TransportError::Io(e) => FailureCause::Io(e.to_string()),
            other => FailureCause::Other(other.to_string()),
        }
    }
}

impl From<EnvelopeError> for FailureCause {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::Api {
                code,
                message,
                suggestion,
            } => FailureCause::Api {
                code,
                message,
                suggestion,
            },
            EnvelopeError::Malformed(msg) => FailureCause::InvalidResponse(msg),
        }
    }
}

impl From<StoreError> for FailureCause {
    fn from(e: StoreError) -> Self {
        FailureCause::Io(e.to_string())
    }
}

/// Terminal failure of a conversion attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("upload failed: {0}")]
    UploadFailed(FailureCause),

    #[error("task creation failed: {0}")]
    TaskCreationFailed(FailureCause),

    #[error("polling failed: {0}")]
    PollingFailed(FailureCause),

    #[error("download failed: {0}")]
    DownloadFailed(FailureCause),

    /// Polling exceeded its ceiling without reaching a terminal status.
    #[error("conversion timed out after {}s", .elapsed.as_secs())]
    TaskTimeout { elapsed: Duration },

    /// The server reported an explicit failure status for the task.
    #[error("conversion failed with status {0}")]
    TaskFailed(TaskStatus),

    /// The image is not one of the supported encodings.
    #[error("unsupported image format")]
    UnsupportedImageFormat,

    /// The attempt was cancelled by its caller.
    #[error("conversion cancelled")]
    Cancelled,
}

impl ConversionError {
    /// The stage cause, if this error came from a stage.
    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            ConversionError::UploadFailed(c)
            | ConversionError::TaskCreationFailed(c)
            | ConversionError::PollingFailed(c)
            | ConversionError::DownloadFailed(c) => Some(c),
            _ => None,
        }
    }

    /// True when the failure was caused by lost connectivity.
    pub fn is_offline(&self) -> bool {
        self.cause().is_some_and(FailureCause::is_offline)
    }

    /// Human-readable message suitable for display to the user.
    pub fn user_message(&self) -> String {
        if self.is_offline() {
            return OFFLINE_MESSAGE.to_string();
        }
        match self {
            ConversionError::UploadFailed(c) => format!("Upload failed: {}", c),
            ConversionError::TaskCreationFailed(c) => format!("Could not create task: {}", c),
            ConversionError::PollingFailed(c) => format!("Could not fetch progress: {}", c),
            ConversionError::DownloadFailed(c) => format!("Download failed: {}", c),
            ConversionError::TaskTimeout { .. } => {
                "The conversion took too long. Please try again later.".to_string()
            }
            ConversionError::TaskFailed(status) => format!("Conversion failed: {}", status),
            ConversionError::UnsupportedImageFormat => {
                "Unsupported image format. Use JPEG, PNG or WebP.".to_string()
            }
            ConversionError::Cancelled => "Conversion cancelled.".to_string(),
        }
    }
}
