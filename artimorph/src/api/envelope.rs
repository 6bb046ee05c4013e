//! Typed response envelopes for the conversion API.
//!
//! Every endpoint wraps its payload the same way:
//!
//! ```text
//! { "code": 0, "message": "...", "suggestion": "...", "data": { ... } }
//! ```
//!
//! Decoding happens in two steps so that an application error (non-zero
//! `code`) is reported as such even when its `data` does not match the
//! endpoint schema.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Why an envelope could not be turned into its payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The server reported a non-zero application status code.
    #[error("API error {code}: {message}")]
    Api {
        code: i64,
        message: String,
        suggestion: Option<String>,
    },

    /// The body was not a well-formed envelope for this endpoint.
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Decode an envelope body into the endpoint's payload type.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, EnvelopeError> {
    let envelope: RawEnvelope = serde_json::from_slice(body)
        .map_err(|e| EnvelopeError::Malformed(format!("invalid JSON envelope: {}", e)))?;

    if envelope.code != 0 {
        return Err(EnvelopeError::Api {
            code: envelope.code,
            message: envelope
                .message
                .unwrap_or_else(|| "unknown error".to_string()),
            suggestion: envelope.suggestion,
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| EnvelopeError::Malformed("response is missing the data field".into()))?;

    serde_json::from_value(data)
        .map_err(|e| EnvelopeError::Malformed(format!("unexpected data payload: {}", e)))
}

/// Payload of `POST /upload/sts`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadData {
    pub image_token: String,
}

/// Payload of `POST /task`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskData {
    pub task_id: String,
}

/// Payload of `GET /task/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusData {
    pub status: String,
    /// Whole-number percentage. Any other value reads as absent.
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: Option<i64>,
    #[serde(default)]
    pub output: Option<TaskOutput>,
    #[serde(default)]
    pub pbr_model: Option<String>,
}

impl TaskStatusData {
    /// Asset URL candidates in precedence order: `output.pbr_model` first,
    /// then the top-level `pbr_model`.
    pub fn asset_candidates(&self) -> impl Iterator<Item = &str> {
        self.output
            .as_ref()
            .and_then(|o| o.pbr_model.as_deref())
            .into_iter()
            .chain(self.pbr_model.as_deref())
    }
}

/// Accepts any JSON value for `progress`, keeping it only when it is an
/// integer, so an odd progress value never fails the whole status payload.
fn lenient_progress<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64()))
}

/// Nested output object of a task status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub pbr_model: Option<String>,
}

/// Request body of `POST /task`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskBody<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub file: FileReference<'a>,
}

/// Reference to an uploaded image inside a task request.
#[derive(Debug, Clone, Serialize)]
pub struct FileReference<'a> {
    #[serde(rename = "type")]
    pub file_type: &'a str,
    pub file_token: &'a str,
}

/// Task type for image-to-model conversion.
pub const IMAGE_TO_MODEL: &str = "image_to_model";
