//! Task creation stage.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::envelope::{self, CreateTaskBody, CreateTaskData, FileReference, IMAGE_TO_MODEL};
use crate::api::ApiClient;

use super::cancellable;
use super::error::{ConversionError, FailureCause};
use super::request::{ImageFormat, RemoteImageToken};

/// Requests an image-to-model conversion for an uploaded image.
pub struct TaskSubmitter {
    api: ApiClient,
}

impl TaskSubmitter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Create the conversion task and return its id.
    pub async fn submit(
        &self,
        token: &RemoteImageToken,
        format: ImageFormat,
        cancel: &CancellationToken,
    ) -> Result<String, ConversionError> {
        let url = self.api.task_url();
        let body = CreateTaskBody {
            kind: IMAGE_TO_MODEL,
            file: FileReference {
                file_type: format.wire_name(),
                file_token: token.as_str(),
            },
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| ConversionError::TaskCreationFailed(FailureCause::Other(e.to_string())))?;

        info!(image_token = %token, file_type = format.wire_name(), "Creating conversion task");

        let response = cancellable(
            cancel,
            self.api.transport().post_json(&url, self.api.api_key(), body),
        )
        .await?
        .map_err(|e| ConversionError::TaskCreationFailed(e.into()))?;

        if !response.is_success() {
            warn!(status = response.status, body = %response.body_text(), "Task creation rejected");
            return Err(ConversionError::TaskCreationFailed(
                FailureCause::from_status(&response),
            ));
        }

        let data: CreateTaskData = envelope::decode(&response.body)
            .map_err(|e| ConversionError::TaskCreationFailed(e.into()))?;

        info!(task_id = %data.task_id, "Conversion task created");
        Ok(data.task_id)
    }
}
