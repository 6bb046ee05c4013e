//! Image upload stage.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::envelope::{self, UploadData};
use crate::api::{ApiClient, FilePart};

use super::error::{ConversionError, FailureCause};
use super::request::{ConversionRequest, RemoteImageToken};
use super::cancellable;

/// Multipart form field carrying the image.
const FILE_FIELD: &str = "file";

/// Sends image bytes to the upload endpoint.
///
/// One multipart POST, no retry.
pub struct Uploader {
    api: ApiClient,
}

impl Uploader {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Upload the request's image and return the server's token for it.
    pub async fn upload(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<RemoteImageToken, ConversionError> {
        let url = self.api.upload_url();
        info!(
            format = %request.format(),
            size_kb = request.bytes().len() / 1024,
            "Uploading image"
        );

        let part = FilePart {
            field: FILE_FIELD,
            file_name: request.file_name(),
            mime: request.format().mime_type(),
            bytes: request.bytes().to_vec(),
        };

        let response = cancellable(
            cancel,
            self.api
                .transport()
                .post_multipart(&url, self.api.api_key(), part),
        )
        .await?
        .map_err(|e| ConversionError::UploadFailed(e.into()))?;

        debug!(status = response.status, "Upload response");
        if !response.is_success() {
            warn!(status = response.status, body = %response.body_text(), "Upload rejected");
            return Err(ConversionError::UploadFailed(FailureCause::from_status(
                &response,
            )));
        }

        let data: UploadData = envelope::decode(&response.body)
            .map_err(|e| ConversionError::UploadFailed(e.into()))?;

        info!(image_token = %data.image_token, "Image uploaded");
        Ok(RemoteImageToken::new(data.image_token))
    }
}
