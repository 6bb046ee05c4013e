//! Asset download stage.

use reqwest::Url;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{ApiClient, TransportError};
use crate::store::{extension_from_url, ModelStore, DEFAULT_MODEL_EXTENSION};

use super::cancellable;
use super::error::ConversionError;
use super::progress::{ConversionProgress, DownloadedAsset};

/// Streams a finished asset into the model store.
pub struct Downloader {
    api: ApiClient,
    store: ModelStore,
}

impl Downloader {
    pub fn new(api: ApiClient, store: ModelStore) -> Self {
        Self { api, store }
    }

    /// Download `url`, commit it under a fresh unique name and emit the
    /// `download_complete` snapshot.
    pub async fn download(
        &self,
        task_id: &str,
        url: &Url,
        progress: &mpsc::Sender<ConversionProgress>,
        cancel: &CancellationToken,
    ) -> Result<DownloadedAsset, ConversionError> {
        if cancel.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }

        let ext = extension_from_url(url).unwrap_or(DEFAULT_MODEL_EXTENSION);
        let staged = self
            .store
            .allocate(ext)
            .map_err(|e| ConversionError::DownloadFailed(e.into()))?;

        info!(task_id, %url, staging = %staged.staging.display(), "Downloading model");

        let transfer = self
            .api
            .transport()
            .download(url.as_str(), &staged.staging, cancel);
        let bytes = match cancellable(cancel, transfer).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(TransportError::Cancelled)) | Err(_) => {
                self.store.discard(&staged).await;
                return Err(ConversionError::Cancelled);
            }
            Ok(Err(e)) => {
                warn!(task_id, error = %e, "Model download failed");
                self.store.discard(&staged).await;
                return Err(ConversionError::DownloadFailed(e.into()));
            }
        };

        let path = match self.store.commit(&staged).await {
            Ok(path) => path,
            Err(e) => {
                self.store.discard(&staged).await;
                return Err(ConversionError::DownloadFailed(e.into()));
            }
        };

        // Nobody is left to take ownership of the model, so do not keep it.
        if progress
            .send(ConversionProgress::download_complete(path.clone()))
            .await
            .is_err()
        {
            warn!(task_id, path = %path.display(), "Receiver gone, removing downloaded model");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove unclaimed model");
            }
            return Err(ConversionError::Cancelled);
        }
        info!(task_id, path = %path.display(), bytes, "Download complete");

        Ok(DownloadedAsset {
            path,
            task_id: task_id.to_string(),
            bytes,
        })
    }
}
