//! Single-use conversion attempt.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::store::ModelStore;

use super::downloader::Downloader;
use super::error::ConversionError;
use super::poller::{PollConfig, Poller};
use super::progress::{ConversionProgress, DownloadedAsset};
use super::request::ConversionRequest;
use super::stream::ConversionStream;
use super::submitter::TaskSubmitter;
use super::uploader::Uploader;

/// Buffered progress snapshots between the attempt task and its stream.
const PROGRESS_BUFFER: usize = 32;

/// One image-to-model conversion.
///
/// Consumed by [`run`](Self::run) or [`spawn`](Self::spawn), so a request
/// can never have two uploads in flight.
pub struct ConversionAttempt {
    api: ApiClient,
    store: ModelStore,
    poll_config: PollConfig,
    request: ConversionRequest,
}

impl ConversionAttempt {
    pub fn new(
        api: ApiClient,
        store: ModelStore,
        poll_config: PollConfig,
        request: ConversionRequest,
    ) -> Self {
        Self {
            api,
            store,
            poll_config,
            request,
        }
    }

    pub fn request(&self) -> &ConversionRequest {
        &self.request
    }

    /// Run upload, task creation, polling and download in order.
    ///
    /// Snapshots go to `progress`; the last one on success is
    /// `download_complete`. A closed receiver counts as cancellation.
    pub async fn run(
        self,
        progress: mpsc::Sender<ConversionProgress>,
        cancel: CancellationToken,
    ) -> Result<DownloadedAsset, ConversionError> {
        let result = self.run_stages(&progress, &cancel).await;
        match &result {
            Ok(asset) => info!(task_id = %asset.task_id, path = %asset.path.display(), "Conversion finished"),
            Err(ConversionError::Cancelled) => info!("Conversion cancelled"),
            Err(e) => warn!(error = %e, "Conversion failed"),
        }
        result
    }

    async fn run_stages(
        self,
        progress: &mpsc::Sender<ConversionProgress>,
        cancel: &CancellationToken,
    ) -> Result<DownloadedAsset, ConversionError> {
        let ConversionAttempt {
            api,
            store,
            poll_config,
            request,
        } = self;

        check_cancelled(cancel)?;
        let token = Uploader::new(api.clone()).upload(&request, cancel).await?;

        check_cancelled(cancel)?;
        let task_id = TaskSubmitter::new(api.clone())
            .submit(&token, request.format(), cancel)
            .await?;

        check_cancelled(cancel)?;
        let asset_url = Poller::new(api.clone(), poll_config)
            .poll_until_ready(&task_id, progress, cancel)
            .await?;

        check_cancelled(cancel)?;
        Downloader::new(api, store)
            .download(&task_id, &asset_url, progress, cancel)
            .await
    }

    /// Run the attempt on the tokio runtime and observe it as a stream.
    ///
    /// The stream owns a child of `cancel`; dropping it stops the attempt
    /// without touching the caller's token.
    pub fn spawn(self, cancel: &CancellationToken) -> ConversionStream {
        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let task = tokio::spawn(self.run(tx, cancel.clone()));
        ConversionStream::new(rx, task, cancel)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), ConversionError> {
    if cancel.is_cancelled() {
        Err(ConversionError::Cancelled)
    } else {
        Ok(())
    }
}
