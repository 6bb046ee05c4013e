//! Image-to-model conversion pipeline.
//!
//! An attempt runs four stages strictly in order, each one starting only
//! after its predecessor succeeded:
//!
//! ```text
//! ConversionRequest
//!     │
//!     ▼
//! Uploader ──────► RemoteImageToken
//!     │
//!     ▼
//! TaskSubmitter ─► task id
//!     │
//!     ▼
//! Poller ────────► asset URL        (one ConversionProgress per tick)
//!     │
//!     ▼
//! Downloader ────► DownloadedAsset  (final "download_complete" snapshot)
//! ```
//!
//! Every stage fails fast with its own [`ConversionError`] kind; nothing is
//! retried. A [`CancellationToken`] is checked before each stage and raced
//! against every request and every inter-tick sleep.
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! let request = ConversionRequest::from_bytes(std::fs::read("sketch.png")?)?;
//! let attempt = ConversionAttempt::new(api, store, PollConfig::default(), request);
//! let mut stream = attempt.spawn(&CancellationToken::new());
//!
//! while let Some(item) = stream.next().await {
//!     let snapshot = item?;
//!     println!("{}% {}", snapshot.progress, snapshot.status);
//! }
//! println!("saved to {}", stream.asset().unwrap().path.display());
//! ```

mod attempt;
mod downloader;
mod error;
mod poller;
mod progress;
mod request;
mod stream;
mod submitter;
mod uploader;

use std::future::Future;

use tokio_util::sync::CancellationToken;

pub use attempt::ConversionAttempt;
pub use downloader::Downloader;
pub use error::{ConversionError, FailureCause, OFFLINE_MESSAGE};
pub use poller::{
    resolve_asset_url, PollConfig, PollDecision, PollSession, PollState, Poller,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS,
};
pub use progress::{
    clamp_progress, AssetLocation, ConversionProgress, DownloadedAsset, TaskStatus,
};
pub use request::{ConversionRequest, ImageFormat, RemoteImageToken, JPEG_QUALITY};
pub use stream::ConversionStream;
pub use submitter::TaskSubmitter;
pub use uploader::Uploader;

/// Race `fut` against the token. Cancellation wins ties.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ConversionError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ConversionError::Cancelled),
        output = fut => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellable_passes_output_through() {
        let cancel = CancellationToken::new();
        assert_eq!(cancellable(&cancel, async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            cancellable(&cancel, async { 7 }).await,
            Err(ConversionError::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_cancellable_interrupts_pending_work() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move { trigger.cancel() });

        let result = cancellable(&cancel, futures::future::pending::<()>()).await;
        assert_eq!(result, Err(ConversionError::Cancelled));
    }
}
