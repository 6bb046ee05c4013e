//! Observable view of a spawned attempt.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::ConversionError;
use super::progress::{ConversionProgress, DownloadedAsset};

/// Progress stream of a spawned [`ConversionAttempt`](super::ConversionAttempt).
///
/// Yields every snapshot in order, then at most one error, then ends. Not
/// restartable. Dropping the stream before it ends cancels the attempt.
pub struct ConversionStream {
    progress: mpsc::Receiver<ConversionProgress>,
    task: Option<JoinHandle<Result<DownloadedAsset, ConversionError>>>,
    cancel: CancellationToken,
    asset: Option<DownloadedAsset>,
    done: bool,
}

impl ConversionStream {
    pub(crate) fn new(
        progress: mpsc::Receiver<ConversionProgress>,
        task: JoinHandle<Result<DownloadedAsset, ConversionError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            progress,
            task: Some(task),
            cancel,
            asset: None,
            done: false,
        }
    }

    /// Request cancellation; the stream then ends with `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The saved model, once the stream has ended successfully.
    pub fn asset(&self) -> Option<&DownloadedAsset> {
        self.asset.as_ref()
    }

    /// Drain the stream and return the attempt's outcome.
    pub async fn finish(mut self) -> Result<DownloadedAsset, ConversionError> {
        while let Some(item) = self.next().await {
            item?;
        }
        self.asset.take().ok_or(ConversionError::Cancelled)
    }

    fn poll_outcome(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<ConversionProgress, ConversionError>>> {
        let Some(task) = self.task.as_mut() else {
            self.done = true;
            return Poll::Ready(None);
        };

        let joined = match Pin::new(task).poll(cx) {
            Poll::Ready(joined) => joined,
            Poll::Pending => return Poll::Pending,
        };
        self.task = None;
        self.done = true;

        match joined {
            Ok(Ok(asset)) => {
                self.asset = Some(asset);
                Poll::Ready(None)
            }
            Ok(Err(e)) => Poll::Ready(Some(Err(e))),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Poll::Ready(Some(Err(ConversionError::Cancelled))),
        }
    }
}

impl Stream for ConversionStream {
    type Item = Result<ConversionProgress, ConversionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match self.progress.poll_recv(cx) {
            Poll::Ready(Some(snapshot)) => Poll::Ready(Some(Ok(snapshot))),
            // All senders gone: the attempt task has returned.
            Poll::Ready(None) => self.poll_outcome(cx),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ConversionStream {
    fn drop(&mut self) {
        if !self.done {
            self.cancel.cancel();
        }
    }
}
