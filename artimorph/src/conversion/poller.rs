//! Task status polling.
//!
//! The poller is split in two:
//! - [`PollSession`] is the pure state machine. It interprets one status
//!   payload at a time and decides whether polling continues.
//! - [`Poller`] drives the session on a fixed interval against the status
//!   endpoint, enforcing the overall ceiling and the cancellation token.
//!
//! ```text
//! Submitted ──► Polling ──┬──► Succeeded   (status "success" + resolvable asset URL)
//!                 ▲   │   ├──► Failed      (failure status, or a tick error)
//!                 └───┘   └──► TimedOut    (ceiling exceeded)
//! ```

use std::time::Duration;

use reqwest::Url;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::envelope::{self, TaskStatusData};
use crate::api::ApiClient;

use super::cancellable;
use super::error::{ConversionError, FailureCause};
use super::progress::{AssetLocation, ConversionProgress, TaskStatus};

/// Seconds between status requests.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Ceiling on the whole polling phase in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;

/// Polling cadence and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Lifecycle of a polled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollState::Succeeded | PollState::Failed | PollState::TimedOut
        )
    }
}

/// What to do after observing one status payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// Not finished; report the snapshot and wait for the next tick.
    Continue(ConversionProgress),
    /// Finished with a downloadable asset.
    Ready {
        snapshot: ConversionProgress,
        asset_url: Url,
    },
}

/// Resolve the asset URL, preferring `output.pbr_model` over `pbr_model`.
///
/// Only absolute http(s) URLs count; anything else is treated as absent.
pub fn resolve_asset_url(data: &TaskStatusData) -> Option<Url> {
    data.asset_candidates()
        .filter_map(|candidate| Url::parse(candidate).ok())
        .find(|url| matches!(url.scheme(), "http" | "https"))
}

/// State machine for one task's polling phase.
#[derive(Debug)]
pub struct PollSession {
    task_id: String,
    state: PollState,
    ticks: u32,
}

impl PollSession {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state: PollState::Submitted,
            ticks: 0,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Number of status payloads observed so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Interpret one status payload.
    ///
    /// A "success" status without a resolvable asset URL keeps polling: the
    /// asset field may attach on a later tick.
    pub fn observe(&mut self, data: &TaskStatusData) -> Result<PollDecision, ConversionError> {
        if self.state.is_terminal() {
            return Err(ConversionError::PollingFailed(FailureCause::Other(format!(
                "task {} already finished ({:?})",
                self.task_id, self.state
            ))));
        }

        self.state = PollState::Polling;
        self.ticks += 1;

        let status = TaskStatus::parse(&data.status);
        let snapshot = ConversionProgress::new(data.progress.unwrap_or(0), status.clone());

        if status.is_failure() {
            self.state = PollState::Failed;
            return Err(ConversionError::TaskFailed(status));
        }

        if status == TaskStatus::Success {
            match resolve_asset_url(data) {
                Some(asset_url) => {
                    self.state = PollState::Succeeded;
                    let snapshot = snapshot.with_asset(AssetLocation::Remote(asset_url.clone()));
                    return Ok(PollDecision::Ready {
                        snapshot,
                        asset_url,
                    });
                }
                None => {
                    warn!(task_id = %self.task_id, "Task reports success without an asset URL yet");
                }
            }
        }

        Ok(PollDecision::Continue(snapshot))
    }

    /// Mark the session failed after a tick error.
    pub fn fail(&mut self) {
        self.state = PollState::Failed;
    }

    /// Mark the session timed out.
    pub fn time_out(&mut self) {
        self.state = PollState::TimedOut;
    }
}

/// Polls the status endpoint until the task is ready.
pub struct Poller {
    api: ApiClient,
    config: PollConfig,
}

impl Poller {
    pub fn new(api: ApiClient, config: PollConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Poll until the task has a downloadable asset.
    ///
    /// Emits one snapshot per tick. Ticks never overlap: the next interval
    /// starts after the previous response has been handled. Any tick
    /// failure ends polling.
    pub async fn poll_until_ready(
        &self,
        task_id: &str,
        progress: &mpsc::Sender<ConversionProgress>,
        cancel: &CancellationToken,
    ) -> Result<Url, ConversionError> {
        let url = self.api.task_status_url(task_id);
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut session = PollSession::new(task_id);

        info!(
            task_id,
            interval_secs = self.config.interval.as_secs(),
            timeout_secs = self.config.timeout.as_secs(),
            "Polling task status"
        );

        loop {
            let next_tick = (Instant::now() + self.config.interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ConversionError::Cancelled),
                _ = sleep_until(next_tick) => {}
            }

            if Instant::now() >= deadline {
                session.time_out();
                return Err(self.timed_out(&session, started));
            }

            let request = self.api.transport().get(&url, self.api.api_key());
            let response = match timeout_at(deadline, cancellable(cancel, request)).await {
                Ok(result) => result?,
                Err(_) => {
                    session.time_out();
                    return Err(self.timed_out(&session, started));
                }
            };

            let response = response.map_err(|e| {
                session.fail();
                ConversionError::PollingFailed(e.into())
            })?;

            if !response.is_success() {
                session.fail();
                warn!(task_id, status = response.status, "Status request rejected");
                return Err(ConversionError::PollingFailed(FailureCause::from_status(
                    &response,
                )));
            }

            let data: TaskStatusData = envelope::decode(&response.body).map_err(|e| {
                session.fail();
                ConversionError::PollingFailed(e.into())
            })?;

            match session.observe(&data)? {
                PollDecision::Continue(snapshot) => {
                    debug!(
                        task_id,
                        tick = session.ticks(),
                        status = %snapshot.status,
                        progress = snapshot.progress,
                        "Task still in progress"
                    );
                    progress
                        .send(snapshot)
                        .await
                        .map_err(|_| ConversionError::Cancelled)?;
                }
                PollDecision::Ready {
                    snapshot,
                    asset_url,
                } => {
                    info!(task_id, ticks = session.ticks(), %asset_url, "Task succeeded");
                    progress
                        .send(snapshot)
                        .await
                        .map_err(|_| ConversionError::Cancelled)?;
                    return Ok(asset_url);
                }
            }
        }
    }

    fn timed_out(&self, session: &PollSession, started: Instant) -> ConversionError {
        let elapsed = started.elapsed();
        warn!(
            task_id = session.task_id(),
            ticks = session.ticks(),
            elapsed_secs = elapsed.as_secs(),
            "Polling timed out"
        );
        ConversionError::TaskTimeout { elapsed }
    }
}
