//! Progress snapshots emitted to the caller.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Url;

/// Task status as reported by the server, plus the local completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
    Banned,
    Expired,
    Unknown,
    /// Local status: the asset has been saved to disk. Never produced by
    /// [`TaskStatus::parse`].
    DownloadComplete,
    /// Any status string not listed above, preserved verbatim.
    Other(String),
}

impl TaskStatus {
    /// Parse a server-reported status string.
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => TaskStatus::Queued,
            "running" => TaskStatus::Running,
            "success" => TaskStatus::Success,
            "failed" => TaskStatus::Failed,
            "cancelled" => TaskStatus::Cancelled,
            "banned" => TaskStatus::Banned,
            "expired" => TaskStatus::Expired,
            "unknown" => TaskStatus::Unknown,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Banned => "banned",
            TaskStatus::Expired => "expired",
            TaskStatus::Unknown => "unknown",
            TaskStatus::DownloadComplete => "download_complete",
            TaskStatus::Other(s) => s,
        }
    }

    /// Server statuses that end the task without an asset.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Banned | TaskStatus::Expired
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the result asset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    /// Server-side URL, known once the task succeeds.
    Remote(Url),
    /// Downloaded file in the local model store.
    Local(PathBuf),
}

/// Snapshot of an attempt's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionProgress {
    /// Percentage in 0..=100.
    pub progress: u8,
    pub status: TaskStatus,
    pub asset: Option<AssetLocation>,
}

impl ConversionProgress {
    pub fn new(progress: i64, status: TaskStatus) -> Self {
        Self {
            progress: clamp_progress(progress),
            status,
            asset: None,
        }
    }

    pub fn with_asset(mut self, asset: AssetLocation) -> Self {
        self.asset = Some(asset);
        self
    }

    /// The final event of a successful attempt.
    pub fn download_complete(path: PathBuf) -> Self {
        Self::new(100, TaskStatus::DownloadComplete).with_asset(AssetLocation::Local(path))
    }

    pub fn is_download_complete(&self) -> bool {
        self.status == TaskStatus::DownloadComplete
    }

    /// Local path of the asset, if this snapshot carries one.
    pub fn local_path(&self) -> Option<&Path> {
        match &self.asset {
            Some(AssetLocation::Local(path)) => Some(path),
            _ => None,
        }
    }
}

/// Clamp a server progress value into a percentage.
pub fn clamp_progress(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// A model file saved by a successful attempt.
///
/// The caller owns the file and is responsible for removing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    pub path: PathBuf,
    pub task_id: String,
    pub bytes: u64,
}
