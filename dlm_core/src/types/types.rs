use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a managed transfer.
///
/// `Downloading` and `Paused` toggle on pause/resume; the four terminal
/// states are final. `Stopped` marks a record whose worker did not survive a
/// process restart, `Cancelled` a cancellation the worker itself observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Queued,
    Downloading,
    Paused,
    Completed,
    Cancelled,
    Error,
    Stopped,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Completed
                | TransferStatus::Cancelled
                | TransferStatus::Error
                | TransferStatus::Stopped
        )
    }

    /// A non-terminal transfer owns (or is about to own) a live worker.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Queued => "queued",
            TransferStatus::Downloading => "downloading",
            TransferStatus::Paused => "paused",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Error => "error",
            TransferStatus::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// The record describing one download: identity, destination, progress and
/// control flags. Snapshots handed out by the manager are plain clones;
/// mutation happens only inside the registry's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferState {
    pub id: String,
    pub url: String,
    pub filename: String,
    pub filepath: PathBuf,
    pub status: TransferStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub progress_percent: f64,
    pub error_message: Option<String>,
    /// Raised by `cancel()`; observable mid-stream while `status` still
    /// reads `downloading`.
    pub cancel_requested: bool,
}

impl TransferState {
    pub fn new(id: &str, url: &str, filename: &str, filepath: PathBuf) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            filename: filename.to_string(),
            filepath,
            status: TransferStatus::Queued,
            downloaded_bytes: 0,
            total_bytes: 0,
            progress_percent: 0.0,
            error_message: None,
            cancel_requested: false,
        }
    }

    /// Set the byte counters and recompute the derived percentage.
    /// `progress_percent` is never mutated independently.
    pub fn update_progress(&mut self, downloaded: u64, total: u64) {
        self.downloaded_bytes = downloaded;
        self.total_bytes = total;
        self.progress_percent = percent_of(downloaded, total);
    }
}

/// `downloaded / total * 100`, 0 when the total is unknown, clamped to
/// [0, 100] so a server that over-delivers cannot push it past the end.
pub fn percent_of(downloaded: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("a transfer for {url} -> {filename} is already active")]
    DuplicateTransfer { url: String, filename: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("state store is corrupt: {0}")]
    CorruptStore(String),

    #[error("no transfer with id {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Transport(err.to_string())
    }
}
