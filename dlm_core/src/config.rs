use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a [`DownloadManager`](crate::DownloadManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory destination files are written to. Created on construction.
    pub downloads_dir: PathBuf,
    /// Path of the persisted transfer-state mapping.
    pub state_path: PathBuf,
    /// Keep the partial file when a transfer is cancelled, so a later
    /// restart can resume it. Off by default: cancel cleans up.
    pub keep_partial_on_cancel: bool,
    /// How long `delete()` waits for a live worker to exit before giving up
    /// on the join and removing the bookkeeping anyway.
    pub worker_exit_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            state_path: PathBuf::from("downloads.json"),
            keep_partial_on_cancel: false,
            worker_exit_timeout: Duration::from_secs(10),
        }
    }
}

impl ManagerConfig {
    pub fn with_downloads_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.downloads_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_state_path(mut self, path: impl AsRef<Path>) -> Self {
        self.state_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_keep_partial_on_cancel(mut self, keep: bool) -> Self {
        self.keep_partial_on_cancel = keep;
        self
    }

    pub fn with_worker_exit_timeout(mut self, timeout: Duration) -> Self {
        self.worker_exit_timeout = timeout;
        self
    }
}
