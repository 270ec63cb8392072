use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::watch;

use crate::manager::{persist_registry, Shared};
use crate::progress::observer::TransferObserver;
use crate::types::types::{DownloadError, TransferStatus};

/// Control signal a worker observes at every chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferControl {
    Running,
    Paused,
    Cancelled,
}

enum Outcome {
    Completed,
    Cancelled,
}

/// The per-download execution unit: owns the transport interaction, the
/// chunk-writing loop, pause/cancel checks and progress updates. Exactly one
/// worker runs per transfer identity; it holds the registry lock only for a
/// single read-modify-write at a time, never across I/O or a pause wait.
pub(crate) struct TransferWorker {
    shared: Arc<Shared>,
    id: String,
    url: String,
    filepath: PathBuf,
    control: watch::Receiver<TransferControl>,
    observers: Vec<Arc<dyn TransferObserver>>,
}

impl TransferWorker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        id: String,
        url: String,
        filepath: PathBuf,
        control: watch::Receiver<TransferControl>,
        observers: Vec<Arc<dyn TransferObserver>>,
    ) -> Self {
        Self {
            shared,
            id,
            url,
            filepath,
            control,
            observers,
        }
    }

    pub(crate) async fn run(mut self) {
        match self.transfer().await {
            Ok(Outcome::Completed) => self.finish_completed().await,
            Ok(Outcome::Cancelled) => self.finish_cancelled().await,
            Err(err) => self.finish_error(err).await,
        }
    }

    async fn transfer(&mut self) -> Result<Outcome, DownloadError> {
        // A cancel (or pause) issued before the connection is up is honoured
        // before any bytes move.
        if self.wait_until_running().await == TransferControl::Cancelled {
            return Ok(Outcome::Cancelled);
        }

        // Resume offset: size of whatever is already on disk.
        let mut offset = match tokio::fs::metadata(&self.filepath).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        let response = self.shared.transport.fetch(&self.url, offset).await?;

        if offset > 0 && !response.resumed {
            // The server ignored the range request; the partial content is
            // unusable and the transfer starts over from byte zero.
            log::info!(
                "transfer {}: server does not support resume, restarting {} from 0 (had {} bytes)",
                self.id,
                self.filepath.display(),
                offset
            );
            offset = 0;
        }

        // Content length covers the remainder, so the full size is the
        // confirmed offset plus whatever the server is about to send.
        let total = response.content_length.unwrap_or(0) + offset;

        let file = if offset > 0 {
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(&self.filepath)
                .await?
        } else {
            tokio::fs::File::create(&self.filepath).await?
        };
        let mut writer = BufWriter::with_capacity(256 * 1024, file);

        let mut downloaded = offset;
        self.record_progress(downloaded, total).await;

        let mut stream = response.stream;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    // Keep what made it to disk; a later restart resumes it.
                    let _ = writer.flush().await;
                    return Err(err);
                }
            };

            // Cancel wins over pause; a paused worker blocks here until
            // resume or cancel wakes it.
            if self.wait_until_running().await == TransferControl::Cancelled {
                let _ = writer.flush().await;
                return Ok(Outcome::Cancelled);
            }

            writer.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            let percent = self.record_progress(downloaded, total).await;
            for observer in &self.observers {
                observer
                    .on_progress(&self.id, percent, downloaded, total)
                    .await;
            }
        }

        writer.flush().await?;

        // A cancel that raced the final chunks still wins over completion.
        if *self.control.borrow() == TransferControl::Cancelled {
            return Ok(Outcome::Cancelled);
        }

        Ok(Outcome::Completed)
    }

    /// Observe the control channel at a chunk boundary. Blocks while paused
    /// (a watch-channel wait, not a poll loop) and re-checks for cancel as
    /// soon as the wait is released.
    async fn wait_until_running(&mut self) -> TransferControl {
        loop {
            let state = *self.control.borrow_and_update();
            match state {
                TransferControl::Running | TransferControl::Cancelled => return state,
                TransferControl::Paused => {
                    log::debug!("transfer {}: paused, waiting", self.id);
                    if self.control.changed().await.is_err() {
                        // Manager side dropped the channel; treat as cancel.
                        return TransferControl::Cancelled;
                    }
                }
            }
        }
    }

    /// Update the byte counters of this worker's record under the registry
    /// lock and return the recomputed percentage.
    async fn record_progress(&self, downloaded: u64, total: u64) -> f64 {
        let mut registry = self.shared.registry.lock().await;
        match registry.get_mut(&self.id) {
            Some(entry) => {
                entry.state.update_progress(downloaded, total);
                entry.state.progress_percent
            }
            // Record deleted out from under us; nothing left to update.
            None => crate::types::types::percent_of(downloaded, total),
        }
    }

    async fn finish_completed(&self) {
        {
            let mut registry = self.shared.registry.lock().await;
            if let Some(entry) = registry.get_mut(&self.id) {
                entry.state.status = TransferStatus::Completed;
                if entry.state.total_bytes < entry.state.downloaded_bytes {
                    // Server never reported a full length; the byte count is it.
                    entry.state.total_bytes = entry.state.downloaded_bytes;
                }
                entry.state.progress_percent = 100.0;
            }
        }
        persist_registry(&self.shared).await;

        log::info!(
            "transfer {} completed: {}",
            self.id,
            self.filepath.display()
        );
        for observer in &self.observers {
            observer.on_complete(&self.id, &self.filepath).await;
        }
    }

    async fn finish_cancelled(&self) {
        // Remove the partial file before flipping the status: the identity
        // only becomes restartable once the cleanup is done.
        if !self.shared.config.keep_partial_on_cancel {
            match tokio::fs::remove_file(&self.filepath).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => log::warn!(
                    "transfer {}: could not remove {}: {}",
                    self.id,
                    self.filepath.display(),
                    err
                ),
            }
        }

        {
            let mut registry = self.shared.registry.lock().await;
            if let Some(entry) = registry.get_mut(&self.id) {
                entry.state.status = TransferStatus::Cancelled;
            }
        }
        persist_registry(&self.shared).await;

        log::info!("transfer {} cancelled", self.id);
    }

    async fn finish_error(&self, err: DownloadError) {
        let message = err.to_string();
        {
            let mut registry = self.shared.registry.lock().await;
            if let Some(entry) = registry.get_mut(&self.id) {
                entry.state.status = TransferStatus::Error;
                entry.state.error_message = Some(message.clone());
            }
        }
        // The partial file stays on disk so a restart can resume from it.
        persist_registry(&self.shared).await;

        log::warn!("transfer {} failed: {}", self.id, message);
        for observer in &self.observers {
            observer.on_error(&self.id, &message).await;
        }
    }
}
