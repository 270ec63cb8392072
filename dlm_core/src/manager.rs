use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ManagerConfig;
use crate::progress::observer::TransferObserver;
use crate::store::StateStore;
use crate::transfer::transport::{HttpTransport, Transport};
use crate::transfer::worker::{TransferControl, TransferWorker};
use crate::types::types::{DownloadError, TransferState, TransferStatus};

/// Registry slot for one transfer: the record plus, while a worker is live,
/// its control channel and join handle.
pub(crate) struct TransferEntry {
    pub(crate) state: TransferState,
    pub(crate) runtime: Option<WorkerHandle>,
}

pub(crate) struct WorkerHandle {
    pub(crate) control: watch::Sender<TransferControl>,
    pub(crate) join: JoinHandle<()>,
}

/// State shared between the manager's control surface and its workers. All
/// registry mutations go through the one mutex; it is held only for a single
/// read-modify-write, never across I/O or a pause wait.
pub(crate) struct Shared {
    pub(crate) config: ManagerConfig,
    pub(crate) registry: Mutex<HashMap<String, TransferEntry>>,
    pub(crate) store: StateStore,
    pub(crate) transport: Arc<dyn Transport>,
}

/// Write the current registry snapshot to the state store. Best-effort: a
/// failed save is logged and swallowed so it never turns a successful
/// transfer into a reported failure.
pub(crate) async fn persist_registry(shared: &Shared) {
    let snapshot: HashMap<String, TransferState> = {
        let registry = shared.registry.lock().await;
        registry
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state.clone()))
            .collect()
    };

    if let Err(err) = shared.store.save(&snapshot).await {
        log::warn!("failed to persist transfer state: {}", err);
    }
}

/// The public-facing registry of transfers: creates, looks up, pauses,
/// resumes, cancels and deletes them, fanning out one worker task per active
/// transfer. State survives restarts through the [`StateStore`]; records
/// restored from disk come back sanitised (no phantom live workers).
pub struct DownloadManager {
    shared: Arc<Shared>,
    observers: Vec<Arc<dyn TransferObserver>>,
}

impl DownloadManager {
    /// Build a manager with the production HTTP transport.
    pub async fn new(config: ManagerConfig) -> Result<Self, DownloadError> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(config, transport).await
    }

    /// Build a manager around an arbitrary transport. Creates the downloads
    /// directory and loads whatever the state store has from a prior run.
    pub async fn with_transport(
        config: ManagerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DownloadError> {
        tokio::fs::create_dir_all(&config.downloads_dir).await?;

        let store = StateStore::new(&config.state_path);
        let restored = store.load().await;
        let registry = restored
            .into_iter()
            .map(|(id, state)| {
                (
                    id,
                    TransferEntry {
                        state,
                        runtime: None,
                    },
                )
            })
            .collect();

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                registry: Mutex::new(registry),
                store,
                transport,
            }),
            observers: Vec::new(),
        })
    }

    /// Register a progress observer. Must be called before transfers start;
    /// each worker snapshots the observer list when it is spawned.
    pub fn add_observer(&mut self, observer: Arc<dyn TransferObserver>) {
        self.observers.push(observer);
    }

    /// Begin a transfer of `url` into `filename` under the downloads
    /// directory and return its identity without waiting for completion.
    ///
    /// At most one active worker may exist per `(url, filename)` pair. When
    /// a prior transfer of the pair ended in a terminal state its identity
    /// (and therefore its filepath) is reactivated, so a restart resumes the
    /// same partial file rather than inventing a second record for it.
    pub async fn start(&self, url: &str, filename: &str) -> Result<String, DownloadError> {
        let filepath = self.shared.config.downloads_dir.join(filename);

        let mut registry = self.shared.registry.lock().await;

        let existing = registry
            .values()
            .find(|entry| entry.state.url == url && entry.state.filename == filename)
            .map(|entry| (entry.state.id.clone(), entry.state.status));

        if let Some((_, status)) = existing {
            if status.is_active() {
                return Err(DownloadError::DuplicateTransfer {
                    url: url.to_string(),
                    filename: filename.to_string(),
                });
            }
        }

        let id = existing
            .map(|(id, _)| id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut state = TransferState::new(&id, url, filename, filepath.clone());
        state.status = TransferStatus::Downloading;

        let (control_tx, control_rx) = watch::channel(TransferControl::Running);
        let worker = TransferWorker::new(
            Arc::clone(&self.shared),
            id.clone(),
            url.to_string(),
            filepath,
            control_rx,
            self.observers.clone(),
        );
        // The worker cannot touch the registry until this lock drops.
        let join = tokio::spawn(worker.run());

        registry.insert(
            id.clone(),
            TransferEntry {
                state,
                runtime: Some(WorkerHandle {
                    control: control_tx,
                    join,
                }),
            },
        );

        log::info!("transfer {} started: {} -> {}", id, url, filename);
        drop(registry);

        persist_registry(&self.shared).await;
        Ok(id)
    }

    /// Pause a downloading transfer. No-op in any other state; the worker
    /// observes the signal cooperatively at the next chunk boundary.
    pub async fn pause(&self, id: &str) -> Result<(), DownloadError> {
        {
            let mut registry = self.shared.registry.lock().await;
            let entry = registry
                .get_mut(id)
                .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;

            // A pending cancel outranks a pause request.
            if entry.state.status != TransferStatus::Downloading || entry.state.cancel_requested {
                return Ok(());
            }

            entry.state.status = TransferStatus::Paused;
            if let Some(handle) = &entry.runtime {
                handle.control.send_replace(TransferControl::Paused);
            }
            log::info!("transfer {} paused", id);
        }

        persist_registry(&self.shared).await;
        Ok(())
    }

    /// Resume a paused transfer, waking its blocked worker.
    pub async fn resume(&self, id: &str) -> Result<(), DownloadError> {
        {
            let mut registry = self.shared.registry.lock().await;
            let entry = registry
                .get_mut(id)
                .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;

            if entry.state.status != TransferStatus::Paused || entry.state.cancel_requested {
                return Ok(());
            }

            entry.state.status = TransferStatus::Downloading;
            if let Some(handle) = &entry.runtime {
                handle.control.send_replace(TransferControl::Running);
            }
            log::info!("transfer {} resumed", id);
        }

        persist_registry(&self.shared).await;
        Ok(())
    }

    /// Request cancellation of a downloading or paused transfer. The signal
    /// also releases a paused worker's wait so the cancellation is observed
    /// promptly instead of leaving the worker parked forever. The worker
    /// finalises the record (and cleans up the partial file) on its way out.
    pub async fn cancel(&self, id: &str) -> Result<(), DownloadError> {
        let mut registry = self.shared.registry.lock().await;
        let entry = registry
            .get_mut(id)
            .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;

        if !matches!(
            entry.state.status,
            TransferStatus::Downloading | TransferStatus::Paused
        ) {
            return Ok(());
        }

        entry.state.cancel_requested = true;
        if let Some(handle) = &entry.runtime {
            handle.control.send_replace(TransferControl::Cancelled);
        }
        log::info!("transfer {} cancel requested", id);
        Ok(())
    }

    /// Remove a transfer entirely: cancel it if active, wait (bounded) for
    /// the worker to exit, delete the destination file if present and drop
    /// the record from registry and store.
    pub async fn delete(&self, id: &str) -> Result<(), DownloadError> {
        self.cancel(id).await?;

        let handle = {
            let mut registry = self.shared.registry.lock().await;
            registry.get_mut(id).and_then(|entry| entry.runtime.take())
        };

        if let Some(handle) = handle {
            let timeout = self.shared.config.worker_exit_timeout;
            if tokio::time::timeout(timeout, handle.join).await.is_err() {
                log::warn!(
                    "transfer {}: worker did not exit within {:?}, removing bookkeeping anyway",
                    id,
                    timeout
                );
            }
        }

        let removed = {
            let mut registry = self.shared.registry.lock().await;
            registry.remove(id)
        };

        if let Some(entry) = removed {
            match tokio::fs::remove_file(&entry.state.filepath).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => log::warn!(
                    "transfer {}: could not remove {}: {}",
                    id,
                    entry.state.filepath.display(),
                    err
                ),
            }
            log::info!("transfer {} deleted", id);
        }

        persist_registry(&self.shared).await;
        Ok(())
    }

    /// Snapshot of one transfer's state. Callers get a copy, never a live
    /// alias into the registry.
    pub async fn get_status(&self, id: &str) -> Option<TransferState> {
        let registry = self.shared.registry.lock().await;
        registry.get(id).map(|entry| entry.state.clone())
    }

    /// Snapshot of every known transfer, keyed by identity.
    pub async fn get_all(&self) -> HashMap<String, TransferState> {
        let registry = self.shared.registry.lock().await;
        registry
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state.clone()))
            .collect()
    }
}
