use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::types::{DownloadError, TransferState, TransferStatus};

/// Persisted mapping of transfer id to [`TransferState`], stored as a single
/// JSON document. The manager owns the store; workers report events to the
/// manager, which performs the write.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the persisted mapping.
    ///
    /// Records found in `downloading` or `paused` are rewritten to `stopped`:
    /// no in-memory worker survived the restart, so the registry must not
    /// believe those transfers are live. A missing file yields an empty
    /// mapping; an unparsable one is logged and likewise degrades to empty,
    /// so a corrupt store never blocks startup.
    pub async fn load(&self) -> HashMap<String, TransferState> {
        match self.read_snapshot().await {
            Ok(map) => map,
            Err(err) => {
                log::warn!(
                    "discarding unreadable state store {}: {}",
                    self.path.display(),
                    err
                );
                HashMap::new()
            }
        }
    }

    async fn read_snapshot(&self) -> Result<HashMap<String, TransferState>, DownloadError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };

        let mut map: HashMap<String, TransferState> = serde_json::from_slice(&bytes)
            .map_err(|err| DownloadError::CorruptStore(err.to_string()))?;

        for state in map.values_mut() {
            if matches!(
                state.status,
                TransferStatus::Downloading | TransferStatus::Paused
            ) {
                state.status = TransferStatus::Stopped;
            }
        }

        Ok(map)
    }

    /// Atomically replace the store with the given snapshot: the document is
    /// written to a sibling temp file first and renamed over the target, so
    /// a crash mid-write cannot leave a half-written mapping behind.
    pub async fn save(
        &self,
        snapshot: &HashMap<String, TransferState>,
    ) -> Result<(), DownloadError> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| DownloadError::Filesystem(io::Error::new(io::ErrorKind::Other, err)))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
