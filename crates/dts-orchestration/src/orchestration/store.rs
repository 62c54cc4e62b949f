//! # Persistent Store
//!
//! A single JSON snapshot of the transfer map plus opaque per-database
//! driver state, written on clean shutdown and read on startup. Saves go
//! through a temporary file that is renamed into place on success and
//! removed on any failure, so the store never holds a partial snapshot.
//! A missing file is a normal first start; a corrupt file is logged and
//! treated as empty so startup always succeeds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use dts_shared::model::Transfer;
use dts_shared::DtsResult;

/// Serialized contents of the store file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedState {
    #[serde(default)]
    pub transfers: HashMap<Uuid, Transfer>,
    /// Opaque blobs supplied by database drivers, keyed by database name;
    /// each driver versions its own blob
    #[serde(default)]
    pub database_states: HashMap<String, serde_json::Value>,
}

/// File-backed snapshot store for the orchestrator
#[derive(Debug, Clone)]
pub struct TransferStore {
    path: PathBuf,
}

impl TransferStore {
    /// Store file inside `data_dir`: `dts.json`, or `dts-<instance>.json`
    /// for instance-scoped deployments
    pub fn new(data_dir: &Path, instance: Option<&str>) -> Self {
        let file_name = match instance {
            Some(instance) => format!("dts-{instance}.json"),
            None => "dts.json".to_string(),
        };
        Self {
            path: data_dir.join(file_name),
        }
    }

    /// Location of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically persist a snapshot; on failure no partial file remains
    pub async fn save(&self, state: &SavedState) -> DtsResult<()> {
        let temp_path = self.path.with_extension("json.tmp");
        let result = async {
            let contents = serde_json::to_vec(state)?;
            tokio::fs::write(&temp_path, contents).await?;
            tokio::fs::rename(&temp_path, &self.path).await?;
            Ok(())
        }
        .await;

        if result.is_err() {
            // best effort: never leave a partial snapshot behind
            let _ = tokio::fs::remove_file(&temp_path).await;
        } else {
            debug!(
                path = %self.path.display(),
                transfers = state.transfers.len(),
                "Persisted transfer state"
            );
        }
        result
    }

    /// Read the snapshot; missing and corrupt files both yield an empty
    /// state so the service can always start
    pub async fn load(&self) -> SavedState {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted state; starting empty");
                return SavedState::default();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cannot read persisted state; starting empty"
                );
                return SavedState::default();
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Persisted state is corrupt; starting empty"
                );
                SavedState::default()
            }
        }
    }
}
