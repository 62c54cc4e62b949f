//! # Local Endpoint
//!
//! A filesystem-rooted endpoint. The service uses one to ship manifests to
//! the destination endpoint; tests use it as a fully functional transfer
//! target. Transfers between two local endpoints are plain file copies and
//! complete before `transfer` returns; the recorded status stays queryable
//! until the process exits.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EndpointConfig;
use crate::errors::{DtsError, DtsResult};
use crate::model::{DataDescriptor, EndpointTransferStatus, TransferStatusCode};
use crate::providers::{Endpoint, FileTransfer};

/// Provider family name for local endpoints
pub const PROVIDER_NAME: &str = "local";

/// Filesystem-backed endpoint rooted at a directory
#[derive(Debug)]
pub struct LocalEndpoint {
    name: String,
    id: Uuid,
    root: PathBuf,
    statuses: Mutex<HashMap<Uuid, EndpointTransferStatus>>,
}

impl LocalEndpoint {
    pub fn new(name: impl Into<String>, id: Uuid, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            id,
            root: root.into(),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    /// Construct from a configuration entry; local endpoints require a root
    pub fn from_config(name: &str, config: &EndpointConfig) -> DtsResult<Self> {
        let root = config.root.clone().ok_or_else(|| {
            DtsError::configuration(format!("local endpoint '{name}' requires a root directory"))
        })?;
        Ok(Self::new(name, config.id, root))
    }
}

#[async_trait]
impl Endpoint for LocalEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    fn root(&self) -> PathBuf {
        self.root.clone()
    }

    async fn files_staged(&self, descriptors: &[DataDescriptor]) -> DtsResult<bool> {
        for descriptor in descriptors {
            let Some(path) = &descriptor.path else {
                continue;
            };
            let exists = tokio::fs::try_exists(self.root.join(path))
                .await
                .unwrap_or(false);
            if !exists {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn transfer(
        &self,
        destination: &dyn Endpoint,
        files: &[FileTransfer],
    ) -> DtsResult<Uuid> {
        if destination.provider() != PROVIDER_NAME {
            return Err(DtsError::IncompatibleEndpoint {
                src: PROVIDER_NAME.to_string(),
                destination: destination.provider().to_string(),
            });
        }

        let transfer_id = Uuid::new_v4();
        let destination_root = destination.root();
        let mut status = EndpointTransferStatus {
            code: TransferStatusCode::Succeeded,
            num_files: files.len(),
            ..EndpointTransferStatus::default()
        };

        for file in files {
            let source = self.root.join(&file.source_path);
            let target = destination_root.join(&file.destination_path);
            let copied = async {
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&source, &target).await?;
                Ok::<_, std::io::Error>(())
            }
            .await;

            match copied {
                Ok(()) => status.num_files_transferred += 1,
                Err(e) => {
                    warn!(
                        source = %source.display(),
                        target = %target.display(),
                        error = %e,
                        "Local file copy failed"
                    );
                    status.code = TransferStatusCode::Failed;
                    status.message = Some(format!("cannot copy {}: {e}", source.display()));
                    break;
                }
            }
        }

        debug!(
            transfer_id = %transfer_id,
            num_files = status.num_files,
            code = %status.code,
            "Local transfer completed"
        );
        self.statuses.lock().await.insert(transfer_id, status);
        Ok(transfer_id)
    }

    async fn status(&self, transfer_id: Uuid) -> DtsResult<EndpointTransferStatus> {
        self.statuses
            .lock()
            .await
            .get(&transfer_id)
            .cloned()
            .ok_or_else(|| DtsError::NotFound {
                kind: "Endpoint transfer".to_string(),
                id: transfer_id.to_string(),
            })
    }

    async fn cancel(&self, _transfer_id: Uuid) -> DtsResult<()> {
        // local transfers complete synchronously; nothing is ever in flight
        Ok(())
    }

    async fn transfers(&self) -> DtsResult<Vec<Uuid>> {
        Ok(self.statuses.lock().await.keys().copied().collect())
    }
}
