//! # Transfer Finalization
//!
//! Once every task of a transfer has succeeded, the manifest describing all
//! of its descriptors is written to the manifest directory and shipped from
//! the service-local endpoint to the destination endpoint as
//! `<destination-folder>/manifest.json`. The transfer reaches `Succeeded`
//! when the manifest transfer does, `Failed` otherwise.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use dts_shared::errors::{DtsError, DtsResult};
use dts_shared::manifest;
use dts_shared::model::{Transfer, TransferStatusCode};
use dts_shared::providers::FileTransfer;

use super::TransferAdvancer;

impl TransferAdvancer {
    /// Submit or poll the manifest transfer for a transfer whose tasks have
    /// all succeeded
    pub(super) async fn finalize(&self, transfer: &mut Transfer) {
        match transfer.manifest_transfer_id {
            None => {
                transfer.status.code = TransferStatusCode::Finalizing;
                match self.submit_manifest(transfer).await {
                    Ok(manifest_transfer_id) => {
                        transfer.manifest_transfer_id = Some(manifest_transfer_id);
                        info!(
                            transfer_id = %transfer.id,
                            manifest_transfer_id = %manifest_transfer_id,
                            "Manifest transfer started"
                        );
                    }
                    Err(e) => {
                        error!(transfer_id = %transfer.id, error = %e, "Manifest delivery failed");
                        transfer.complete(
                            TransferStatusCode::Failed,
                            Some(format!("manifest delivery failed: {e}")),
                            Utc::now(),
                        );
                    }
                }
            }
            Some(manifest_transfer_id) => {
                self.poll_manifest(transfer, manifest_transfer_id).await;
            }
        }
    }

    async fn submit_manifest(&self, transfer: &Transfer) -> DtsResult<Uuid> {
        let manifest_path =
            manifest::write_manifest(&self.service.manifest_dir, transfer).await?;

        // the manifest ships from the service-local endpoint, so its path
        // must resolve under that endpoint's root
        let local_root = self.local_endpoint.root();
        let source_path = manifest_path
            .strip_prefix(&local_root)
            .map_err(|_| {
                DtsError::configuration(format!(
                    "manifest directory '{}' is not under the local endpoint root '{}'",
                    self.service.manifest_dir.display(),
                    local_root.display()
                ))
            })?
            .to_path_buf();

        let destination = self.registry.endpoint(&transfer.destination_endpoint)?;
        let files = [FileTransfer {
            source_path,
            destination_path: PathBuf::from(&transfer.destination_folder).join("manifest.json"),
            hash: None,
            hash_algorithm: None,
        }];
        self.local_endpoint
            .transfer(destination.as_ref(), &files)
            .await
    }

    async fn poll_manifest(&self, transfer: &mut Transfer, manifest_transfer_id: Uuid) {
        let status = match self.local_endpoint.status(manifest_transfer_id).await {
            Ok(status) => status,
            Err(e) => {
                error!(
                    transfer_id = %transfer.id,
                    manifest_transfer_id = %manifest_transfer_id,
                    error = %e,
                    "Cannot poll manifest transfer"
                );
                transfer.complete(
                    TransferStatusCode::Failed,
                    Some(format!("manifest transfer lost: {e}")),
                    Utc::now(),
                );
                return;
            }
        };

        match status.code {
            TransferStatusCode::Succeeded => {
                let message = (transfer.status.num_files_skipped > 0).then(|| {
                    format!(
                        "{} file(s) skipped by endpoint",
                        transfer.status.num_files_skipped
                    )
                });
                transfer.complete(TransferStatusCode::Succeeded, message, Utc::now());
            }
            TransferStatusCode::Failed | TransferStatusCode::Canceled => {
                let message = status
                    .message
                    .unwrap_or_else(|| "manifest transfer failed".to_string());
                transfer.complete(TransferStatusCode::Failed, Some(message), Utc::now());
            }
            _ => {}
        }
    }
}
