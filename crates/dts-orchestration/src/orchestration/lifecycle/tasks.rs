//! # Task Advancement
//!
//! Per-tick transitions for one task against its source database and source
//! endpoint: begin or poll staging, begin the bulk transfer once files are
//! staged, poll the bulk transfer to completion.

use std::path::PathBuf;

use tracing::{debug, error, info};

use dts_shared::errors::{DtsError, DtsResult};
use dts_shared::model::{StagingStatus, TransferStatusCode, TransferTask};
use dts_shared::providers::FileTransfer;

use super::TransferAdvancer;

impl TransferAdvancer {
    /// Advance one task one step; provider failures fail the task, never
    /// the loop
    pub(super) async fn advance_task(&self, orcid: &str, task: &mut TransferTask) {
        let previous = task.status.code;
        if let Err(e) = self.try_advance_task(orcid, task).await {
            error!(
                transfer_id = %task.transfer_id,
                task_index = task.index,
                source_endpoint = %task.source_endpoint,
                error = %e,
                "Task advancement failed"
            );
            task.status.staging_id = None;
            task.status.transfer_id = None;
            task.status.fail(e.to_string());
        }
        if task.status.code != previous {
            debug!(
                transfer_id = %task.transfer_id,
                task_index = task.index,
                from = %previous,
                to = %task.status.code,
                "Task state changed"
            );
        }
    }

    async fn try_advance_task(&self, orcid: &str, task: &mut TransferTask) -> DtsResult<()> {
        match task.status.code {
            TransferStatusCode::New | TransferStatusCode::Unknown => {
                self.start_task(orcid, task).await
            }
            TransferStatusCode::Staging => self.poll_staging(task).await,
            TransferStatusCode::Active | TransferStatusCode::Inactive => {
                self.poll_transfer(task).await
            }
            _ => Ok(()),
        }
    }

    /// First step: transfer immediately when the files are already present
    /// at the source endpoint, otherwise ask the database to stage them
    async fn start_task(&self, orcid: &str, task: &mut TransferTask) -> DtsResult<()> {
        let endpoint = self.registry.endpoint(&task.source_endpoint)?;
        if endpoint.files_staged(&task.descriptors).await? {
            return self.begin_transfer(task).await;
        }

        let database = self.registry.database(&task.source)?;
        let file_ids: Vec<String> = task.descriptors.iter().map(|d| d.id.clone()).collect();
        let staging_id = database.stage_files(orcid, &file_ids).await?;
        task.status.begin_staging(staging_id);
        info!(
            transfer_id = %task.transfer_id,
            task_index = task.index,
            staging_id = %staging_id,
            num_files = file_ids.len(),
            "Staging files at source database"
        );
        Ok(())
    }

    async fn poll_staging(&self, task: &mut TransferTask) -> DtsResult<()> {
        let staging_id = task.status.staging_id.ok_or_else(|| {
            DtsError::provider("task is staging but holds no staging id")
        })?;
        let database = self.registry.database(&task.source)?;

        match database.staging_status(staging_id).await? {
            StagingStatus::Succeeded => {
                task.status.staging_status = StagingStatus::Succeeded;
                if self.service.double_check_staging {
                    let endpoint = self.registry.endpoint(&task.source_endpoint)?;
                    if !endpoint.files_staged(&task.descriptors).await? {
                        task.status.staging_id = None;
                        task.status.fail(format!(
                            "source database reports files staged, but endpoint \
                             '{}' cannot see them; its endpoint root is likely \
                             misconfigured",
                            task.source_endpoint
                        ));
                        return Ok(());
                    }
                }
                self.begin_transfer(task).await
            }
            StagingStatus::Failed => {
                task.status.staging_status = StagingStatus::Failed;
                task.status.staging_id = None;
                task.status.fail("file staging failed at source database");
                Ok(())
            }
            status @ (StagingStatus::Active | StagingStatus::Unknown) => {
                task.status.staging_status = status;
                Ok(())
            }
        }
    }

    /// Submit the endpoint-to-endpoint transfer for every file of this
    /// task, swapping the staging id for the endpoint transfer id
    async fn begin_transfer(&self, task: &mut TransferTask) -> DtsResult<()> {
        let source = self.registry.endpoint(&task.source_endpoint)?;
        let destination = self.registry.endpoint(&task.destination_endpoint)?;

        // task descriptors are all transferable by construction
        let files: Vec<FileTransfer> = task
            .descriptors
            .iter()
            .filter_map(|descriptor| {
                let path = descriptor.path.as_deref()?;
                Some(FileTransfer {
                    source_path: PathBuf::from(path),
                    destination_path: PathBuf::from(&task.destination_folder).join(path),
                    hash: descriptor.hash.clone(),
                    hash_algorithm: descriptor.hash_algorithm.clone(),
                })
            })
            .collect();

        let endpoint_transfer_id = source.transfer(destination.as_ref(), &files).await?;
        task.status.begin_transfer(endpoint_transfer_id, files.len());
        info!(
            transfer_id = %task.transfer_id,
            task_index = task.index,
            endpoint_transfer_id = %endpoint_transfer_id,
            num_files = files.len(),
            source_endpoint = %task.source_endpoint,
            destination_endpoint = %task.destination_endpoint,
            "Endpoint transfer started"
        );
        Ok(())
    }

    async fn poll_transfer(&self, task: &mut TransferTask) -> DtsResult<()> {
        let endpoint_transfer_id = task.status.transfer_id.ok_or_else(|| {
            DtsError::provider("task is transferring but holds no transfer id")
        })?;
        let endpoint = self.registry.endpoint(&task.source_endpoint)?;
        let status = endpoint.status(endpoint_transfer_id).await?;

        match status.code {
            TransferStatusCode::Succeeded => {
                task.status.transfer_id = None;
                task.status.transfer_status = Some(status);
                task.status.code = TransferStatusCode::Succeeded;
            }
            TransferStatusCode::Failed => {
                task.status.transfer_id = None;
                let message = status
                    .message
                    .clone()
                    .unwrap_or_else(|| "endpoint transfer failed".to_string());
                task.status.transfer_status = Some(status);
                task.status.fail(message);
            }
            TransferStatusCode::Canceled => {
                task.status.transfer_id = None;
                task.status.message = status.message.clone();
                task.status.transfer_status = Some(status);
                task.status.code = TransferStatusCode::Canceled;
            }
            code @ (TransferStatusCode::Active | TransferStatusCode::Inactive) => {
                task.status.transfer_status = Some(status);
                task.status.code = code;
            }
            _ => {
                // Unknown from the endpoint: keep the current code, poll again
                task.status.transfer_status = Some(status);
            }
        }
        Ok(())
    }
}
