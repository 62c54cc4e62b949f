//! # Transfer Lifecycle
//!
//! Per-tick advancement of a transfer through
//! `New → Staging → Active → Finalizing → Succeeded/Failed/Canceled`.
//!
//! The advancer holds the provider handles and drives one transfer one
//! step per poll tick: each task advances against its source endpoint
//! (`tasks`), and once every task has succeeded the manifest is built and
//! shipped (`finalization`). Any provider error is captured into the
//! transfer's status; nothing here can fail the orchestrator loop.

mod finalization;
mod tasks;

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use dts_shared::config::ServiceConfig;
use dts_shared::model::{Transfer, TransferStatusCode};
use dts_shared::providers::{Endpoint, ProviderRegistry};

/// Status message recorded when a user cancels a transfer
pub const CANCELED_MESSAGE: &str = "Task canceled at user request";

/// Advances transfers through their state machine, one step per tick
pub(crate) struct TransferAdvancer {
    registry: Arc<ProviderRegistry>,
    local_endpoint: Arc<dyn Endpoint>,
    service: ServiceConfig,
}

impl TransferAdvancer {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        local_endpoint: Arc<dyn Endpoint>,
        service: ServiceConfig,
    ) -> Self {
        Self {
            registry,
            local_endpoint,
            service,
        }
    }

    /// Advance a transfer one step. Terminal transfers are never touched.
    pub async fn advance(&self, transfer: &mut Transfer) {
        if transfer.is_terminal() {
            return;
        }
        let previous_code = transfer.status.code;

        if transfer.canceled {
            self.drive_canceled(transfer);
        } else {
            let orcid = transfer.spec.orcid.clone();
            for task in transfer.tasks.iter_mut() {
                if !task.status.code.is_terminal() {
                    self.advance_task(&orcid, task).await;
                }
            }

            let (transferred, skipped) = transfer.task_file_counts();
            transfer.status.num_files_transferred = transferred;
            transfer.status.num_files_skipped = skipped;

            let all_succeeded = transfer
                .tasks
                .iter()
                .all(|t| t.status.code == TransferStatusCode::Succeeded);
            if all_succeeded {
                // a transfer whose descriptors are all inline has no tasks
                // but still delivers a manifest
                self.finalize(transfer).await;
            } else {
                self.fold_task_codes(transfer);
            }
        }

        if transfer.status.code != previous_code {
            info!(
                transfer_id = %transfer.id,
                from = %previous_code,
                to = %transfer.status.code,
                num_files = transfer.status.num_files,
                payload_gb = transfer.payload_gb,
                "Transfer state changed"
            );
        }
    }

    /// Fold task codes into the transfer code while tasks are in flight
    fn fold_task_codes(&self, transfer: &mut Transfer) {
        let aggregate = transfer.aggregate_task_code();
        match aggregate {
            TransferStatusCode::Failed | TransferStatusCode::Canceled => {
                let message = transfer
                    .tasks
                    .iter()
                    .find(|t| t.status.code == aggregate)
                    .and_then(|t| t.status.message.clone());
                transfer.complete(aggregate, message, Utc::now());
            }
            code => transfer.status.code = code,
        }
    }

    /// Drive a canceled transfer to its terminal code. The endpoint cancel
    /// calls were already dispatched when cancellation was requested.
    fn drive_canceled(&self, transfer: &mut Transfer) {
        for task in transfer.tasks.iter_mut() {
            if !task.status.code.is_terminal() {
                task.status.staging_id = None;
                task.status.transfer_id = None;
                task.status.fail(CANCELED_MESSAGE);
            }
        }
        transfer.complete(
            TransferStatusCode::Failed,
            Some(CANCELED_MESSAGE.to_string()),
            Utc::now(),
        );
    }
}
