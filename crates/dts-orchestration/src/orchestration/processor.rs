//! # Orchestration Command Processor
//!
//! The single owner of the transfer map. One spawned task selects over the
//! command channel and a periodic poll tick; every mutation of transfer
//! state happens here, so no lock guards the map. Dispatcher calls block on
//! oneshot replies, which linearizes create/status/cancel against the tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dts_shared::config::ServiceConfig;
use dts_shared::errors::{DtsError, DtsResult};
use dts_shared::model::{Transfer, TransferSpecification, TransferStatus, TransferStatusCode};
use dts_shared::providers::{CustomEndpointSpec, Endpoint, ProviderRegistry};

use super::commands::OrchestrationCommand;
use super::journal::{JournalSink, TransferRecord};
use super::lifecycle::TransferAdvancer;
use super::store::{SavedState, TransferStore};

/// How long a cancel request waits for the endpoint before detaching.
/// Endpoint cancellation is best-effort; the control loop must not block on
/// a slow provider.
const CANCEL_SOFT_TIMEOUT: Duration = Duration::from_millis(10);

/// Owns the transfer map and advances it on commands and poll ticks
pub(crate) struct CommandProcessor {
    commands: mpsc::Receiver<OrchestrationCommand>,
    transfers: HashMap<Uuid, Transfer>,
    registry: Arc<ProviderRegistry>,
    advancer: TransferAdvancer,
    store: TransferStore,
    journal: Arc<dyn JournalSink>,
    service: ServiceConfig,
}

impl CommandProcessor {
    pub fn new(
        commands: mpsc::Receiver<OrchestrationCommand>,
        transfers: HashMap<Uuid, Transfer>,
        registry: Arc<ProviderRegistry>,
        local_endpoint: Arc<dyn Endpoint>,
        store: TransferStore,
        journal: Arc<dyn JournalSink>,
        service: ServiceConfig,
    ) -> Self {
        let advancer =
            TransferAdvancer::new(registry.clone(), local_endpoint, service.clone());
        Self {
            commands,
            transfers,
            registry,
            advancer,
            store,
            journal,
            service,
        }
    }

    /// Control loop: commands and poll ticks, until shutdown
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.service.poll_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            transfers = self.transfers.len(),
            poll_interval_ms = self.service.poll_interval_ms,
            "Orchestration processor started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(OrchestrationCommand::Shutdown { resp }) => {
                        let result = self.persist().await;
                        let _ = resp.send(result);
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        warn!("Command channel closed; persisting and stopping");
                        if let Err(e) = self.persist().await {
                            error!(error = %e, "Cannot persist transfer state");
                        }
                        break;
                    }
                },
                _ = tick.tick() => {
                    self.advance_all().await;
                    self.purge_expired();
                }
            }
        }

        info!("Orchestration processor stopped");
    }

    async fn handle_command(&mut self, command: OrchestrationCommand) {
        match command {
            OrchestrationCommand::CreateTransfer { spec, resp } => {
                let result = self.create_transfer(spec).await;
                let _ = resp.send(result);
            }
            OrchestrationCommand::GetStatus { transfer_id, resp } => {
                let result = self.transfer_status(transfer_id);
                let _ = resp.send(result);
            }
            OrchestrationCommand::CancelTransfer { transfer_id, resp } => {
                let result = self.cancel_transfer(transfer_id).await;
                let _ = resp.send(result);
            }
            OrchestrationCommand::Shutdown { .. } => unreachable!("handled by the loop"),
        }
    }

    /// Resolve descriptors, validate the payload, and append the transfer
    async fn create_transfer(&mut self, spec: TransferSpecification) -> DtsResult<Uuid> {
        if spec.file_ids.is_empty() {
            return Err(DtsError::NoFilesRequested);
        }
        if !self.registry.has_database(&spec.source) {
            return Err(DtsError::UnknownSource(spec.source));
        }

        let source = self.registry.database(&spec.source)?;
        let descriptors = source.descriptors(&spec.orcid, &spec.file_ids).await?;

        let transfer_id = Uuid::new_v4();
        let (destination_endpoint, destination_folder) =
            self.resolve_destination(&spec, transfer_id).await?;
        let source_endpoints = self.registry.database_endpoint_names(&spec.source);

        let transfer = Transfer::assemble(
            transfer_id,
            spec,
            descriptors,
            &source_endpoints,
            &destination_endpoint,
            destination_folder,
            self.service.max_payload_gb,
            Utc::now(),
        )?;

        info!(
            transfer_id = %transfer_id,
            num_files = transfer.status.num_files,
            num_tasks = transfer.tasks.len(),
            payload_gb = transfer.payload_gb,
            source = %transfer.spec.source,
            destination = %transfer.spec.destination,
            "Transfer created"
        );
        self.transfers.insert(transfer_id, transfer);
        Ok(transfer_id)
    }

    /// The destination is a configured database, or a custom endpoint spec
    /// of the form `<provider>:<uuid>[:<credential>]`
    async fn resolve_destination(
        &self,
        spec: &TransferSpecification,
        transfer_id: Uuid,
    ) -> DtsResult<(String, String)> {
        if self.registry.has_database(&spec.destination) {
            let destination = self.registry.database(&spec.destination)?;
            let local_user = destination.local_user(&spec.orcid).await?;
            let endpoint = self
                .registry
                .database_endpoint_names(&spec.destination)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    DtsError::configuration(format!(
                        "destination database '{}' has no configured endpoint",
                        spec.destination
                    ))
                })?;
            return Ok((endpoint, format!("{local_user}/dts-{transfer_id}")));
        }

        if let Some(custom) = CustomEndpointSpec::parse(&spec.destination) {
            // no destination database to resolve a local user against
            let endpoint = self.registry.endpoint_for_custom(&custom)?;
            return Ok((endpoint.name().to_string(), format!("dts-{transfer_id}")));
        }

        Err(DtsError::UnknownDestination(spec.destination.clone()))
    }

    fn transfer_status(&self, transfer_id: Uuid) -> DtsResult<TransferStatus> {
        self.transfers
            .get(&transfer_id)
            .map(|t| t.status.clone())
            .ok_or_else(|| DtsError::transfer_not_found(transfer_id))
    }

    /// Mark cancellation intent and dispatch best-effort endpoint cancels.
    /// Terminal and already-canceled transfers are a no-op; the reply never
    /// waits for a provider longer than the soft timeout.
    async fn cancel_transfer(&mut self, transfer_id: Uuid) -> DtsResult<()> {
        let transfer = self
            .transfers
            .get_mut(&transfer_id)
            .ok_or_else(|| DtsError::transfer_not_found(transfer_id))?;
        if transfer.is_terminal() || transfer.canceled {
            return Ok(());
        }
        transfer.canceled = true;
        info!(transfer_id = %transfer_id, "Transfer cancellation requested");

        for task in &transfer.tasks {
            let Some(endpoint_transfer_id) = task.status.transfer_id else {
                continue;
            };
            let Ok(endpoint) = self.registry.endpoint(&task.source_endpoint) else {
                continue;
            };
            let handle = tokio::spawn(async move {
                if let Err(e) = endpoint.cancel(endpoint_transfer_id).await {
                    warn!(
                        endpoint_transfer_id = %endpoint_transfer_id,
                        error = %e,
                        "Endpoint cancel failed"
                    );
                }
            });
            if tokio::time::timeout(CANCEL_SOFT_TIMEOUT, handle).await.is_err() {
                debug!(
                    transfer_id = %transfer_id,
                    task_index = task.index,
                    "Endpoint cancel still in flight; not waiting"
                );
            }
        }
        Ok(())
    }

    /// Advance every non-terminal transfer one step, journaling
    /// failed-transfer transitions
    async fn advance_all(&mut self) {
        let journal = self.journal.clone();
        for transfer in self.transfers.values_mut() {
            if transfer.is_terminal() {
                continue;
            }
            self.advancer.advance(transfer).await;
            if transfer.status.code == TransferStatusCode::Failed {
                let record = TransferRecord::from_transfer(transfer);
                if let Err(e) = journal.record(&record).await {
                    warn!(transfer_id = %transfer.id, error = %e, "Cannot journal transfer");
                }
            }
        }
    }

    /// Drop records older than `completion_time + delete_after`
    fn purge_expired(&mut self) {
        let now = Utc::now();
        let delete_after = self.service.delete_after();
        let expired: Vec<Uuid> = self
            .transfers
            .values()
            .filter(|t| t.purgeable(now, delete_after))
            .map(|t| t.id)
            .collect();
        for transfer_id in expired {
            self.transfers.remove(&transfer_id);
            info!(transfer_id = %transfer_id, "Purged expired transfer record");
        }
    }

    /// Snapshot the transfer map and the drivers' opaque state
    async fn persist(&mut self) -> DtsResult<()> {
        let mut database_states = HashMap::new();
        for (name, database) in self.registry.constructed_databases() {
            match database.save_state().await {
                Ok(Some(blob)) => {
                    database_states.insert(name, blob);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(database = %name, error = %e, "Database driver state not saved");
                }
            }
        }

        let state = SavedState {
            transfers: self.transfers.clone(),
            database_states,
        };
        self.store.save(&state).await
    }
}
