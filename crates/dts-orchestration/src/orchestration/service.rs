//! # Transfer Service
//!
//! The dispatcher: the public face of the orchestration engine. Every
//! operation is synchronous from the caller's viewpoint but crosses into
//! the processor task through request/reply channels. Validation that does
//! not need the transfer map (empty file list, unknown database names)
//! happens here, before the orchestrator is contacted.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use dts_shared::config::DtsConfig;
use dts_shared::errors::{DtsError, DtsResult};
use dts_shared::model::{TransferSpecification, TransferStatus};
use dts_shared::providers::{CustomEndpointSpec, ProviderRegistry};

use super::commands::{CommandResponder, OrchestrationCommand};
use super::journal::{FileJournal, JournalSink};
use super::processor::CommandProcessor;
use super::store::TransferStore;

/// Capacity of the dispatcher-to-processor command channel
const COMMAND_BUFFER_SIZE: usize = 64;

struct ProcessorHandle {
    commands: mpsc::Sender<OrchestrationCommand>,
    join: JoinHandle<()>,
}

/// Front end to the orchestration engine
pub struct TransferService {
    config: DtsConfig,
    registry: Arc<ProviderRegistry>,
    journal: Arc<dyn JournalSink>,
    handle: Mutex<Option<ProcessorHandle>>,
}

impl std::fmt::Debug for TransferService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferService")
            .field("running", &self.running())
            .finish()
    }
}

impl TransferService {
    /// Create a service over a configuration and provider registry. The
    /// journal defaults to a JSONL file in the data directory.
    pub fn new(config: DtsConfig, registry: Arc<ProviderRegistry>) -> Self {
        let journal = Arc::new(FileJournal::new(&config.service.data_dir));
        Self {
            config,
            registry,
            journal,
            handle: Mutex::new(None),
        }
    }

    /// Replace the journal sink (tests usually install a no-op)
    pub fn with_journal(mut self, journal: Arc<dyn JournalSink>) -> Self {
        self.journal = journal;
        self
    }

    /// Validate directories and the local endpoint, load persisted state,
    /// and spawn the orchestration processor
    pub async fn start(&self) -> DtsResult<()> {
        if self.running() {
            return Err(DtsError::AlreadyRunning);
        }

        probe_directory(&self.config.service.data_dir, "data directory")?;
        probe_directory(&self.config.service.manifest_dir, "manifest directory")?;
        let local_endpoint = self.registry.endpoint(&self.config.service.endpoint)?;

        let store = TransferStore::new(
            &self.config.service.data_dir,
            self.config.service.instance.as_deref(),
        );
        let saved = store.load().await;
        for (name, blob) in saved.database_states {
            if !self.registry.has_database(&name) {
                warn!(database = %name, "Persisted state for unconfigured database; dropped");
                continue;
            }
            match self.registry.database(&name) {
                Ok(database) => {
                    if let Err(e) = database.load_state(blob).await {
                        warn!(database = %name, error = %e, "Database driver state not restored");
                    }
                }
                Err(e) => warn!(database = %name, error = %e, "Cannot construct database"),
            }
        }

        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let processor = CommandProcessor::new(
            command_rx,
            saved.transfers,
            self.registry.clone(),
            local_endpoint,
            store,
            self.journal.clone(),
            self.config.service.clone(),
        );

        let mut guard = self.handle.lock().expect("service handle lock poisoned");
        if guard.is_some() {
            return Err(DtsError::AlreadyRunning);
        }
        let join = tokio::spawn(processor.run());
        *guard = Some(ProcessorHandle { commands, join });
        info!("Transfer service started");
        Ok(())
    }

    /// Signal the processor to persist and exit, then wait for it. A failed
    /// state save is returned, but the service still stops.
    pub async fn stop(&self) -> DtsResult<()> {
        let handle = self
            .handle
            .lock()
            .expect("service handle lock poisoned")
            .take()
            .ok_or(DtsError::NotRunning)?;

        let (resp, reply) = oneshot::channel();
        let save_result = if handle
            .commands
            .send(OrchestrationCommand::Shutdown { resp })
            .await
            .is_ok()
        {
            reply.await.unwrap_or(Ok(()))
        } else {
            // processor already exited; nothing left to signal
            Ok(())
        };

        if let Err(e) = handle.join.await {
            warn!(error = %e, "Orchestration processor join failed");
        }
        info!("Transfer service stopped");
        save_result
    }

    /// Whether the orchestration processor is running
    pub fn running(&self) -> bool {
        self.handle
            .lock()
            .expect("service handle lock poisoned")
            .is_some()
    }

    /// Validate a specification and create a transfer; replies with its id
    pub async fn create(&self, spec: TransferSpecification) -> DtsResult<Uuid> {
        if spec.file_ids.is_empty() {
            return Err(DtsError::NoFilesRequested);
        }
        if !self.registry.has_database(&spec.source) {
            return Err(DtsError::UnknownSource(spec.source));
        }
        if !self.registry.has_database(&spec.destination)
            && CustomEndpointSpec::parse(&spec.destination).is_none()
        {
            return Err(DtsError::UnknownDestination(spec.destination));
        }
        self.send(|resp| OrchestrationCommand::CreateTransfer { spec, resp })
            .await
    }

    /// Current status of a transfer, or `NotFound` once purged
    pub async fn status(&self, transfer_id: Uuid) -> DtsResult<TransferStatus> {
        self.send(|resp| OrchestrationCommand::GetStatus { transfer_id, resp })
            .await
    }

    /// Request cancellation; returns as soon as intent is recorded
    pub async fn cancel(&self, transfer_id: Uuid) -> DtsResult<()> {
        self.send(|resp| OrchestrationCommand::CancelTransfer { transfer_id, resp })
            .await
    }

    async fn send<T>(
        &self,
        command: impl FnOnce(CommandResponder<T>) -> OrchestrationCommand,
    ) -> DtsResult<T> {
        let sender = {
            let guard = self.handle.lock().expect("service handle lock poisoned");
            guard
                .as_ref()
                .ok_or(DtsError::NotRunning)?
                .commands
                .clone()
        };

        let (resp, reply) = oneshot::channel();
        sender
            .send(command(resp))
            .await
            .map_err(|_| DtsError::NotRunning)?;
        reply.await.map_err(|_| DtsError::NotRunning)?
    }
}

/// Round-trip a probe file to prove the directory is readable and writable
fn probe_directory(dir: &Path, label: &str) -> DtsResult<()> {
    if !dir.is_dir() {
        return Err(DtsError::configuration(format!(
            "{label} '{}' is not a directory",
            dir.display()
        )));
    }

    let probe = dir.join(format!(".dts-probe-{}", Uuid::new_v4()));
    let contents = b"dts probe";
    std::fs::write(&probe, contents).map_err(|e| {
        DtsError::configuration(format!("{label} '{}' is not writable: {e}", dir.display()))
    })?;
    let read_back = std::fs::read(&probe).map_err(|e| {
        DtsError::configuration(format!("{label} '{}' is not readable: {e}", dir.display()))
    });
    let _ = std::fs::remove_file(&probe);

    match read_back {
        Ok(read_back) if read_back == contents => Ok(()),
        Ok(_) => Err(DtsError::configuration(format!(
            "{label} '{}' corrupted the probe file",
            dir.display()
        ))),
        Err(e) => Err(e),
    }
}
