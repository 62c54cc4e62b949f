//! # In-Memory Test Providers
//!
//! Latency-driven fakes used by orchestration tests and local development:
//! a [`TestDatabase`] that stages files after a configurable delay and a
//! [`TestEndpoint`] that completes transfers after another. The two share a
//! [`StagedFiles`] set so the endpoint starts reporting files as staged the
//! moment the database finishes staging them.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{DtsError, DtsResult};
use crate::model::{DataDescriptor, EndpointTransferStatus, StagingStatus, TransferStatusCode};
use crate::providers::{Database, Endpoint, FileTransfer, SearchParameters, SearchResults};

/// Provider family name shared by the test providers
pub const PROVIDER_NAME: &str = "test";

/// File ids whose staging has completed, shared between a database and its
/// endpoints
#[derive(Debug, Clone, Default)]
pub struct StagedFiles {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_all(&self, ids: impl IntoIterator<Item = String>) {
        let mut staged = self.inner.lock().expect("staged set lock poisoned");
        staged.extend(ids);
    }

    pub fn contains_all<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        let staged = self.inner.lock().expect("staged set lock poisoned");
        ids.into_iter().all(|id| staged.contains(id))
    }
}

#[derive(Debug)]
struct StagingRecord {
    file_ids: Vec<String>,
    started: Instant,
}

/// A metadata catalog over a fixed descriptor table
#[derive(Debug)]
pub struct TestDatabase {
    name: String,
    local_user: String,
    staging_duration: Duration,
    fail_staging: bool,
    descriptors: Vec<DataDescriptor>,
    staged: StagedFiles,
    stagings: Mutex<HashMap<Uuid, StagingRecord>>,
    saved_state: Mutex<Option<serde_json::Value>>,
}

impl TestDatabase {
    pub fn new(
        name: impl Into<String>,
        descriptors: Vec<DataDescriptor>,
        staging_duration: Duration,
        staged: StagedFiles,
    ) -> Self {
        Self {
            name: name.into(),
            local_user: "testuser".to_string(),
            staging_duration,
            fail_staging: false,
            descriptors,
            staged,
            stagings: Mutex::new(HashMap::new()),
            saved_state: Mutex::new(None),
        }
    }

    /// Override the username returned by `local_user`
    pub fn with_local_user(mut self, user: impl Into<String>) -> Self {
        self.local_user = user.into();
        self
    }

    /// Force every staging operation to report failure
    pub fn with_failing_staging(mut self) -> Self {
        self.fail_staging = true;
        self
    }

    /// State blob restored by `load_state`, if any (test inspection)
    pub fn restored_state(&self) -> Option<serde_json::Value> {
        self.saved_state.lock().expect("state lock poisoned").clone()
    }
}

#[async_trait]
impl Database for TestDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _orcid: &str, params: &SearchParameters) -> DtsResult<SearchResults> {
        let descriptors = self
            .descriptors
            .iter()
            .filter(|d| params.query.is_empty() || d.name.contains(&params.query))
            .cloned()
            .collect();
        Ok(SearchResults { descriptors })
    }

    async fn descriptors(
        &self,
        _orcid: &str,
        file_ids: &[String],
    ) -> DtsResult<Vec<DataDescriptor>> {
        file_ids
            .iter()
            .map(|id| {
                self.descriptors
                    .iter()
                    .find(|d| &d.id == id)
                    .cloned()
                    .ok_or_else(|| DtsError::file_not_found(id.clone()))
            })
            .collect()
    }

    async fn stage_files(&self, _orcid: &str, file_ids: &[String]) -> DtsResult<Uuid> {
        let staging_id = Uuid::new_v4();
        self.stagings
            .lock()
            .expect("staging table lock poisoned")
            .insert(
                staging_id,
                StagingRecord {
                    file_ids: file_ids.to_vec(),
                    started: Instant::now(),
                },
            );
        Ok(staging_id)
    }

    async fn staging_status(&self, staging_id: Uuid) -> DtsResult<StagingStatus> {
        if self.fail_staging {
            return Ok(StagingStatus::Failed);
        }
        let mut stagings = self.stagings.lock().expect("staging table lock poisoned");
        let Some(record) = stagings.get(&staging_id) else {
            return Ok(StagingStatus::Unknown);
        };
        if record.started.elapsed() >= self.staging_duration {
            let record = stagings.remove(&staging_id).expect("record just observed");
            self.staged.insert_all(record.file_ids);
            Ok(StagingStatus::Succeeded)
        } else {
            Ok(StagingStatus::Active)
        }
    }

    async fn local_user(&self, _orcid: &str) -> DtsResult<String> {
        Ok(self.local_user.clone())
    }

    async fn save_state(&self) -> DtsResult<Option<serde_json::Value>> {
        Ok(Some(serde_json::json!({
            "version": 1,
            "database": self.name,
        })))
    }

    async fn load_state(&self, state: serde_json::Value) -> DtsResult<()> {
        *self.saved_state.lock().expect("state lock poisoned") = Some(state);
        Ok(())
    }
}

#[derive(Debug)]
struct TestTransfer {
    num_files: usize,
    started: Instant,
    canceled: bool,
}

/// A bulk-transfer endpoint that completes transfers after a fixed delay
#[derive(Debug)]
pub struct TestEndpoint {
    name: String,
    id: Uuid,
    transfer_duration: Duration,
    staged: StagedFiles,
    always_staged: bool,
    transfers: Mutex<HashMap<Uuid, TestTransfer>>,
}

impl TestEndpoint {
    pub fn new(
        name: impl Into<String>,
        transfer_duration: Duration,
        staged: StagedFiles,
    ) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            transfer_duration,
            staged,
            always_staged: false,
            transfers: Mutex::new(HashMap::new()),
        }
    }

    /// Report every file as already staged, skipping the staging phase
    pub fn with_always_staged(mut self) -> Self {
        self.always_staged = true;
        self
    }
}

#[async_trait]
impl Endpoint for TestEndpoint {
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
        PathBuf::from("/")
    }

    async fn files_staged(&self, descriptors: &[DataDescriptor]) -> DtsResult<bool> {
        if self.always_staged {
            return Ok(true);
        }
        Ok(self
            .staged
            .contains_all(descriptors.iter().map(|d| d.id.as_str())))
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
        self.transfers
            .lock()
            .expect("transfer table lock poisoned")
            .insert(
                transfer_id,
                TestTransfer {
                    num_files: files.len(),
                    started: Instant::now(),
                    canceled: false,
                },
            );
        Ok(transfer_id)
    }

    async fn status(&self, transfer_id: Uuid) -> DtsResult<EndpointTransferStatus> {
        let transfers = self.transfers.lock().expect("transfer table lock poisoned");
        let Some(transfer) = transfers.get(&transfer_id) else {
            return Err(DtsError::NotFound {
                kind: "Endpoint transfer".to_string(),
                id: transfer_id.to_string(),
            });
        };

        let status = if transfer.canceled {
            EndpointTransferStatus {
                code: TransferStatusCode::Canceled,
                num_files: transfer.num_files,
                message: Some("transfer canceled at user request".to_string()),
                ..EndpointTransferStatus::default()
            }
        } else if transfer.started.elapsed() >= self.transfer_duration {
            EndpointTransferStatus {
                code: TransferStatusCode::Succeeded,
                num_files: transfer.num_files,
                num_files_transferred: transfer.num_files,
                ..EndpointTransferStatus::default()
            }
        } else {
            EndpointTransferStatus {
                code: TransferStatusCode::Active,
                num_files: transfer.num_files,
                ..EndpointTransferStatus::default()
            }
        };
        Ok(status)
    }

    async fn cancel(&self, transfer_id: Uuid) -> DtsResult<()> {
        let mut transfers = self.transfers.lock().expect("transfer table lock poisoned");
        if let Some(transfer) = transfers.get_mut(&transfer_id) {
            // a transfer that already ran to completion cannot be canceled
            if transfer.started.elapsed() < self.transfer_duration {
                transfer.canceled = true;
            }
        }
        Ok(())
    }

    async fn transfers(&self) -> DtsResult<Vec<Uuid>> {
        Ok(self
            .transfers
            .lock()
            .expect("transfer table lock poisoned")
            .keys()
            .copied()
            .collect())
    }
}
