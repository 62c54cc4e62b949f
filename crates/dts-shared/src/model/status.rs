//! # Transfer Status
//!
//! Status codes shared by transfers, tasks, and endpoint transfer reports,
//! plus the aggregation rule that folds task codes into a transfer code.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status code for a transfer, a task, or an endpoint-reported transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatusCode {
    #[default]
    Unknown,
    New,
    Staging,
    Active,
    Inactive,
    Finalizing,
    Succeeded,
    Failed,
    Canceled,
}

impl TransferStatusCode {
    /// Terminal codes are sticky: once reached, the record is never mutated
    /// again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Aggregation precedence: a transfer reports the least-progressed code
    /// across its tasks, ranked `Failed > Canceled > Unknown > Staging >
    /// Active > Inactive > Finalizing > Succeeded > New`.
    fn precedence(self) -> usize {
        match self {
            Self::Failed => 0,
            Self::Canceled => 1,
            Self::Unknown => 2,
            Self::Staging => 3,
            Self::Active => 4,
            Self::Inactive => 5,
            Self::Finalizing => 6,
            Self::Succeeded => 7,
            Self::New => 8,
        }
    }

    /// Fold task codes into one transfer code. An empty iterator yields
    /// `Unknown`.
    pub fn aggregate(codes: impl IntoIterator<Item = Self>) -> Self {
        codes
            .into_iter()
            .min_by_key(|code| code.precedence())
            .unwrap_or(Self::Unknown)
    }
}

/// Status of a staging operation at a source database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum StagingStatus {
    #[default]
    Unknown,
    Active,
    Succeeded,
    Failed,
}

/// User-visible status of a transfer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferStatus {
    pub code: TransferStatusCode,
    pub num_files: usize,
    pub num_files_transferred: usize,
    pub num_files_skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransferStatus {
    /// Status of a freshly created transfer covering `num_files` file ids
    pub fn new(num_files: usize) -> Self {
        Self {
            code: TransferStatusCode::New,
            num_files,
            ..Self::default()
        }
    }
}

/// Status of a single task within a transfer
///
/// A task holds at most one foreign id at a time: the staging id while the
/// source database stages files, or the endpoint transfer id once the bulk
/// transfer has begun. [`TaskStatus::begin_transfer`] enforces the swap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub code: TransferStatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_id: Option<Uuid>,
    #[serde(default)]
    pub staging_status: StagingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_status: Option<EndpointTransferStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskStatus {
    /// Record the start of staging at the source database
    pub fn begin_staging(&mut self, staging_id: Uuid) {
        self.staging_id = Some(staging_id);
        self.staging_status = StagingStatus::Active;
        self.code = TransferStatusCode::Staging;
    }

    /// Record the start of the bulk transfer, releasing the staging id
    pub fn begin_transfer(&mut self, transfer_id: Uuid, num_files: usize) {
        self.staging_id = None;
        self.transfer_id = Some(transfer_id);
        self.transfer_status = Some(EndpointTransferStatus {
            code: TransferStatusCode::Active,
            num_files,
            ..EndpointTransferStatus::default()
        });
        self.code = TransferStatusCode::Active;
    }

    /// Mark the task failed with a status message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.code = TransferStatusCode::Failed;
        self.message = Some(message.into());
    }
}

/// Transfer status as reported by an endpoint provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointTransferStatus {
    pub code: TransferStatusCode,
    pub num_files: usize,
    pub num_files_transferred: usize,
    pub num_files_skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
