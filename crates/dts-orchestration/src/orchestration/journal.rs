//! # Transfer Journal
//!
//! An append-only record of failed transfers, one JSON line per
//! failed-transfer transition. The sink is pluggable: production appends to
//! a file in the data directory, tests usually discard records. Journaling
//! failures are logged by the caller and never fail a transfer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use dts_shared::model::{Transfer, TransferStatusCode};
use dts_shared::DtsResult;

/// One journal entry for a failed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub source: String,
    pub destination: String,
    pub orcid: String,
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
    pub status: TransferStatusCode,
    pub payload_gb: f64,
    pub num_files: usize,
}

impl TransferRecord {
    /// Snapshot a transfer at its failing transition
    pub fn from_transfer(transfer: &Transfer) -> Self {
        Self {
            id: transfer.id,
            source: transfer.spec.source.clone(),
            destination: transfer.spec.destination.clone(),
            orcid: transfer.spec.orcid.clone(),
            start_time: transfer.start_time,
            stop_time: transfer.completion_time,
            status: transfer.status.code,
            payload_gb: transfer.payload_gb,
            num_files: transfer.status.num_files,
        }
    }
}

/// Destination for completed-transfer records
#[async_trait]
pub trait JournalSink: Send + Sync {
    async fn record(&self, record: &TransferRecord) -> DtsResult<()>;
}

/// Appends records as JSON lines to `<data_dir>/journal.jsonl`
#[derive(Debug, Clone)]
pub struct FileJournal {
    path: PathBuf,
}

impl FileJournal {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("journal.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl JournalSink for FileJournal {
    async fn record(&self, record: &TransferRecord) -> DtsResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        let mut file = options.open(&self.path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &line).await?;

        debug!(transfer_id = %record.id, status = %record.status, "Journaled transfer");
        Ok(())
    }
}

/// Discards every record; the default for tests
#[derive(Debug, Clone, Default)]
pub struct NoopJournal;

#[async_trait]
impl JournalSink for NoopJournal {
    async fn record(&self, _record: &TransferRecord) -> DtsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> TransferRecord {
        TransferRecord {
            id: Uuid::new_v4(),
            source: "jdp".to_string(),
            destination: "kbase".to_string(),
            orcid: "0000-0002-1825-0097".to_string(),
            start_time: Utc::now(),
            stop_time: Some(Utc::now()),
            status: TransferStatusCode::Failed,
            payload_gb: 0.25,
            num_files: 3,
        }
    }

    #[tokio::test]
    async fn test_file_journal_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::new(dir.path());

        let first = sample_record();
        let second = sample_record();
        journal.record(&first).await.unwrap();
        journal.record(&second).await.unwrap();

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let restored: TransferRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(restored, first);
        let restored: TransferRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(restored.id, second.id);
    }

    #[tokio::test]
    async fn test_noop_journal_accepts_records() {
        NoopJournal.record(&sample_record()).await.unwrap();
    }
}
