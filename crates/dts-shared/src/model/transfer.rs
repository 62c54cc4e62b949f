//! # Transfer and Task Entities
//!
//! A `Transfer` is one user request; its `TransferTask`s are the units that
//! interact with a single source endpoint each. Both are owned and mutated
//! exclusively by the orchestrator and serialized into the persistent store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DtsError, DtsResult};
use crate::model::descriptor::DataDescriptor;
use crate::model::specification::TransferSpecification;
use crate::model::status::{TaskStatus, TransferStatus, TransferStatusCode};

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// One user-requested transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub spec: TransferSpecification,
    /// Every resolved descriptor (transferable and inline), in file-id order
    pub descriptors: Vec<DataDescriptor>,
    /// One task per distinct source endpoint
    pub tasks: Vec<TransferTask>,
    /// Name of the endpoint files (and the manifest) are delivered to
    pub destination_endpoint: String,
    /// `<local-user>/dts-<id>` at the destination endpoint
    pub destination_folder: String,
    /// Total transferable payload in gigabytes
    pub payload_gb: f64,
    /// Endpoint transfer id of the manifest shipment, once submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_transfer_id: Option<Uuid>,
    pub status: TransferStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    /// Cancellation has been requested; the next tick drives the record to a
    /// terminal code
    #[serde(default)]
    pub canceled: bool,
}

/// The sub-unit of a transfer bound to one source endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTask {
    pub transfer_id: Uuid,
    pub index: usize,
    pub source: String,
    pub source_endpoint: String,
    pub destination: String,
    pub destination_endpoint: String,
    pub destination_folder: String,
    /// This task's slice of the transferable descriptors, order-preserving
    pub descriptors: Vec<DataDescriptor>,
    pub status: TaskStatus,
}

impl Transfer {
    /// Assemble a transfer from a validated specification and the
    /// descriptors resolved by the source database.
    ///
    /// Pure construction: separates inline from transferable descriptors,
    /// resolves each transferable descriptor's source endpoint, enforces the
    /// payload limit, and partitions the transferable descriptors into one
    /// ordered task per distinct source endpoint.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        id: Uuid,
        spec: TransferSpecification,
        descriptors: Vec<DataDescriptor>,
        source_endpoints: &[String],
        destination_endpoint: &str,
        destination_folder: String,
        max_payload_gb: f64,
        now: DateTime<Utc>,
    ) -> DtsResult<Self> {
        if source_endpoints.is_empty() {
            return Err(DtsError::configuration(format!(
                "source database '{}' has no configured endpoints",
                spec.source
            )));
        }

        let mut transferable: Vec<(String, DataDescriptor)> = Vec::new();
        for descriptor in &descriptors {
            if descriptor.is_transferable() {
                let endpoint = resolve_endpoint(descriptor, source_endpoints)?;
                transferable.push((endpoint, descriptor.clone()));
            } else if !descriptor.is_inline() {
                return Err(DtsError::invalid_descriptor(
                    &descriptor.id,
                    "descriptor has neither a path nor inline data",
                ));
            }
        }

        let payload_bytes: u64 = transferable.iter().map(|(_, d)| d.bytes).sum();
        let payload_gb = payload_bytes as f64 / BYTES_PER_GB;
        if payload_gb > max_payload_gb {
            return Err(DtsError::PayloadTooLarge {
                payload_gb,
                max_gb: max_payload_gb,
            });
        }

        // Partition by source endpoint, preserving both the first-appearance
        // order of endpoints and the file-id order within each group.
        let mut groups: Vec<(String, Vec<DataDescriptor>)> = Vec::new();
        for (endpoint, descriptor) in transferable {
            match groups.iter_mut().find(|(name, _)| *name == endpoint) {
                Some((_, group)) => group.push(descriptor),
                None => groups.push((endpoint, vec![descriptor])),
            }
        }

        let num_files = spec.file_ids.len();
        let tasks = groups
            .into_iter()
            .enumerate()
            .map(|(index, (source_endpoint, group))| TransferTask {
                transfer_id: id,
                index,
                source: spec.source.clone(),
                source_endpoint,
                destination: spec.destination.clone(),
                destination_endpoint: destination_endpoint.to_string(),
                destination_folder: destination_folder.clone(),
                descriptors: group,
                status: TaskStatus {
                    code: TransferStatusCode::New,
                    ..TaskStatus::default()
                },
            })
            .collect();

        Ok(Self {
            id,
            spec,
            descriptors,
            tasks,
            destination_endpoint: destination_endpoint.to_string(),
            destination_folder,
            payload_gb,
            manifest_transfer_id: None,
            status: TransferStatus::new(num_files),
            start_time: now,
            completion_time: None,
            canceled: false,
        })
    }

    /// Whether the transfer has reached a sticky terminal code
    pub fn is_terminal(&self) -> bool {
        self.status.code.is_terminal()
    }

    /// The descriptors delivered through the manifest only
    pub fn inline_descriptors(&self) -> impl Iterator<Item = &DataDescriptor> {
        self.descriptors.iter().filter(|d| d.is_inline())
    }

    /// Fold the task codes into the transfer-level code
    pub fn aggregate_task_code(&self) -> TransferStatusCode {
        TransferStatusCode::aggregate(self.tasks.iter().map(|t| t.status.code))
    }

    /// Sum the per-task transferred and skipped counters
    pub fn task_file_counts(&self) -> (usize, usize) {
        self.tasks
            .iter()
            .filter_map(|t| t.status.transfer_status.as_ref())
            .fold((0, 0), |(moved, skipped), s| {
                (moved + s.num_files_transferred, skipped + s.num_files_skipped)
            })
    }

    /// Drive the transfer to a terminal code and stamp its completion time
    pub fn complete(&mut self, code: TransferStatusCode, message: Option<String>, now: DateTime<Utc>) {
        debug_assert!(code.is_terminal());
        self.status.code = code;
        self.status.message = message;
        self.completion_time = Some(now);
    }

    /// Whether the record has aged past its retention window
    pub fn purgeable(&self, now: DateTime<Utc>, delete_after: chrono::Duration) -> bool {
        match self.completion_time {
            Some(completed) => now.signed_duration_since(completed) > delete_after,
            None => false,
        }
    }
}

fn resolve_endpoint(
    descriptor: &DataDescriptor,
    source_endpoints: &[String],
) -> DtsResult<String> {
    match &descriptor.endpoint {
        Some(endpoint) if !endpoint.is_empty() => {
            if source_endpoints.contains(endpoint) {
                Ok(endpoint.clone())
            } else {
                Err(DtsError::invalid_descriptor(
                    &descriptor.id,
                    format!("endpoint '{endpoint}' is not configured for the source database"),
                ))
            }
        }
        _ if source_endpoints.len() == 1 => Ok(source_endpoints[0].clone()),
        _ => Err(DtsError::invalid_descriptor(
            &descriptor.id,
            "descriptor must name a source endpoint when the database has several",
        )),
    }
}
