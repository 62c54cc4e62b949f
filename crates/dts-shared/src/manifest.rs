//! # Transfer Manifests
//!
//! A Frictionless-style data package describing every descriptor shipped in
//! a transfer (transferable files and inline data alike). The orchestrator
//! writes one manifest per transfer and delivers it beside the files at the
//! destination as `manifest.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DtsResult;
use crate::model::{DataDescriptor, Transfer};

/// A contributor entry in the data package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    /// The contributor's ORCID
    pub title: String,
    pub role: String,
}

/// Frictionless data-package descriptor for one transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPackage {
    pub name: String,
    pub id: Uuid,
    pub profile: String,
    pub created: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub contributors: Vec<Contributor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<serde_json::Value>,
    pub resources: Vec<DataDescriptor>,
}

impl DataPackage {
    /// Build the manifest for a transfer from its resolved descriptors
    pub fn from_transfer(transfer: &Transfer, created: DateTime<Utc>) -> Self {
        Self {
            name: format!("dts-{}", transfer.id),
            id: transfer.id,
            profile: "data-package".to_string(),
            created,
            keywords: vec!["dts".to_string(), "manifest".to_string()],
            contributors: vec![Contributor {
                title: transfer.spec.orcid.clone(),
                role: "author".to_string(),
            }],
            description: transfer.spec.description.clone(),
            instructions: transfer.spec.instructions.clone(),
            resources: transfer.descriptors.clone(),
        }
    }
}

/// File name of the manifest for a transfer, within the manifest directory
pub fn manifest_file_name(transfer_id: Uuid) -> String {
    format!("manifest-{transfer_id}.json")
}

/// Serialize a transfer's manifest into `<manifest_dir>/manifest-<id>.json`
pub async fn write_manifest(manifest_dir: &Path, transfer: &Transfer) -> DtsResult<PathBuf> {
    let package = DataPackage::from_transfer(transfer, Utc::now());
    let path = manifest_dir.join(manifest_file_name(transfer.id));
    let contents = serde_json::to_vec_pretty(&package)?;
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}
