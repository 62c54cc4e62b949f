//! # Transfer Specification
//!
//! The user-submitted request a transfer is built from.

use serde::{Deserialize, Serialize};

/// A request to move a set of files from one database to another
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferSpecification {
    /// Name of the source database
    pub source: String,
    /// Name of the destination database, or a custom endpoint spec of the
    /// form `<provider>:<uuid>[:<credential>]`
    pub destination: String,
    /// File ids to transfer, in user-requested order
    pub file_ids: Vec<String>,
    /// ORCID of the requesting user
    pub orcid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Machine-readable instructions passed through to the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<serde_json::Value>,
}
