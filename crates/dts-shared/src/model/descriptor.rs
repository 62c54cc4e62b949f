//! # Data Descriptors
//!
//! Frictionless-style records describing the files of a transfer. Descriptors
//! are resolved from file ids by the source database and carried verbatim
//! into the destination manifest.

use serde::{Deserialize, Serialize};

/// One file (or inline datum) in a transfer
///
/// A descriptor with a `path` is transferable; a descriptor with inline
/// `data` and no path is carried into the manifest only. A descriptor with
/// neither is invalid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDescriptor {
    /// File id as known to the source database
    pub id: String,
    pub name: String,
    /// Path relative to the source endpoint's root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, rename = "mediatype", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Name of the source endpoint holding the file; required when the
    /// source database has more than one configured endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Attribution metadata carried into the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<serde_json::Value>,
    /// Inline data for manifest-only descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl DataDescriptor {
    /// Whether this descriptor names a file to move between endpoints
    pub fn is_transferable(&self) -> bool {
        self.path.is_some()
    }

    /// Whether this descriptor embeds its data and is delivered only through
    /// the manifest
    pub fn is_inline(&self) -> bool {
        self.path.is_none() && self.data.is_some()
    }
}
