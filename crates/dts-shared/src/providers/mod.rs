//! # Provider Contracts
//!
//! The two capability sets the orchestration engine consumes: metadata
//! catalogs ([`Database`]) and bulk-transfer endpoints ([`Endpoint`]).
//! Concrete drivers live behind these traits and are looked up through the
//! [`registry::ProviderRegistry`] by configuration name; the engine never
//! names a concrete driver.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DtsResult;
use crate::model::{DataDescriptor, EndpointTransferStatus, StagingStatus};

pub mod custom;
pub mod local;
pub mod registry;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use custom::CustomEndpointSpec;
pub use local::LocalEndpoint;
pub use registry::ProviderRegistry;

/// Search request forwarded to a database driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParameters {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Driver-specific parameters, validated against the driver's schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific: Option<serde_json::Value>,
}

/// Results of a database search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub descriptors: Vec<DataDescriptor>,
}

/// One file movement within an endpoint-to-endpoint transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTransfer {
    /// Path relative to the source endpoint's root
    pub source_path: PathBuf,
    /// Path relative to the destination endpoint's root
    pub destination_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
}

/// A metadata catalog over a file store
///
/// `descriptors` must return one descriptor per input id, in input order;
/// unknown ids fail with `NotFound` and denied ids with `PermissionDenied`.
#[async_trait]
pub trait Database: std::fmt::Debug + Send + Sync {
    /// Configuration name of this database
    fn name(&self) -> &str;

    /// Search the catalog on behalf of a user
    async fn search(&self, orcid: &str, params: &SearchParameters) -> DtsResult<SearchResults>;

    /// Resolve file ids into descriptors, one per id, in input order
    async fn descriptors(&self, orcid: &str, file_ids: &[String])
        -> DtsResult<Vec<DataDescriptor>>;

    /// Ask the database to make the files physically available at its
    /// endpoint; returns an id for polling
    async fn stage_files(&self, orcid: &str, file_ids: &[String]) -> DtsResult<Uuid>;

    /// Poll a staging operation
    async fn staging_status(&self, staging_id: Uuid) -> DtsResult<StagingStatus>;

    /// Map an ORCID to the database-local username
    async fn local_user(&self, orcid: &str) -> DtsResult<String>;

    /// JSON schema describing driver-specific search parameters
    fn specific_search_parameters(&self) -> Option<serde_json::Value> {
        None
    }

    /// Driver-specific state to persist across restarts; treated as an
    /// opaque blob by the store (the driver versions it itself)
    async fn save_state(&self) -> DtsResult<Option<serde_json::Value>> {
        Ok(None)
    }

    /// Restore driver-specific state persisted by [`Database::save_state`]
    async fn load_state(&self, _state: serde_json::Value) -> DtsResult<()> {
        Ok(())
    }
}

/// A named, configured bulk-file transfer service
#[async_trait]
pub trait Endpoint: std::fmt::Debug + Send + Sync {
    /// Configuration name of this endpoint
    fn name(&self) -> &str;

    /// Endpoint UUID as registered with its provider
    fn id(&self) -> Uuid;

    /// Provider family (`globus`, `local`, `test`); transfers are only
    /// possible between compatible families
    fn provider(&self) -> &str;

    /// Absolute path prefix of the endpoint's file store
    fn root(&self) -> PathBuf;

    /// Whether every descriptor's file is present at this endpoint.
    /// A missing directory yields `false`, not an error: the files simply
    /// have not been staged yet.
    async fn files_staged(&self, descriptors: &[DataDescriptor]) -> DtsResult<bool>;

    /// Begin moving files to `destination`; fails with
    /// `IncompatibleEndpoint` when the destination's provider family cannot
    /// interoperate with this one
    async fn transfer(
        &self,
        destination: &dyn Endpoint,
        files: &[FileTransfer],
    ) -> DtsResult<Uuid>;

    /// Poll a transfer previously begun with [`Endpoint::transfer`]
    async fn status(&self, transfer_id: Uuid) -> DtsResult<EndpointTransferStatus>;

    /// Request cancellation of an in-flight transfer
    async fn cancel(&self, transfer_id: Uuid) -> DtsResult<()>;

    /// Ids of all transfers this endpoint is tracking
    async fn transfers(&self) -> DtsResult<Vec<Uuid>>;
}
