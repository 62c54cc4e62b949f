//! # Service Configuration
//!
//! Configuration types for the transfer orchestration engine.
//!
//! ## Overview
//!
//! A deployment is described by three sections:
//! - **Service**: payload limits, polling cadence, data and manifest
//!   directories, the name of the service-local endpoint.
//! - **Endpoints**: named bulk-transfer endpoints, keyed by name.
//! - **Databases**: named metadata catalogs, keyed by name.
//!
//! ## Configuration Loading
//!
//! Configuration is loaded from a TOML file plus `DTS`-prefixed environment
//! overrides (`DTS_SERVICE__MAX_PAYLOAD_GB=100` overrides
//! `service.max_payload_gb`).
//!
//! ## Example
//!
//! ```toml
//! [service]
//! endpoint = "local"
//! max_payload_gb = 100.0
//! poll_interval_ms = 60000
//! data_dir = "/var/lib/dts"
//! manifest_dir = "/var/lib/dts/manifests"
//!
//! [endpoints.local]
//! id = "f81d4fae-7dec-11d0-a765-00a0c91e6bf6"
//! provider = "local"
//! root = "/var/lib/dts/manifests"
//!
//! [databases.jdp]
//! organization = "Joint Genome Institute"
//! endpoint = "jdp-dtn"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{DtsError, DtsResult};

/// Top-level DTS configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DtsConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    /// Bulk-transfer endpoints, keyed by configuration name
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,
    /// Metadata catalogs, keyed by configuration name
    #[serde(default)]
    pub databases: HashMap<String, DatabaseConfig>,
}

/// Service-level options
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Listen port for the outer API surface (consumed elsewhere)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent client connections (consumed elsewhere)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest accepted transfer payload, in gigabytes
    #[serde(default = "default_max_payload_gb")]
    pub max_payload_gb: f64,
    /// Interval between orchestrator poll ticks, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Name of the service-local endpoint used for manifest delivery
    #[serde(default)]
    pub endpoint: String,
    /// Directory holding the persistent store and journal
    #[serde(default = "default_dir")]
    pub data_dir: PathBuf,
    /// Directory where transfer manifests are written
    #[serde(default = "default_dir")]
    pub manifest_dir: PathBuf,
    /// Seconds a completed transfer record remains addressable
    #[serde(default = "default_delete_after_secs")]
    pub delete_after_secs: u64,
    /// Enable debug behavior
    #[serde(default)]
    pub debug: bool,
    /// Re-check staged files against the source endpoint before transferring
    #[serde(default)]
    pub double_check_staging: bool,
    /// Optional instance name, scoping the persistent store file
    #[serde(default)]
    pub instance: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> usize {
    100
}

fn default_max_payload_gb() -> f64 {
    1024.0
}

fn default_poll_interval_ms() -> u64 {
    60_000
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_delete_after_secs() -> u64 {
    7 * 24 * 3600
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_connections: default_max_connections(),
            max_payload_gb: default_max_payload_gb(),
            poll_interval_ms: default_poll_interval_ms(),
            endpoint: String::new(),
            data_dir: default_dir(),
            manifest_dir: default_dir(),
            delete_after_secs: default_delete_after_secs(),
            debug: false,
            double_check_staging: false,
            instance: None,
        }
    }
}

impl ServiceConfig {
    /// Poll cadence as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Record retention as a [`chrono::Duration`]
    pub fn delete_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delete_after_secs as i64)
    }
}

/// Credentials for a provider
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
}

/// One configured bulk-transfer endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint UUID as registered with its provider
    pub id: Uuid,
    /// Provider family (`globus`, `local`, `test`)
    pub provider: String,
    /// Absolute path prefix for the endpoint's file store
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// One configured metadata catalog
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Organization operating the catalog
    #[serde(default)]
    pub organization: String,
    /// Driver name; defaults to the database's configuration name
    #[serde(default)]
    pub provider: Option<String>,
    /// The database's endpoint (single-endpoint catalogs)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// The database's endpoints (multi-endpoint catalogs); takes precedence
    /// over `endpoint` when non-empty
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl DatabaseConfig {
    /// Effective list of endpoint names configured for this database
    pub fn endpoint_names(&self) -> Vec<String> {
        if !self.endpoints.is_empty() {
            self.endpoints.clone()
        } else {
            self.endpoint.iter().cloned().collect()
        }
    }
}

impl DtsConfig {
    /// Load configuration from a TOML file plus `DTS`-prefixed environment
    /// overrides. A missing `path` loads from the environment alone.
    pub fn load(path: Option<&Path>) -> DtsResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("DTS").separator("__"));

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| DtsError::configuration(format!("cannot load configuration: {e}")))
    }

    /// Validate the parts of the configuration the orchestrator depends on
    pub fn validate(&self) -> DtsResult<()> {
        if self.service.endpoint.is_empty() {
            return Err(DtsError::configuration(
                "service.endpoint must name the local endpoint",
            ));
        }
        if !self.endpoints.contains_key(&self.service.endpoint) {
            return Err(DtsError::configuration(format!(
                "service.endpoint '{}' is not a configured endpoint",
                self.service.endpoint
            )));
        }
        for (name, db) in &self.databases {
            for endpoint in db.endpoint_names() {
                if !self.endpoints.contains_key(&endpoint) {
                    return Err(DtsError::configuration(format!(
                        "database '{name}' references unknown endpoint '{endpoint}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
