//! # Provider Registry
//!
//! Maps provider names to constructors and configuration names to
//! constructed instances. The `local` endpoint provider is built in;
//! out-of-scope drivers (`globus`, the concrete catalogs) register
//! themselves through [`ProviderRegistry::register_endpoint_provider`] and
//! [`ProviderRegistry::register_database_provider`]. Constructed providers
//! are cached by configuration name: database drivers are stateful, and
//! endpoints are cheap but shared.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::{DatabaseConfig, DtsConfig, EndpointConfig};
use crate::errors::{DtsError, DtsResult};
use crate::providers::custom::CustomEndpointSpec;
use crate::providers::local::{self, LocalEndpoint};
use crate::providers::{Database, Endpoint};

/// Constructor for an endpoint driver
pub type EndpointFactory =
    Arc<dyn Fn(&str, &EndpointConfig) -> DtsResult<Arc<dyn Endpoint>> + Send + Sync>;

/// Constructor for a database driver
pub type DatabaseFactory =
    Arc<dyn Fn(&str, &DatabaseConfig) -> DtsResult<Arc<dyn Database>> + Send + Sync>;

/// Name-keyed provider lookup for the orchestration engine
pub struct ProviderRegistry {
    config: DtsConfig,
    endpoint_factories: HashMap<String, EndpointFactory>,
    database_factories: HashMap<String, DatabaseFactory>,
    endpoints: RwLock<HashMap<String, Arc<dyn Endpoint>>>,
    databases: RwLock<HashMap<String, Arc<dyn Database>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "endpoint_providers",
                &self.endpoint_factories.keys().collect::<Vec<_>>(),
            )
            .field(
                "database_providers",
                &self.database_factories.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a registry over a configuration, with the built-in `local`
    /// endpoint provider registered
    pub fn new(config: DtsConfig) -> Self {
        let mut registry = Self {
            config,
            endpoint_factories: HashMap::new(),
            database_factories: HashMap::new(),
            endpoints: RwLock::new(HashMap::new()),
            databases: RwLock::new(HashMap::new()),
        };
        registry.register_endpoint_provider(local::PROVIDER_NAME, |name, config| {
            Ok(Arc::new(LocalEndpoint::from_config(name, config)?) as Arc<dyn Endpoint>)
        });
        registry
    }

    /// Register an endpoint provider family (e.g. `globus`)
    pub fn register_endpoint_provider<F>(&mut self, provider: impl Into<String>, factory: F)
    where
        F: Fn(&str, &EndpointConfig) -> DtsResult<Arc<dyn Endpoint>> + Send + Sync + 'static,
    {
        self.endpoint_factories
            .insert(provider.into(), Arc::new(factory));
    }

    /// Register a database provider (e.g. `jdp`, `kbase`, `nmdc`)
    pub fn register_database_provider<F>(&mut self, provider: impl Into<String>, factory: F)
    where
        F: Fn(&str, &DatabaseConfig) -> DtsResult<Arc<dyn Database>> + Send + Sync + 'static,
    {
        self.database_factories
            .insert(provider.into(), Arc::new(factory));
    }

    /// Register an already-constructed endpoint under a configuration name
    pub fn register_endpoint_instance(&self, name: impl Into<String>, endpoint: Arc<dyn Endpoint>) {
        self.endpoints
            .write()
            .expect("endpoint cache lock poisoned")
            .insert(name.into(), endpoint);
    }

    /// Register an already-constructed database under a configuration name
    pub fn register_database_instance(&self, name: impl Into<String>, database: Arc<dyn Database>) {
        self.databases
            .write()
            .expect("database cache lock poisoned")
            .insert(name.into(), database);
    }

    /// Whether `name` is a configured (or instance-registered) database
    pub fn has_database(&self, name: &str) -> bool {
        self.config.databases.contains_key(name)
            || self
                .databases
                .read()
                .expect("database cache lock poisoned")
                .contains_key(name)
    }

    /// Effective endpoint names configured for a database
    pub fn database_endpoint_names(&self, name: &str) -> Vec<String> {
        self.config
            .databases
            .get(name)
            .map(|db| db.endpoint_names())
            .unwrap_or_default()
    }

    /// Look up (or construct) the endpoint with the given configuration name
    pub fn endpoint(&self, name: &str) -> DtsResult<Arc<dyn Endpoint>> {
        if let Some(endpoint) = self
            .endpoints
            .read()
            .expect("endpoint cache lock poisoned")
            .get(name)
        {
            return Ok(endpoint.clone());
        }

        let config = self.config.endpoints.get(name).ok_or_else(|| {
            DtsError::configuration(format!("endpoint '{name}' is not configured"))
        })?;
        let factory = self.endpoint_factories.get(&config.provider).ok_or_else(|| {
            DtsError::configuration(format!(
                "no endpoint provider registered for '{}'",
                config.provider
            ))
        })?;

        let endpoint = factory(name, config)?;
        debug!(endpoint = name, provider = %config.provider, "Constructed endpoint");
        self.endpoints
            .write()
            .expect("endpoint cache lock poisoned")
            .insert(name.to_string(), endpoint.clone());
        Ok(endpoint)
    }

    /// Construct (or fetch) an endpoint for a custom destination spec
    pub fn endpoint_for_custom(&self, spec: &CustomEndpointSpec) -> DtsResult<Arc<dyn Endpoint>> {
        let name = spec.canonical_name();
        if let Some(endpoint) = self
            .endpoints
            .read()
            .expect("endpoint cache lock poisoned")
            .get(&name)
        {
            return Ok(endpoint.clone());
        }

        let factory = self.endpoint_factories.get(&spec.provider).ok_or_else(|| {
            DtsError::configuration(format!(
                "no endpoint provider registered for '{}'",
                spec.provider
            ))
        })?;
        let config = EndpointConfig {
            id: spec.id,
            provider: spec.provider.clone(),
            root: None,
            auth: spec.credential.clone().map(|credential| crate::config::AuthConfig {
                client_id: credential,
                client_secret: None,
            }),
        };

        let endpoint = factory(&name, &config)?;
        debug!(endpoint = %name, provider = %spec.provider, "Constructed custom endpoint");
        self.endpoints
            .write()
            .expect("endpoint cache lock poisoned")
            .insert(name, endpoint.clone());
        Ok(endpoint)
    }

    /// Look up (or construct) the database with the given configuration name
    pub fn database(&self, name: &str) -> DtsResult<Arc<dyn Database>> {
        if let Some(database) = self
            .databases
            .read()
            .expect("database cache lock poisoned")
            .get(name)
        {
            return Ok(database.clone());
        }

        let config = self.config.databases.get(name).ok_or_else(|| {
            DtsError::configuration(format!("database '{name}' is not configured"))
        })?;
        let provider = config.provider.clone().unwrap_or_else(|| name.to_string());
        let factory = self.database_factories.get(&provider).ok_or_else(|| {
            DtsError::configuration(format!("no database provider registered for '{provider}'"))
        })?;

        let database = factory(name, config)?;
        debug!(database = name, provider = %provider, "Constructed database");
        self.databases
            .write()
            .expect("database cache lock poisoned")
            .insert(name.to_string(), database.clone());
        Ok(database)
    }

    /// Names of every database constructed so far (used to collect opaque
    /// driver state at shutdown)
    pub fn constructed_databases(&self) -> Vec<(String, Arc<dyn Database>)> {
        self.databases
            .read()
            .expect("database cache lock poisoned")
            .iter()
            .map(|(name, db)| (name.clone(), db.clone()))
            .collect()
    }

    /// The service configuration this registry was built over
    pub fn config(&self) -> &DtsConfig {
        &self.config
    }
}
