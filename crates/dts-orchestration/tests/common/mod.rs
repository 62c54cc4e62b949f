//! Shared harness for orchestration integration tests: a service wired to
//! in-memory test providers with tightened timings.

// each integration test binary compiles this module; not all of them use
// every helper
#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use dts_orchestration::orchestration::journal::{JournalSink, NoopJournal};
use dts_orchestration::TransferService;
use dts_shared::config::{DatabaseConfig, DtsConfig};
use dts_shared::model::{DataDescriptor, TransferSpecification, TransferStatus, TransferStatusCode};
use dts_shared::providers::test_utils::{StagedFiles, TestDatabase, TestEndpoint};
use dts_shared::providers::ProviderRegistry;
use dts_shared::DtsResult;

pub const SOURCE_DB: &str = "source";
pub const DESTINATION_DB: &str = "destination";
pub const LOCAL_ENDPOINT: &str = "local-ep";

/// Three-file fixture matching the classic happy-path timeline
pub fn default_descriptors() -> Vec<DataDescriptor> {
    vec![
        file_descriptor("file1", 1024, None),
        file_descriptor("file2", 2048, None),
        file_descriptor("file3", 4096, None),
    ]
}

pub fn file_descriptor(id: &str, bytes: u64, endpoint: Option<&str>) -> DataDescriptor {
    DataDescriptor {
        id: id.to_string(),
        name: format!("{id}.fastq"),
        path: Some(format!("data/{id}.fastq")),
        bytes,
        endpoint: endpoint.map(str::to_string),
        ..DataDescriptor::default()
    }
}

pub struct HarnessBuilder {
    descriptors: Vec<DataDescriptor>,
    source_endpoints: Vec<String>,
    staging_duration: Duration,
    transfer_duration: Duration,
    poll_interval_ms: u64,
    max_payload_gb: f64,
    delete_after_secs: u64,
    double_check_staging: bool,
    endpoint_sees_staged_files: bool,
    failing_staging: bool,
    journal: Arc<dyn JournalSink>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            descriptors: default_descriptors(),
            source_endpoints: vec!["source-dtn".to_string()],
            staging_duration: Duration::from_millis(150),
            transfer_duration: Duration::from_millis(500),
            poll_interval_ms: 50,
            max_payload_gb: 1.0,
            delete_after_secs: 3600,
            double_check_staging: false,
            endpoint_sees_staged_files: true,
            failing_staging: false,
            journal: Arc::new(NoopJournal),
        }
    }
}

impl HarnessBuilder {
    pub fn descriptors(mut self, descriptors: Vec<DataDescriptor>) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn source_endpoints(mut self, endpoints: &[&str]) -> Self {
        self.source_endpoints = endpoints.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn transfer_duration(mut self, duration: Duration) -> Self {
        self.transfer_duration = duration;
        self
    }

    pub fn max_payload_gb(mut self, limit: f64) -> Self {
        self.max_payload_gb = limit;
        self
    }

    pub fn delete_after_secs(mut self, secs: u64) -> Self {
        self.delete_after_secs = secs;
        self
    }

    pub fn double_check_staging(mut self) -> Self {
        self.double_check_staging = true;
        self
    }

    /// Give the source endpoints a staged-file view disjoint from the
    /// database's, so staged files are never visible at the endpoint
    pub fn endpoint_blind_to_staging(mut self) -> Self {
        self.endpoint_sees_staged_files = false;
        self
    }

    pub fn failing_staging(mut self) -> Self {
        self.failing_staging = true;
        self
    }

    pub fn journal(mut self, journal: Arc<dyn JournalSink>) -> Self {
        self.journal = journal;
        self
    }

    pub fn build(self) -> Harness {
        let data_dir = tempfile::tempdir().expect("cannot create data dir");
        let manifest_dir = tempfile::tempdir().expect("cannot create manifest dir");

        let mut config = DtsConfig::default();
        config.service.endpoint = LOCAL_ENDPOINT.to_string();
        config.service.poll_interval_ms = self.poll_interval_ms;
        config.service.max_payload_gb = self.max_payload_gb;
        config.service.delete_after_secs = self.delete_after_secs;
        config.service.double_check_staging = self.double_check_staging;
        config.service.data_dir = data_dir.path().to_path_buf();
        config.service.manifest_dir = manifest_dir.path().to_path_buf();

        config.databases.insert(
            SOURCE_DB.to_string(),
            DatabaseConfig {
                organization: "Test Org".to_string(),
                provider: None,
                endpoint: None,
                endpoints: self.source_endpoints.clone(),
                auth: None,
            },
        );
        config.databases.insert(
            DESTINATION_DB.to_string(),
            DatabaseConfig {
                organization: "Test Org".to_string(),
                provider: None,
                endpoint: Some("dest-dtn".to_string()),
                endpoints: vec![],
                auth: None,
            },
        );

        let staged = StagedFiles::new();
        let mut registry = ProviderRegistry::new(config.clone());

        // a "test" endpoint provider so custom destination specs resolve
        let custom_staged = staged.clone();
        registry.register_endpoint_provider("test", move |name, _config| {
            Ok(Arc::new(TestEndpoint::new(
                name,
                Duration::ZERO,
                custom_staged.clone(),
            )) as Arc<dyn dts_shared::providers::Endpoint>)
        });

        let registry = Arc::new(registry);

        let mut source_db = TestDatabase::new(
            SOURCE_DB,
            self.descriptors.clone(),
            self.staging_duration,
            staged.clone(),
        );
        if self.failing_staging {
            source_db = source_db.with_failing_staging();
        }
        let source_db = Arc::new(source_db);
        registry.register_database_instance(SOURCE_DB, source_db.clone());

        let destination_db = Arc::new(TestDatabase::new(
            DESTINATION_DB,
            Vec::new(),
            Duration::ZERO,
            StagedFiles::new(),
        ));
        registry.register_database_instance(DESTINATION_DB, destination_db.clone());

        let endpoint_staged = if self.endpoint_sees_staged_files {
            staged.clone()
        } else {
            StagedFiles::new()
        };
        for name in &self.source_endpoints {
            registry.register_endpoint_instance(
                name.clone(),
                Arc::new(TestEndpoint::new(
                    name.clone(),
                    self.transfer_duration,
                    endpoint_staged.clone(),
                )),
            );
        }
        registry.register_endpoint_instance(
            "dest-dtn",
            Arc::new(TestEndpoint::new("dest-dtn", Duration::ZERO, staged.clone())),
        );
        registry.register_endpoint_instance(
            LOCAL_ENDPOINT,
            Arc::new(TestEndpoint::new(
                LOCAL_ENDPOINT,
                Duration::ZERO,
                StagedFiles::new(),
            )),
        );

        let service =
            TransferService::new(config, registry.clone()).with_journal(self.journal);

        Harness {
            service,
            registry,
            source_db,
            destination_db,
            data_dir,
            manifest_dir,
        }
    }
}

pub struct Harness {
    pub service: TransferService,
    pub registry: Arc<ProviderRegistry>,
    pub source_db: Arc<TestDatabase>,
    pub destination_db: Arc<TestDatabase>,
    pub data_dir: tempfile::TempDir,
    pub manifest_dir: tempfile::TempDir,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub async fn start() -> Self {
        let harness = Self::builder().build();
        harness.service.start().await.expect("service must start");
        harness
    }

    pub fn specification(&self, file_ids: &[&str]) -> TransferSpecification {
        TransferSpecification {
            source: SOURCE_DB.to_string(),
            destination: DESTINATION_DB.to_string(),
            file_ids: file_ids.iter().map(|s| s.to_string()).collect(),
            orcid: "0000-0002-1825-0097".to_string(),
            description: Some("integration fixture".to_string()),
            instructions: None,
        }
    }

    /// Poll until the transfer reports `code` or the timeout elapses
    pub async fn wait_for_code(
        &self,
        transfer_id: Uuid,
        code: TransferStatusCode,
        timeout: Duration,
    ) -> TransferStatus {
        self.wait_until(transfer_id, |status| status.code == code, timeout)
            .await
            .unwrap_or_else(|e| panic!("waiting for {code}: {e}"))
    }

    /// Poll until the transfer reaches any terminal code
    pub async fn wait_terminal(&self, transfer_id: Uuid, timeout: Duration) -> TransferStatus {
        self.wait_until(transfer_id, |status| status.code.is_terminal(), timeout)
            .await
            .expect("transfer must reach a terminal code")
    }

    async fn wait_until(
        &self,
        transfer_id: Uuid,
        predicate: impl Fn(&TransferStatus) -> bool,
        timeout: Duration,
    ) -> DtsResult<TransferStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.service.status(transfer_id).await?;
            if predicate(&status) {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                panic!("timed out waiting for transfer {transfer_id}; last status {status:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
