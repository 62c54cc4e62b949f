//! End-to-end transfer scenarios over in-memory providers: the happy path,
//! validation rejections, cancellation, multi-endpoint fan-out, and staging
//! disagreement.

mod common;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use common::{file_descriptor, Harness, DESTINATION_DB, SOURCE_DB};
use dts_orchestration::orchestration::journal::FileJournal;
use dts_shared::model::{DataDescriptor, TransferStatusCode};
use dts_shared::DtsError;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_happy_path_three_files() {
    let harness = Harness::start().await;
    let spec = harness.specification(&["file1", "file2", "file3"]);

    let transfer_id = harness.service.create(spec).await.unwrap();

    // visible immediately, covering all requested files
    let status = harness.service.status(transfer_id).await.unwrap();
    assert_eq!(status.num_files, 3);

    // staging takes 150 ms, the bulk transfer 500 ms; the transfer is
    // observably active in between
    let status = harness
        .wait_for_code(transfer_id, TransferStatusCode::Active, WAIT)
        .await;
    assert_eq!(status.num_files, 3);

    let status = harness
        .wait_for_code(transfer_id, TransferStatusCode::Succeeded, WAIT)
        .await;
    assert_eq!(status.num_files, 3);
    assert_eq!(status.num_files_transferred, 3);
    assert_eq!(status.num_files_skipped, 0);

    // the manifest was written for delivery
    let manifest = harness
        .manifest_dir
        .path()
        .join(format!("manifest-{transfer_id}.json"));
    assert!(manifest.exists(), "manifest file must exist");

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_terminal_status_is_sticky() {
    let harness = Harness::start().await;
    let spec = harness.specification(&["file1"]);
    let transfer_id = harness.service.create(spec).await.unwrap();

    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Succeeded);

    // several ticks later nothing has mutated the record
    tokio::time::sleep(Duration::from_millis(200)).await;
    let later = harness.service.status(transfer_id).await.unwrap();
    assert_eq!(later, status);

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_payload_too_large_rejected_synchronously() {
    let harness = Harness::builder()
        .descriptors(vec![file_descriptor("huge", 10_000_000, None)])
        .max_payload_gb(0.001)
        .build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["huge"]);
    let err = harness.service.create(spec).await.unwrap_err();
    assert!(matches!(err, DtsError::PayloadTooLarge { .. }));

    harness.service.stop().await.unwrap();

    // nothing was persisted for the rejected transfer
    let store_file = harness.data_dir.path().join("dts.json");
    let contents = std::fs::read_to_string(store_file).unwrap();
    let state: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(
        state["transfers"].as_object().map(|m| m.len()),
        Some(0)
    );
}

#[tokio::test]
async fn test_no_files_requested() {
    let harness = Harness::start().await;
    let spec = harness.specification(&[]);
    let err = harness.service.create(spec).await.unwrap_err();
    assert!(matches!(err, DtsError::NoFilesRequested));
    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_source_and_destination() {
    let harness = Harness::start().await;

    let mut spec = harness.specification(&["file1"]);
    spec.source = "nonesuch".to_string();
    let err = harness.service.create(spec).await.unwrap_err();
    assert!(matches!(err, DtsError::UnknownSource(_)));

    let mut spec = harness.specification(&["file1"]);
    spec.destination = "nonesuch".to_string();
    let err = harness.service.create(spec).await.unwrap_err();
    assert!(matches!(err, DtsError::UnknownDestination(_)));

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_file_id_fails_create() {
    let harness = Harness::start().await;
    let spec = harness.specification(&["file1", "no-such-file"]);
    let err = harness.service.create(spec).await.unwrap_err();
    assert!(matches!(err, DtsError::NotFound { .. }));
    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_mid_transfer() {
    let harness = Harness::builder()
        .transfer_duration(Duration::from_secs(30))
        .build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["file1", "file2", "file3"]);
    let transfer_id = harness.service.create(spec).await.unwrap();

    harness
        .wait_for_code(transfer_id, TransferStatusCode::Active, WAIT)
        .await;
    harness.service.cancel(transfer_id).await.unwrap();

    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Failed);
    assert!(
        status.message.as_deref().unwrap_or_default().contains("canceled"),
        "status message should mention cancellation: {status:?}"
    );

    // cancellation is idempotent: repeating it changes nothing
    harness.service.cancel(transfer_id).await.unwrap();
    let again = harness.service.status(transfer_id).await.unwrap();
    assert_eq!(again, status);

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_unknown_transfer_is_not_found() {
    let harness = Harness::start().await;
    let err = harness.service.cancel(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DtsError::NotFound { .. }));
    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_multi_endpoint_fan_out() {
    let harness = Harness::builder()
        .descriptors(vec![
            file_descriptor("file1", 1024, Some("ep-a")),
            file_descriptor("file2", 2048, Some("ep-b")),
            file_descriptor("file3", 4096, Some("ep-a")),
        ])
        .source_endpoints(&["ep-a", "ep-b"])
        .build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["file1", "file2", "file3"]);
    let transfer_id = harness.service.create(spec).await.unwrap();

    let status = harness.service.status(transfer_id).await.unwrap();
    assert_eq!(status.num_files, 3);

    let status = harness
        .wait_for_code(transfer_id, TransferStatusCode::Succeeded, WAIT)
        .await;
    assert_eq!(status.num_files, 3);
    assert_eq!(status.num_files_transferred, 3);

    // both endpoints saw exactly one endpoint transfer each
    for name in ["ep-a", "ep-b"] {
        let endpoint = harness.registry.endpoint(name).unwrap();
        assert_eq!(endpoint.transfers().await.unwrap().len(), 1);
    }

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_staging_disagreement_fails_with_root_message() {
    let harness = Harness::builder()
        .double_check_staging()
        .endpoint_blind_to_staging()
        .build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["file1"]);
    let transfer_id = harness.service.create(spec).await.unwrap();

    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Failed);
    assert!(
        status.message.as_deref().unwrap_or_default().contains("root"),
        "failure must point at the endpoint root: {status:?}"
    );

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_staging_failure_fails_transfer() {
    let harness = Harness::builder().failing_staging().build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["file1"]);
    let transfer_id = harness.service.create(spec).await.unwrap();

    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Failed);
    assert!(
        status.message.as_deref().unwrap_or_default().contains("staging"),
        "failure must mention staging: {status:?}"
    );

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_inline_only_transfer_delivers_manifest() {
    let inline = DataDescriptor {
        id: "stats".to_string(),
        name: "assembly stats".to_string(),
        data: Some(serde_json::json!({"n50": 4200})),
        ..DataDescriptor::default()
    };
    let harness = Harness::builder().descriptors(vec![inline]).build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["stats"]);
    let transfer_id = harness.service.create(spec).await.unwrap();

    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Succeeded);
    assert_eq!(status.num_files, 1);
    assert_eq!(status.num_files_transferred, 0);

    let manifest = harness
        .manifest_dir
        .path()
        .join(format!("manifest-{transfer_id}.json"));
    let contents = std::fs::read_to_string(manifest).unwrap();
    assert!(contents.contains("assembly stats"));

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_custom_destination_endpoint_spec() {
    let harness = Harness::start().await;

    let mut spec = harness.specification(&["file1"]);
    spec.destination = "test:f81d4fae-7dec-11d0-a765-00a0c91e6bf6".to_string();
    let transfer_id = harness.service.create(spec).await.unwrap();

    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Succeeded);

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_purge_after_retention_window() {
    let harness = Harness::builder().delete_after_secs(1).build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["file1"]);
    let transfer_id = harness.service.create(spec).await.unwrap();

    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Succeeded);

    // after completion + delete_after the record is no longer addressable
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        match harness.service.status(transfer_id).await {
            Err(DtsError::NotFound { .. }) => break,
            Ok(_) if std::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(status) => panic!("transfer was never purged; last status {status:?}"),
            Err(e) => panic!("unexpected error while polling: {e}"),
        }
    }

    harness.service.stop().await.unwrap();
}

#[tokio::test]
async fn test_succeeded_transfer_is_not_journaled() {
    let journal_dir = tempfile::tempdir().unwrap();
    let journal = Arc::new(FileJournal::new(journal_dir.path()));
    let harness = Harness::builder().journal(journal.clone()).build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["file1", "file2", "file3"]);
    let transfer_id = harness.service.create(spec).await.unwrap();
    let status = harness.wait_terminal(transfer_id, WAIT).await;
    assert_eq!(status.code, TransferStatusCode::Succeeded);
    harness.service.stop().await.unwrap();

    // only failed transfers are journaled; the journal file is created on
    // the first record, so a clean run leaves none
    assert!(!journal.path().exists());
}

#[tokio::test]
async fn test_failed_transfer_is_journaled() {
    let journal_dir = tempfile::tempdir().unwrap();
    let journal = Arc::new(FileJournal::new(journal_dir.path()));
    let harness = Harness::builder()
        .failing_staging()
        .journal(journal.clone())
        .build();
    harness.service.start().await.unwrap();

    let spec = harness.specification(&["file1", "file2"]);
    let transfer_id = harness.service.create(spec).await.unwrap();
    harness.wait_terminal(transfer_id, WAIT).await;
    harness.service.stop().await.unwrap();

    let contents = std::fs::read_to_string(journal.path()).unwrap();
    let record: serde_json::Value =
        serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(record["id"], transfer_id.to_string());
    assert_eq!(record["source"], SOURCE_DB);
    assert_eq!(record["destination"], DESTINATION_DB);
    assert_eq!(record["status"], "failed");
    assert_eq!(record["num_files"], 2);
}
