//! Completion deduplication tests

use std::sync::Arc;

use chain_catalog::catalog::TableSchema;
use chain_catalog::models::JobRunStatus;
use chain_catalog::{CompletionDeduplicator, ErrorKind, InMemoryCatalog, JobStateChangeEvent};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn catalog() -> Arc<InMemoryCatalog> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_table(TableSchema {
        namespace: "btc".to_string(),
        name: "blocks".to_string(),
        location: "s3://aws-public-blockchain/v1.0/btc/blocks/".to_string(),
        columns: strings(&["hash", "date", "size", "height"]),
        partition_columns: strings(&["date"]),
    });
    catalog
}

fn event(status: JobRunStatus, table_root: &str) -> JobStateChangeEvent {
    JobStateChangeEvent {
        job_id: "btc_blocks_crawler".to_string(),
        status,
        namespace: "btc".to_string(),
        table_root: table_root.to_string(),
    }
}

#[tokio::test]
async fn test_partition_key_duplicate_removed() {
    let deduplicator = CompletionDeduplicator::new(catalog());

    let report = deduplicator
        .process(&event(
            JobRunStatus::Succeeded,
            "s3://aws-public-blockchain/v1.0/btc/blocks",
        ))
        .await
        .unwrap();

    assert_eq!(report.table_name.as_deref(), Some("blocks"));
    assert_eq!(report.final_columns, strings(&["hash", "size", "height"]));
    assert_eq!(report.partition_columns, strings(&["date"]));
    assert_eq!(report.duplicates_removed, strings(&["date"]));
}

#[tokio::test]
async fn test_failed_job_reports_nothing() {
    let catalog = catalog();
    catalog.fail_namespace("btc");
    let deduplicator = CompletionDeduplicator::new(catalog);

    // A failed job never reaches the catalog, so the injected failure is not hit
    let report = deduplicator
        .process(&event(
            JobRunStatus::Failed,
            "s3://aws-public-blockchain/v1.0/btc/blocks/",
        ))
        .await
        .unwrap();

    assert_eq!(report.status, JobRunStatus::Failed);
    assert!(report.table_name.is_none());
    assert!(report.final_columns.is_empty());
    assert!(report.duplicates_removed.is_empty());
}

#[tokio::test]
async fn test_unknown_table_is_an_error() {
    let deduplicator = CompletionDeduplicator::new(catalog());

    let err = deduplicator
        .process(&event(
            JobRunStatus::Succeeded,
            "s3://aws-public-blockchain/v1.0/btc/transactions/",
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Reconciliation);
}

#[test]
fn test_event_parses_from_service_json() {
    let json = r#"{
        "jobId": "eth_blocks_crawler",
        "status": "succeeded",
        "namespace": "eth",
        "tableRoot": "s3://aws-public-blockchain/v1.0/eth/blocks/"
    }"#;
    let event: JobStateChangeEvent = serde_json::from_str(json).unwrap();
    assert_eq!(event.status, JobRunStatus::Succeeded);
    assert_eq!(event.namespace, "eth");
}
