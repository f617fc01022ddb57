//! End-to-end discovery runs with in-memory adapters

use std::sync::Arc;

use async_trait::async_trait;
use chain_catalog::models::SourceKind;
use chain_catalog::notify::{JsonFileNotifier, NotifyError};
use chain_catalog::{
    DiscoveryEngine, EngineConfig, ErrorKind, InMemoryCatalog, InMemoryObjectStore,
    NotificationMessage, Notifier,
};
use tempfile::tempdir;

const BUCKET: &str = "aws-public-blockchain";

fn public_layout() -> InMemoryObjectStore {
    InMemoryObjectStore::with_keys(
        BUCKET,
        [
            "v1.0/btc/blocks/date=2024-01-01/part-0.parquet",
            "v1.0/btc/transactions/date=2024-01-01/part-0.parquet",
            "v1.0/eth/parquet/blocks/date=2024-01-01/part-0.parquet",
            "v1.0/eth/json/blocks/2024-01-01.json",
            "v1.0/deep/a/b/c/d/e/f/g/h/i/date=2024-01-01/part-0.parquet",
            "v1.1/ton/mainnet/blocks/date=2024-01-01/part-0.parquet",
            "v1.1/ton/testnet/blocks/date=2024-01-01/part-0.parquet",
        ],
    )
}

#[tokio::test]
async fn test_run_reconciles_every_chain() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = DiscoveryEngine::new(
        &EngineConfig::default(),
        Arc::new(public_layout()),
        catalog.clone(),
    )
    .unwrap();

    let report = engine.run().await.unwrap();

    assert_eq!(report.source, SourceKind::Scan);
    assert_eq!(report.chains_discovered, 4);
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.flagged.len(), 1);
    assert_eq!(report.flagged[0].chain, "v1.0/deep");
    assert!(!report.is_clean());

    assert_eq!(
        catalog.namespaces(),
        vec!["btc", "deep", "eth", "ton_mainnet_v1_1", "ton_testnet_v1_1"]
    );
    assert!(catalog.job_names().contains(&"eth_blocks_crawler".to_string()));
    assert_eq!(report.jobs_started(), report.created.len());
    assert!(report.completed_at >= report.started_at);
}

#[tokio::test]
async fn test_run_twice_is_idempotent() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = DiscoveryEngine::new(
        &EngineConfig::default(),
        Arc::new(public_layout()),
        catalog.clone(),
    )
    .unwrap();

    let first = engine.run().await.unwrap();
    let counts = catalog.counts();
    let second = engine.run().await.unwrap();

    assert!(!first.created.is_empty());
    assert!(second.created.is_empty());
    assert!(second.updated.is_empty());
    assert_eq!(second.skipped.len(), first.created.len());
    assert_eq!(catalog.counts().mutations(), counts.mutations());
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_call() {
    let store = Arc::new(public_layout());
    let config = EngineConfig::parse(
        r#"
[crawler]
schedule = "fortnightly"
"#,
    )
    .unwrap();

    let err = DiscoveryEngine::new(&config, store.clone(), Arc::new(InMemoryCatalog::new()))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(store.list_calls(), 0);
}

#[tokio::test]
async fn test_bucket_mismatch_is_a_config_error() {
    let err = DiscoveryEngine::new(
        &EngineConfig::for_bucket("some-other-bucket"),
        Arc::new(public_layout()),
        Arc::new(InMemoryCatalog::new()),
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_plan_chain_does_not_touch_catalog() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = DiscoveryEngine::new(
        &EngineConfig::default(),
        Arc::new(public_layout()),
        catalog.clone(),
    )
    .unwrap();

    let chain = engine.find_chain("v1.1/ton").await.unwrap();
    let plan = engine.plan_chain(&chain).await.unwrap();

    assert_eq!(plan.jobs.len(), 2);
    assert_eq!(plan.jobs[0].name(), "ton_mainnet_v1_1_blocks_crawler");
    assert_eq!(plan.jobs[0].grouping().table_level_depth, 4);
    assert_eq!(catalog.counts().mutations(), 0);
    assert!(catalog.namespaces().is_empty());

    let err = engine.find_chain("doge").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_report_written_by_file_notifier() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reports.jsonl");
    let engine = DiscoveryEngine::new(
        &EngineConfig::default(),
        Arc::new(public_layout()),
        Arc::new(InMemoryCatalog::new()),
    )
    .unwrap()
    .with_notifier(Arc::new(JsonFileNotifier::new(&path)));

    let report = engine.run().await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let message: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(message["type"], "discovery");
    assert_eq!(message["payload"]["runId"], report.run_id.to_string());
}

struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn notify(&self, _message: &NotificationMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Write {
            path: "nowhere".to_string(),
            reason: "unreachable".to_string(),
        })
    }
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_run() {
    let engine = DiscoveryEngine::new(
        &EngineConfig::default(),
        Arc::new(public_layout()),
        Arc::new(InMemoryCatalog::new()),
    )
    .unwrap()
    .with_notifier(Arc::new(BrokenNotifier));

    let report = engine.run().await.unwrap();
    assert_eq!(report.chains_discovered, 4);
}
