//! Chain source selection tests

use chain_catalog::models::SourceKind;
use chain_catalog::{DiscoverySource, EngineConfig, InMemoryObjectStore};

const BUCKET: &str = "aws-public-blockchain";

fn layout() -> InMemoryObjectStore {
    InMemoryObjectStore::with_keys(
        BUCKET,
        [
            "v1.0/btc/blocks/date=2024-01-01/part-0.parquet",
            "v1.0/eth/blocks/date=2024-01-01/part-0.parquet",
            "v1.1/ton/mainnet/blocks/date=2024-01-01/part-0.parquet",
        ],
    )
}

fn identities(chains: &[chain_catalog::ChainDescriptor]) -> Vec<String> {
    chains.iter().map(|c| c.identity()).collect()
}

#[tokio::test]
async fn test_missing_registry_falls_back_to_scan() {
    let store = layout();
    let config = EngineConfig::default().validate().unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    assert_eq!(source.kind(), SourceKind::Scan);

    let chains = source.chains(&store, &config).await.unwrap();
    assert_eq!(identities(&chains), vec!["v1.0/btc", "v1.0/eth", "v1.1/ton"]);
}

#[tokio::test]
async fn test_yaml_registry_is_the_only_source() {
    let mut store = layout();
    store.insert(
        "registry.yaml",
        "chains:\n  - name: btc\n    path: v1.0/btc\n    description: Bitcoin\n",
    );
    let config = EngineConfig::default().validate().unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    assert_eq!(source.kind(), SourceKind::Manifest);

    // eth and ton exist in the bucket but are not in the registry
    let chains = source.chains(&store, &config).await.unwrap();
    assert_eq!(identities(&chains), vec!["v1.0/btc"]);
    assert_eq!(chains[0].description.as_deref(), Some("Bitcoin"));
}

#[tokio::test]
async fn test_json_registry_bare_list() {
    let mut store = layout();
    store.insert(
        "registry.json",
        r#"[{"name": "ton", "path": "v1.1/ton"}, {"name": "eth", "path": "v1.0/eth"}]"#,
    );
    let config = EngineConfig::parse(
        r#"
[registry]
path = "registry.json"
"#,
    )
    .unwrap()
    .validate()
    .unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    let chains = source.chains(&store, &config).await.unwrap();
    assert_eq!(identities(&chains), vec!["v1.0/eth", "v1.1/ton"]);
}

#[tokio::test]
async fn test_malformed_registry_falls_back_to_scan() {
    let mut store = layout();
    store.insert("registry.yaml", "chains: [unterminated");
    let config = EngineConfig::default().validate().unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    assert_eq!(source.kind(), SourceKind::Scan);
    let chains = source.chains(&store, &config).await.unwrap();
    assert_eq!(chains.len(), 3);
}

#[tokio::test]
async fn test_empty_registry_falls_back_to_scan() {
    let mut store = layout();
    store.insert("registry.yaml", "chains: []\n");
    let config = EngineConfig::default().validate().unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    assert_eq!(source.kind(), SourceKind::Scan);
}

#[tokio::test]
async fn test_disabled_registry_is_not_read() {
    let mut store = layout();
    store.insert("registry.yaml", "chains:\n  - name: btc\n    path: v1.0/btc\n");
    let config = EngineConfig::parse(
        r#"
[registry]
enabled = false
"#,
    )
    .unwrap()
    .validate()
    .unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    assert_eq!(source.kind(), SourceKind::Scan);
}

#[tokio::test]
async fn test_storage_root_prefixes_registry_and_scan() {
    let mut store = InMemoryObjectStore::with_keys(
        BUCKET,
        [
            "datasets/v1.0/btc/blocks/date=2024-01-01/part-0.parquet",
            "datasets/v2/sol/blocks/date=2024-01-01/part-0.parquet",
            "other/v1.0/eth/blocks/date=2024-01-01/part-0.parquet",
        ],
    );
    let config = EngineConfig::parse(
        r#"
[storage]
root = "datasets"
version_prefixes = []
"#,
    )
    .unwrap()
    .validate()
    .unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    let chains = source.chains(&store, &config).await.unwrap();
    assert_eq!(identities(&chains), vec!["v1.0/btc", "v2/sol"]);
    assert_eq!(chains[0].root_path, "datasets/v1.0/btc");

    store.insert(
        "datasets/registry.yaml",
        "- name: btc\n  path: v1.0/btc\n",
    );
    let source = DiscoverySource::select(&store, &config).await;
    assert_eq!(source.kind(), SourceKind::Manifest);
    let chains = source.chains(&store, &config).await.unwrap();
    assert_eq!(chains[0].root_path, "datasets/v1.0/btc");
}

#[tokio::test]
async fn test_description_override_applies_to_both_sources() {
    let store = layout();
    let config = EngineConfig::parse(
        r#"
[chains.eth]
description = "Ethereum mainnet"
"#,
    )
    .unwrap()
    .validate()
    .unwrap();

    let source = DiscoverySource::select(&store, &config).await;
    let chains = source.chains(&store, &config).await.unwrap();
    let eth = chains.iter().find(|c| c.name == "eth").unwrap();
    assert_eq!(eth.description.as_deref(), Some("Ethereum mainnet"));
}
