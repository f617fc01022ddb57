//! Structural resolution tests against in-memory bucket layouts

use chain_catalog::resolver::ResolverSettings;
use chain_catalog::{ChainDescriptor, ErrorKind, InMemoryObjectStore, PathResolver};

const PARQUET: &str = "part-00000.snappy.parquet";

fn store(keys: &[&str]) -> InMemoryObjectStore {
    InMemoryObjectStore::with_keys("aws-public-blockchain", keys.iter().copied())
}

#[tokio::test]
async fn test_raw_sibling_is_excluded_and_never_listed() {
    let store = store(&[
        &format!("v1.0/eth/parquet/blocks/date=2024-01-01/{}", PARQUET),
        &format!("v1.0/eth/parquet/blocks/date=2024-01-02/{}", PARQUET),
        &format!("v1.0/eth/parquet/transactions/date=2024-01-01/{}", PARQUET),
        "v1.0/eth/json/blocks/2024-01-01.json",
        "v1.0/eth/json/transactions/2024-01-01.json",
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("eth", "v1.0/eth", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    let paths: Vec<&str> = resolution
        .table_roots
        .iter()
        .map(|t| t.path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec!["v1.0/eth/parquet/blocks", "v1.0/eth/parquet/transactions"]
    );
    for root in &resolution.table_roots {
        assert_eq!(root.namespace, "eth");
        assert_eq!(root.partition_depth, 4);
        assert_eq!(root.partition_columns, vec!["date".to_string()]);
    }
    assert_eq!(resolution.excluded, vec!["v1.0/eth/json".to_string()]);
    assert!(
        store
            .listed_prefixes()
            .iter()
            .all(|p| !p.starts_with("v1.0/eth/json")),
        "raw subtree was listed: {:?}",
        store.listed_prefixes()
    );
}

#[tokio::test]
async fn test_subdivisions_inside_structured_subtree() {
    let store = store(&[
        "v1.0/ton/json/mainnet/blocks/2024/01/01/blocks.json",
        "v1.0/ton/json/testnet/blocks/2024/01/01/blocks.json",
        &format!("v1.0/ton/parquet/mainnet/blocks/date=2024-01-01/{}", PARQUET),
        &format!("v1.0/ton/parquet/testnet/blocks/date=2024-01-01/{}", PARQUET),
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("ton", "v1.0/ton", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    assert_eq!(resolution.table_roots.len(), 2);
    assert_eq!(resolution.namespaces(), vec!["ton_mainnet", "ton_testnet"]);
    for root in &resolution.table_roots {
        assert!(root.path.starts_with("v1.0/ton/parquet/"));
        assert_eq!(root.partition_depth, 5);
        assert_eq!(root.partition_columns, vec!["date".to_string()]);
    }
    assert_eq!(resolution.excluded, vec!["v1.0/ton/json".to_string()]);
    assert!(
        store
            .listed_prefixes()
            .iter()
            .all(|p| !p.starts_with("v1.0/ton/json"))
    );
}

#[tokio::test]
async fn test_depth_is_per_root() {
    let store = store(&[
        &format!("v1.0/btc/blocks/date=2024-01-01/{}", PARQUET),
        &format!("v1.1/ton/mainnet/blocks/date=2024-01-01/{}", PARQUET),
        &format!("v1.1/ton/testnet/blocks/date=2024-01-01/{}", PARQUET),
    ]);
    let settings = ResolverSettings::default();
    let resolver = PathResolver::new(&store, &settings);

    let btc = resolver
        .resolve(&ChainDescriptor::new("btc", "v1.0/btc", "v1.0"))
        .await
        .unwrap();
    assert_eq!(btc.table_roots.len(), 1);
    assert_eq!(btc.table_roots[0].partition_depth, 3);
    assert_eq!(btc.table_roots[0].namespace, "btc");

    let ton = resolver
        .resolve(&ChainDescriptor::new("ton", "v1.1/ton", "v1.1"))
        .await
        .unwrap();
    assert_eq!(ton.table_roots.len(), 2);
    assert_eq!(ton.namespaces(), vec!["ton_mainnet_v1_1", "ton_testnet_v1_1"]);
    for root in &ton.table_roots {
        assert_eq!(root.partition_depth, 4);
        assert_eq!(root.name, "blocks");
        assert!(root.subdivision.is_some());
    }
}

#[tokio::test]
async fn test_versioned_partition_root() {
    let store = store(&[
        &format!("v1.0/eth/traces/version=1/blocks/date=2023-01-01/{}", PARQUET),
        &format!("v1.0/eth/traces/version=2/blocks/date=2024-01-01/{}", PARQUET),
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("eth", "v1.0/eth", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    assert_eq!(resolution.table_roots.len(), 1);
    let root = &resolution.table_roots[0];
    assert_eq!(root.path, "v1.0/eth/traces/version=2/blocks");
    assert_eq!(root.name, "blocks");
    assert_eq!(root.partition_depth, 5);
    assert_eq!(root.partition_columns, vec!["date".to_string()]);
}

#[tokio::test]
async fn test_nested_partition_keys_collected_outermost_first() {
    let store = store(&[
        &format!("v1.0/btc/outputs/year=2024/month=01/{}", PARQUET),
        &format!("v1.0/btc/outputs/year=2024/month=02/{}", PARQUET),
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("btc", "v1.0/btc", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();
    assert_eq!(
        resolution.table_roots[0].partition_columns,
        vec!["year".to_string(), "month".to_string()]
    );
}

#[tokio::test]
async fn test_unpartitioned_layout_uses_namespace_root() {
    let store = store(&[
        &format!("v1.0/sol/blocks/2024/01/{}", PARQUET),
        &format!("v1.0/sol/blocks/2024/02/{}", PARQUET),
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("sol", "v1.0/sol", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    assert_eq!(resolution.table_roots.len(), 1);
    let root = &resolution.table_roots[0];
    assert_eq!(root.path, "v1.0/sol");
    assert!(root.is_unpartitioned());
    assert!(resolution.ambiguous.is_empty());
}

#[tokio::test]
async fn test_depth_limit_flags_ambiguous() {
    let store = store(&[&format!("v1.0/deep/a/b/c/date=2024-01-01/{}", PARQUET)]);
    let settings = ResolverSettings {
        max_depth: 2,
        ..Default::default()
    };
    let chain = ChainDescriptor::new("deep", "v1.0/deep", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    assert_eq!(resolution.ambiguous, vec!["v1.0/deep".to_string()]);
    assert_eq!(resolution.table_roots.len(), 1);
    assert!(resolution.table_roots[0].is_unpartitioned());
}

#[tokio::test]
async fn test_empty_namespace_root_is_structural_error() {
    let store = store(&[&format!("v1.0/btc/blocks/date=2024-01-01/{}", PARQUET)]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("gone", "v1.0/gone", "v1.0");

    let err = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralResolution);
}

#[tokio::test]
async fn test_unnamed_sibling_is_probed() {
    let store = store(&[
        &format!("v1.0/xrp/curated/blocks/date=2024-01-01/{}", PARQUET),
        "v1.0/xrp/raw/blocks/2024-01-01.json.gz",
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("xrp", "v1.0/xrp", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    assert_eq!(resolution.excluded, vec!["v1.0/xrp/raw".to_string()]);
    assert_eq!(resolution.table_roots.len(), 1);
    assert_eq!(resolution.table_roots[0].path, "v1.0/xrp/curated/blocks");
    assert!(
        store
            .listed_prefixes()
            .iter()
            .all(|p| !p.starts_with("v1.0/xrp/raw"))
    );
}

#[tokio::test]
async fn test_pagination_does_not_change_resolution() {
    let keys: Vec<String> = (1..=30)
        .map(|day| format!("v1.0/btc/blocks/date=2024-01-{:02}/{}", day, PARQUET))
        .collect();
    let store = InMemoryObjectStore::with_keys("aws-public-blockchain", keys).with_page_size(7);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("btc", "v1.0/btc", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();
    assert_eq!(resolution.table_roots.len(), 1);
    assert_eq!(resolution.table_roots[0].path, "v1.0/btc/blocks");
}

#[tokio::test]
async fn test_versioned_root_follows_numerically_greatest_version() {
    let store = store(&[
        &format!("v1.0/eth/traces/version=9/blocks/date=2023-01-01/{}", PARQUET),
        &format!("v1.0/eth/traces/version=10/blocks/date=2024-01-01/{}", PARQUET),
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("eth", "v1.0/eth", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    assert_eq!(resolution.table_roots.len(), 1);
    assert_eq!(
        resolution.table_roots[0].path,
        "v1.0/eth/traces/version=10/blocks"
    );
}

#[tokio::test]
async fn test_table_beside_subdivisions_is_kept_and_reported() {
    let store = store(&[
        &format!("v1.0/ton/mainnet/blocks/date=2024-01-01/{}", PARQUET),
        &format!("v1.0/ton/testnet/blocks/date=2024-01-01/{}", PARQUET),
        &format!("v1.0/ton/validators/date=2024-01-01/{}", PARQUET),
    ]);
    let settings = ResolverSettings::default();
    let chain = ChainDescriptor::new("ton", "v1.0/ton", "v1.0");

    let resolution = PathResolver::new(&store, &settings)
        .resolve(&chain)
        .await
        .unwrap();

    assert_eq!(
        resolution.namespaces(),
        vec!["ton_mainnet", "ton_testnet", "ton"]
    );
    let validators = resolution
        .table_roots
        .iter()
        .find(|t| t.path == "v1.0/ton/validators")
        .unwrap();
    assert_eq!(validators.namespace, "ton");
    assert_eq!(validators.name, "validators");
    assert!(validators.subdivision.is_none());
    assert_eq!(validators.partition_columns, vec!["date".to_string()]);
    assert_eq!(resolution.unassigned, vec!["v1.0/ton/validators".to_string()]);
}
