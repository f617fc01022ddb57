//! CLI configuration loading tests

#![cfg(feature = "cli")]

use chain_catalog::cli::commands::{GlobalArgs, load_config, to_json};
use chain_catalog::cli::error::CliError;
use tempfile::tempdir;

#[test]
fn test_flags_override_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.toml");
    std::fs::write(
        &path,
        r#"
[storage]
bucket = "from-file"
region = "eu-west-1"

[crawler]
schedule = "weekly"
"#,
    )
    .unwrap();

    let global = GlobalArgs {
        config: Some(path),
        bucket: Some("from-flag".to_string()),
        region: None,
    };
    let config = load_config(&global).unwrap();

    assert_eq!(config.storage.bucket, "from-flag");
    assert_eq!(config.storage.region, "eu-west-1");
    assert_eq!(config.crawler.schedule, "weekly");
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let global = GlobalArgs {
        config: Some(dir.path().join("absent.toml")),
        ..Default::default()
    };

    let config = load_config(&global).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_unparseable_config_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[storage\nbucket = ").unwrap();

    let global = GlobalArgs {
        config: Some(path),
        ..Default::default()
    };
    let err = load_config(&global).unwrap_err();
    assert!(matches!(err, CliError::Discovery(_)));
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn test_to_json_is_pretty() {
    let json = to_json(&vec!["btc", "eth"]).unwrap();
    assert!(json.contains('\n'));
    assert!(json.contains("\"btc\""));
}
