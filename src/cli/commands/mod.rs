//! CLI command implementations

pub mod chains;
pub mod discover;
pub mod jobs;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::glue::GlueCatalog;
use crate::cli::error::CliError;
use crate::config::EngineConfig;
use crate::engine::DiscoveryEngine;
use crate::notify::LogNotifier;
use crate::storage::s3::S3ObjectStore;

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file; `.chain-catalog.toml` in the working directory
    /// when absent
    pub config: Option<PathBuf>,
    /// Overrides `storage.bucket`
    pub bucket: Option<String>,
    /// Overrides `storage.region`
    pub region: Option<String>,
}

/// Load configuration with command line overrides applied last
pub fn load_config(global: &GlobalArgs) -> Result<EngineConfig, CliError> {
    let mut config = match &global.config {
        Some(path) => EngineConfig::load_file(path)?,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| CliError::IoError(format!("Failed to read working directory: {}", e)))?;
            EngineConfig::load(&cwd)?
        }
    };

    if let Some(bucket) = &global.bucket {
        config.storage.bucket = bucket.clone();
    }
    if let Some(region) = &global.region {
        config.storage.region = region.clone();
    }

    Ok(config)
}

pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

/// Engine over S3 and Glue, configured from the flags and config file
pub async fn build_engine(global: &GlobalArgs) -> Result<DiscoveryEngine, CliError> {
    let config = load_config(global)?;
    // Fail on bad settings before any client is built.
    config.validate()?;

    let store = S3ObjectStore::from_env(
        config.storage.bucket.clone(),
        Some(config.storage.region.clone()),
        config.storage.requester_pays,
    )
    .await;
    let catalog = GlueCatalog::from_env(Some(config.storage.region.clone())).await;

    let engine = DiscoveryEngine::new(&config, Arc::new(store), Arc::new(catalog))?
        .with_notifier(Arc::new(LogNotifier));
    Ok(engine)
}

/// Pretty JSON for stdout and report files
pub fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::SerializationError(e.to_string()))
}
