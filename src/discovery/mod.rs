//! Chain discovery
//!
//! A run reads its chain list from exactly one source: the registry
//! document when one can be read and parsed, otherwise a prefix scan.
//! The choice is made once, logged, and recorded in the run report.

pub mod manifest;
pub mod scanner;

pub use manifest::{ManifestFetcher, RegistryDocument, RegistryRecord};
pub use scanner::NamespaceScanner;

use crate::config::ValidatedConfig;
use crate::error::{DiscoverySourceError, DiscoveryResult};
use crate::models::{ChainDescriptor, SourceKind};
use crate::storage::{ObjectStore, join_key, normalize_prefix};

/// Where to scan when no registry is usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    pub root: String,
    /// Empty means every version-named child of `root`
    pub version_prefixes: Vec<String>,
}

/// The single chain source of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    Manifest(RegistryDocument),
    Scan(ScanPlan),
}

impl DiscoverySource {
    /// Pick the run's source
    ///
    /// Any registry problem (missing, unreadable, malformed) falls back to
    /// a scan; it never fails the run.
    pub async fn select(store: &dyn ObjectStore, config: &ValidatedConfig) -> Self {
        let scan = || {
            DiscoverySource::Scan(ScanPlan {
                root: normalize_prefix(&config.storage.root),
                version_prefixes: config.storage.version_prefixes.clone(),
            })
        };

        let Some(registry_path) = &config.registry_path else {
            tracing::info!("Registry lookup disabled, scanning prefixes");
            return scan();
        };

        let key = join_key(&config.storage.root, registry_path);
        match ManifestFetcher::fetch(store, &key).await {
            Ok(document) => {
                tracing::info!(
                    "Using registry document '{}' ({} chains)",
                    key,
                    document.records.len()
                );
                DiscoverySource::Manifest(document)
            }
            Err(DiscoverySourceError::Missing(_)) => {
                tracing::info!("No registry document at '{}', scanning prefixes", key);
                scan()
            }
            Err(e) => {
                tracing::warn!("{}; falling back to prefix scan", e);
                scan()
            }
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            DiscoverySource::Manifest(_) => SourceKind::Manifest,
            DiscoverySource::Scan(_) => SourceKind::Scan,
        }
    }

    /// Chain descriptors from this source only
    ///
    /// Per-chain description overrides from the configuration are applied.
    pub async fn chains(
        &self,
        store: &dyn ObjectStore,
        config: &ValidatedConfig,
    ) -> DiscoveryResult<Vec<ChainDescriptor>> {
        let mut chains = match self {
            DiscoverySource::Manifest(document) => {
                document.descriptors(&config.storage.root, &config.storage.default_version)
            }
            DiscoverySource::Scan(plan) => {
                NamespaceScanner::scan(store, &plan.root, &plan.version_prefixes).await?
            }
        };

        for chain in &mut chains {
            if let Some(description) = config.description_for(&chain.name) {
                chain.description = Some(description.to_string());
            }
        }

        tracing::debug!("{} source yielded {} chain(s)", self.kind(), chains.len());
        Ok(chains)
    }
}
