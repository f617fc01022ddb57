//! Discovery engine
//!
//! Wires configuration, the object store and the catalog service together
//! and runs complete discovery passes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chain_catalog::{DiscoveryEngine, EngineConfig, InMemoryCatalog, InMemoryObjectStore};
//!
//! let store = Arc::new(InMemoryObjectStore::new("aws-public-blockchain"));
//! let catalog = Arc::new(InMemoryCatalog::new());
//! let engine = DiscoveryEngine::new(&EngineConfig::default(), store, catalog)?;
//! let report = engine.run().await?;
//! println!("{}", report.summary());
//! ```

use std::sync::Arc;

use crate::catalog::CatalogService;
use crate::config::{EngineConfig, ValidatedConfig};
use crate::crawler::{CrawlJobConfigBuilder, CrawlJobSpec};
use crate::dedup::CompletionDeduplicator;
use crate::discovery::DiscoverySource;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{ChainDescriptor, DiscoveryReport};
use crate::notify::{NotificationMessage, Notifier};
use crate::reconcile::ResourceReconciler;
use crate::resolver::Resolution;
use crate::storage::ObjectStore;

/// Table roots and crawl specs for one chain, without catalog writes
#[derive(Debug, Clone)]
pub struct ChainPlan {
    pub chain: ChainDescriptor,
    pub resolution: Resolution,
    pub jobs: Vec<CrawlJobSpec>,
}

pub struct DiscoveryEngine {
    config: Arc<ValidatedConfig>,
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn CatalogService>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl DiscoveryEngine {
    /// Create an engine; configuration errors surface here, before any
    /// external call
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn CatalogService>,
    ) -> DiscoveryResult<Self> {
        let validated = config.validate()?;
        if store.bucket() != validated.storage.bucket {
            return Err(DiscoveryError::config(format!(
                "object store bucket '{}' does not match storage.bucket '{}'",
                store.bucket(),
                validated.storage.bucket
            )));
        }

        Ok(Self {
            config: Arc::new(validated),
            store,
            catalog,
            notifier: None,
        })
    }

    /// Send run reports to `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn reconciler(&self) -> ResourceReconciler {
        ResourceReconciler::new(
            self.catalog.clone(),
            self.store.clone(),
            self.config.clone(),
        )
    }

    pub fn deduplicator(&self) -> CompletionDeduplicator {
        CompletionDeduplicator::new(self.catalog.clone())
    }

    /// Pick the chain source the way a run would
    pub async fn select_source(&self) -> DiscoverySource {
        DiscoverySource::select(self.store.as_ref(), &self.config).await
    }

    /// Chains a run would reconcile
    pub async fn list_chains(&self) -> DiscoveryResult<Vec<ChainDescriptor>> {
        let source = self.select_source().await;
        self.chains_from(&source).await
    }

    /// Chains from an already selected source
    pub async fn chains_from(
        &self,
        source: &DiscoverySource,
    ) -> DiscoveryResult<Vec<ChainDescriptor>> {
        source.chains(self.store.as_ref(), &self.config).await
    }

    /// Find a chain by name (`btc`) or identity (`v1.1/ton`)
    ///
    /// A bare name matching several versions resolves to the first version.
    pub async fn find_chain(&self, name: &str) -> DiscoveryResult<ChainDescriptor> {
        self.list_chains()
            .await?
            .into_iter()
            .find(|c| c.identity() == name || c.name == name)
            .ok_or_else(|| DiscoveryError::config(format!("Unknown chain '{}'", name)))
    }

    /// Resolve table roots for one chain
    pub async fn resolve_chain(&self, chain: &ChainDescriptor) -> DiscoveryResult<Resolution> {
        self.reconciler().resolve(chain).await
    }

    /// Resolve a chain and build its crawl specs without touching the catalog
    pub async fn plan_chain(&self, chain: &ChainDescriptor) -> DiscoveryResult<ChainPlan> {
        let resolution = self.resolve_chain(chain).await?;
        let builder = CrawlJobConfigBuilder::new(self.store.bucket(), &self.config.crawler);
        let schedule = self.config.schedule_for(&chain.name);

        let jobs = resolution
            .table_roots
            .iter()
            .map(|root| builder.build(chain, root, schedule))
            .collect::<DiscoveryResult<Vec<_>>>()?;

        Ok(ChainPlan {
            chain: chain.clone(),
            resolution,
            jobs,
        })
    }

    /// Run a complete discovery pass
    ///
    /// Only a failure to enumerate chains fails the run; everything after
    /// that lands in the report.
    pub async fn run(&self) -> DiscoveryResult<DiscoveryReport> {
        let source = self.select_source().await;
        let mut report = DiscoveryReport::new(source.kind());
        tracing::info!(run_id = %report.run_id, "Starting discovery run from {}", source.kind());

        let chains = self.chains_from(&source).await?;
        report.chains_discovered = chains.len();

        self.reconciler().reconcile_all(chains, &mut report).await;
        report.complete();

        if report.is_clean() {
            tracing::info!(run_id = %report.run_id, "Discovery run finished: {}", report.summary());
        } else {
            tracing::warn!(run_id = %report.run_id, "Discovery run finished: {}", report.summary());
        }

        if let Some(notifier) = &self.notifier {
            let message = NotificationMessage::Discovery(report.clone());
            if let Err(e) = notifier.notify(&message).await {
                tracing::warn!("Failed to send discovery report: {}", e);
            }
        }

        Ok(report)
    }
}
