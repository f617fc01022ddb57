//! Catalog reconciliation
//!
//! For every chain: resolve table roots, build crawl job specs, group them
//! by catalog namespace, then plan and apply the catalog calls for each
//! group. Chains run concurrently up to `run.max_concurrency`, each under
//! the per-namespace time bound. A failure is recorded against its chain
//! (or namespace group) and never stops the others.

pub mod plan;

pub use plan::{DesiredState, ObservedState, ReconcileAction, drifted, plan};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::catalog::{CatalogError, CatalogService, CreateOutcome, JobSnapshot, StartOutcome};
use crate::config::ValidatedConfig;
use crate::crawler::CrawlJobConfigBuilder;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{ChainDescriptor, DiscoveryReport, FailureEntry, FlagEntry, ResourceEntry};
use crate::resolver::{PathResolver, Resolution};
use crate::storage::ObjectStore;

/// Everything one chain contributed to the run report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutcome {
    pub entries: Vec<ResourceEntry>,
    pub failures: Vec<FailureEntry>,
    pub flags: Vec<FlagEntry>,
}

impl ChainOutcome {
    fn failed(chain: &ChainDescriptor, namespace: Option<String>, error: &DiscoveryError) -> Self {
        Self {
            failures: vec![FailureEntry::new(chain, namespace, error)],
            ..Default::default()
        }
    }

    /// File this outcome into a report
    pub fn merge_into(self, report: &mut DiscoveryReport) {
        for entry in self.entries {
            report.add_entry(entry);
        }
        for failure in self.failures {
            report.add_failure(failure);
        }
        for flag in self.flags {
            report.add_flag(flag);
        }
    }
}

/// Write `entry` into its slot in `outcome`, claiming one on first use
fn record(outcome: &mut ChainOutcome, slot: &mut Option<usize>, entry: &ResourceEntry) {
    match *slot {
        Some(i) => outcome.entries[i] = entry.clone(),
        None => {
            *slot = Some(outcome.entries.len());
            outcome.entries.push(entry.clone());
        }
    }
}

/// Reconciles resolved chains against the catalog service
#[derive(Clone)]
pub struct ResourceReconciler {
    catalog: Arc<dyn CatalogService>,
    store: Arc<dyn ObjectStore>,
    config: Arc<ValidatedConfig>,
}

impl ResourceReconciler {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        store: Arc<dyn ObjectStore>,
        config: Arc<ValidatedConfig>,
    ) -> Self {
        Self {
            catalog,
            store,
            config,
        }
    }

    /// Resolve a chain's table roots
    pub async fn resolve(&self, chain: &ChainDescriptor) -> DiscoveryResult<Resolution> {
        PathResolver::new(self.store.as_ref(), &self.config.resolver)
            .resolve(chain)
            .await
    }

    /// Group crawl job specs for a resolution by catalog namespace
    pub fn desired_states(
        &self,
        chain: &ChainDescriptor,
        resolution: &Resolution,
    ) -> DiscoveryResult<Vec<DesiredState>> {
        let builder = CrawlJobConfigBuilder::new(self.store.bucket(), &self.config.crawler);
        let schedule = self.config.schedule_for(&chain.name);

        let mut groups: Vec<DesiredState> = Vec::new();
        for root in &resolution.table_roots {
            let spec = builder.build(chain, root, schedule)?;
            match groups.iter_mut().find(|g| g.namespace == root.namespace) {
                Some(group) => group.jobs.push(spec),
                None => groups.push(DesiredState {
                    namespace: root.namespace.clone(),
                    description: chain.description.clone(),
                    jobs: vec![spec],
                }),
            }
        }
        Ok(groups)
    }

    /// Read the catalog state a desired namespace is compared against
    pub async fn observe(&self, desired: &DesiredState) -> DiscoveryResult<ObservedState> {
        let reconciliation = |e: CatalogError| DiscoveryError::reconciliation(&desired.namespace, e);

        let namespace_exists = self
            .catalog
            .namespace_exists(&desired.namespace)
            .await
            .map_err(reconciliation)?;

        let mut jobs = HashMap::new();
        for spec in &desired.jobs {
            if let Some(snapshot) = self
                .catalog
                .get_job(spec.name())
                .await
                .map_err(reconciliation)?
            {
                jobs.insert(spec.name().to_string(), snapshot);
            }
        }

        Ok(ObservedState {
            namespace_exists,
            jobs,
        })
    }

    /// Apply planned actions for one namespace, serially
    ///
    /// A failed namespace call fails the whole group. After that every job
    /// is applied on its own: a failed job is recorded in `outcome` and the
    /// next job still runs. Entries are written to `outcome` as soon as a
    /// call succeeds, so a run cut short keeps what it already changed.
    /// Namespace creation is credited to the first entry written.
    pub async fn apply(
        &self,
        chain: &ChainDescriptor,
        desired: &DesiredState,
        actions: &[ReconcileAction],
        outcome: &mut ChainOutcome,
    ) -> DiscoveryResult<()> {
        let mut namespace_credit = false;
        for action in actions {
            if let ReconcileAction::CreateNamespace { name, description } = action {
                let created = self
                    .catalog
                    .create_namespace(name, description.as_deref())
                    .await
                    .map_err(|e| DiscoveryError::reconciliation(&desired.namespace, e))?;
                if created.is_created() {
                    tracing::info!(namespace = %name, "Created catalog namespace");
                    namespace_credit = true;
                }
            }
        }

        for spec in &desired.jobs {
            let mut entry = ResourceEntry {
                chain: chain.identity(),
                namespace: desired.namespace.clone(),
                job_name: spec.name().to_string(),
                target_path: spec.target_path().to_string(),
                namespace_created: namespace_credit,
                job_created: false,
                job_updated: false,
                job_started: false,
            };
            let mut slot: Option<usize> = None;
            let mut lost_race = false;
            let mut failure = None;

            for action in actions.iter().filter(|a| a.job_name() == Some(spec.name())) {
                if let Err(e) = self
                    .apply_job_action(&desired.namespace, action, &mut entry, &mut lost_race)
                    .await
                {
                    failure = Some(e);
                    break;
                }
                record(outcome, &mut slot, &entry);
            }

            match failure {
                Some(e) => {
                    tracing::warn!(
                        chain = %chain.identity(),
                        namespace = %desired.namespace,
                        "Crawl job {} failed: {}",
                        spec.name(),
                        e
                    );
                    outcome.failures.push(FailureEntry::new(
                        chain,
                        Some(desired.namespace.clone()),
                        &e,
                    ));
                }
                None => record(outcome, &mut slot, &entry),
            }

            if slot.is_some() {
                namespace_credit = false;
            }
        }

        if namespace_credit {
            tracing::warn!(
                namespace = %desired.namespace,
                "Created catalog namespace but none of its crawl jobs"
            );
        }

        Ok(())
    }

    async fn apply_job_action(
        &self,
        namespace: &str,
        action: &ReconcileAction,
        entry: &mut ResourceEntry,
        lost_race: &mut bool,
    ) -> DiscoveryResult<()> {
        let reconciliation = |e: CatalogError| DiscoveryError::reconciliation(namespace, e);

        match action {
            ReconcileAction::CreateNamespace { .. } => {}
            ReconcileAction::CreateJob(spec) => {
                match self.catalog.create_job(spec).await.map_err(reconciliation)? {
                    CreateOutcome::Created => {
                        tracing::info!(
                            namespace = %namespace,
                            "Created crawl job {} for {}",
                            spec.name(),
                            spec.target_path()
                        );
                        entry.job_created = true;
                    }
                    CreateOutcome::AlreadyExists => {
                        tracing::debug!(
                            namespace = %namespace,
                            "Crawl job {} already exists, skipping its initial run",
                            spec.name()
                        );
                        *lost_race = true;
                    }
                }
            }
            ReconcileAction::UpdateJob(spec) => {
                self.catalog.update_job(spec).await.map_err(reconciliation)?;
                tracing::info!(namespace = %namespace, "Updated drifted crawl job {}", spec.name());
                entry.job_updated = true;
            }
            ReconcileAction::StartJob(name) => {
                if !*lost_race {
                    let started = self.catalog.start_job(name).await.map_err(reconciliation)?;
                    entry.job_started = started == StartOutcome::Started;
                }
            }
        }
        Ok(())
    }

    /// Resolve, build, plan and apply everything for one chain
    pub async fn reconcile_chain(&self, chain: &ChainDescriptor) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();
        self.reconcile_chain_into(chain, &mut outcome).await;
        outcome
    }

    /// Like [`Self::reconcile_chain`], writing into `outcome` as it goes
    ///
    /// Dropping the future part way leaves `outcome` holding every change
    /// made so far.
    pub async fn reconcile_chain_into(
        &self,
        chain: &ChainDescriptor,
        outcome: &mut ChainOutcome,
    ) {
        let resolution = match self.resolve(chain).await {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(chain = %chain.identity(), "Resolution failed: {}", e);
                outcome.failures.push(FailureEntry::new(chain, None, &e));
                return;
            }
        };

        outcome.flags.extend(resolution.ambiguous.iter().map(|path| FlagEntry {
            chain: chain.identity(),
            path: path.clone(),
            reason: format!(
                "partition search stopped at depth {}; table roots may be deeper",
                self.config.resolver.max_depth
            ),
        }));
        outcome.flags.extend(resolution.unassigned.iter().map(|path| FlagEntry {
            chain: chain.identity(),
            path: path.clone(),
            reason: "sits beside network subdivisions; cataloged under the chain namespace"
                .to_string(),
        }));

        let groups = match self.desired_states(chain, &resolution) {
            Ok(groups) => groups,
            Err(e) => {
                outcome.failures.push(FailureEntry::new(chain, None, &e));
                return;
            }
        };

        for desired in &groups {
            let result = async {
                let observed = self.observe(desired).await?;
                let actions = plan(desired, &observed);
                tracing::debug!(
                    namespace = %desired.namespace,
                    "Planned {} action(s)",
                    actions.len()
                );
                self.apply(chain, desired, &actions, &mut *outcome).await
            }
            .await;

            if let Err(e) = result {
                tracing::warn!(
                    chain = %chain.identity(),
                    namespace = %desired.namespace,
                    "Reconciliation failed: {}",
                    e
                );
                outcome.failures.push(FailureEntry::new(
                    chain,
                    Some(desired.namespace.clone()),
                    &e,
                ));
            }
        }
    }

    /// Reconcile every chain into `report`
    pub async fn reconcile_all(&self, chains: Vec<ChainDescriptor>, report: &mut DiscoveryReport) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let after = self.config.namespace_timeout;
        let mut pending: HashMap<String, ChainDescriptor> = HashMap::new();
        let mut join_set: JoinSet<(String, ChainOutcome)> = JoinSet::new();

        for chain in chains {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let error = DiscoveryError::reconciliation(chain.identity(), e);
                    ChainOutcome::failed(&chain, None, &error).merge_into(report);
                    continue;
                }
            };

            pending.insert(chain.identity(), chain.clone());
            let reconciler = self.clone();
            let span = tracing::info_span!("reconcile", chain = %chain.identity());
            let task = async move {
                let _permit = permit;
                let identity = chain.identity();
                let mut outcome = ChainOutcome::default();
                // The bound starts once the chain holds a permit.
                let work = reconciler.reconcile_chain_into(&chain, &mut outcome);
                let finished = tokio::time::timeout(after, work).await;
                if finished.is_err() {
                    tracing::warn!(chain = %identity, "Timed out after {:?}", after);
                    let error = DiscoveryError::Timeout {
                        chain: identity.clone(),
                        after,
                    };
                    outcome.failures.push(FailureEntry::new(&chain, None, &error));
                }
                (identity, outcome)
            };
            join_set.spawn(task.instrument(span));
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((identity, outcome)) => {
                    pending.remove(&identity);
                    outcome.merge_into(report);
                }
                Err(join_err) => {
                    tracing::warn!("Reconciliation task failed: {}", join_err);
                }
            }
        }

        // Whatever is left died with its task.
        for chain in pending.into_values() {
            let error = DiscoveryError::reconciliation(
                chain.identity(),
                "reconciliation task ended without a result",
            );
            ChainOutcome::failed(&chain, None, &error).merge_into(report);
        }
    }

    /// Start a crawl job by hand; a running job is not an error
    pub async fn trigger(&self, job: &str) -> DiscoveryResult<StartOutcome> {
        let outcome = self.catalog.start_job(job).await?;
        match outcome {
            StartOutcome::Started => tracing::info!("Started crawl job {}", job),
            StartOutcome::AlreadyRunning => tracing::info!("Crawl job {} is already running", job),
        }
        Ok(outcome)
    }

    /// Current state of a crawl job
    pub async fn status(&self, job: &str) -> DiscoveryResult<Option<JobSnapshot>> {
        Ok(self.catalog.get_job(job).await?)
    }
}
