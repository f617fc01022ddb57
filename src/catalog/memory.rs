//! In-memory catalog and crawl service
//!
//! Behaves like the hosted service for the calls the engine makes,
//! including "already exists" and "already running" outcomes, and counts
//! every mutating call so idempotence can be checked.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    CatalogError, CatalogResult, CatalogService, CreateOutcome, JobSnapshot, JobState,
    LastRunStatus, StartOutcome, TableSchema, same_location,
};
use crate::crawler::CrawlJobSpec;

/// Call counters, read with [`InMemoryCatalog::counts`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_namespace: usize,
    pub namespaces_created: usize,
    pub create_job: usize,
    pub jobs_created: usize,
    pub update_job: usize,
    pub start_job: usize,
    pub jobs_started: usize,
}

impl CallCounts {
    /// Calls that changed catalog state
    pub fn mutations(&self) -> usize {
        self.namespaces_created + self.jobs_created + self.update_job + self.jobs_started
    }
}

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, Option<String>>,
    jobs: BTreeMap<String, (Option<CrawlJobSpec>, JobSnapshot)>,
    tables: Vec<TableSchema>,
    failing_namespaces: HashSet<String>,
    failing_jobs: HashSet<String>,
    /// Jobs another writer creates between our lookup and our create
    racing_jobs: HashSet<String>,
    counts: CallCounts,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> CatalogResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| CatalogError::Service("catalog state lock poisoned".to_string()))
    }

    /// Call counters so far
    pub fn counts(&self) -> CallCounts {
        self.state.lock().map(|s| s.counts).unwrap_or_default()
    }

    /// Existing namespace names, sorted
    pub fn namespaces(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.namespaces.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Existing job names, sorted
    pub fn job_names(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.jobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Current snapshot of a job
    pub fn job(&self, name: &str) -> Option<JobSnapshot> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.jobs.get(name).map(|(_, snapshot)| snapshot.clone()))
    }

    /// Spec a job was last created or updated with
    pub fn job_spec(&self, name: &str) -> Option<CrawlJobSpec> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.jobs.get(name).and_then(|(spec, _)| spec.clone()))
    }

    /// Seed a namespace without counting it
    pub fn insert_namespace(&self, name: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.namespaces.insert(name.into(), None);
        }
    }

    /// Seed a job snapshot without counting it
    pub fn insert_job(&self, snapshot: JobSnapshot) {
        if let Ok(mut state) = self.state.lock() {
            state.jobs.insert(snapshot.name.clone(), (None, snapshot));
        }
    }

    /// Seed a crawled table
    pub fn insert_table(&self, table: TableSchema) {
        if let Ok(mut state) = self.state.lock() {
            state.tables.push(table);
        }
    }

    /// Make every call touching `namespace` fail with a service error
    pub fn fail_namespace(&self, namespace: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_namespaces.insert(namespace.into());
        }
    }

    /// Make creating, updating or starting `job` fail with a service error
    pub fn fail_job(&self, job: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_jobs.insert(job.into());
        }
    }

    /// Hide `job` from lookups, then report it as existing on create
    pub fn race_job(&self, job: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.racing_jobs.insert(job.into());
        }
    }

    /// Mark a running job as finished
    pub fn finish_job(&self, name: &str, status: LastRunStatus) {
        if let Ok(mut state) = self.state.lock()
            && let Some((_, snapshot)) = state.jobs.get_mut(name)
        {
            snapshot.state = JobState::Ready;
            snapshot.last_run = Some(status);
        }
    }
}

fn check_job(state: &State, job: &str) -> CatalogResult<()> {
    if state.failing_jobs.contains(job) {
        return Err(CatalogError::Service(format!(
            "injected failure for job '{}'",
            job
        )));
    }
    Ok(())
}

fn check_namespace(state: &State, namespace: &str) -> CatalogResult<()> {
    if state.failing_namespaces.contains(namespace) {
        return Err(CatalogError::Service(format!(
            "injected failure for namespace '{}'",
            namespace
        )));
    }
    Ok(())
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn namespace_exists(&self, name: &str) -> CatalogResult<bool> {
        let state = self.state()?;
        check_namespace(&state, name)?;
        Ok(state.namespaces.contains_key(name))
    }

    async fn create_namespace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> CatalogResult<CreateOutcome> {
        let mut state = self.state()?;
        state.counts.create_namespace += 1;
        check_namespace(&state, name)?;

        if state.namespaces.contains_key(name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        state
            .namespaces
            .insert(name.to_string(), description.map(str::to_string));
        state.counts.namespaces_created += 1;
        Ok(CreateOutcome::Created)
    }

    async fn get_job(&self, name: &str) -> CatalogResult<Option<JobSnapshot>> {
        let state = self.state()?;
        if state.racing_jobs.contains(name) {
            return Ok(None);
        }
        Ok(state.jobs.get(name).map(|(_, snapshot)| snapshot.clone()))
    }

    async fn create_job(&self, spec: &CrawlJobSpec) -> CatalogResult<CreateOutcome> {
        let mut state = self.state()?;
        state.counts.create_job += 1;
        check_namespace(&state, spec.namespace())?;
        check_job(&state, spec.name())?;

        if state.racing_jobs.remove(spec.name()) {
            // The other writer's job lands now.
            let snapshot = JobSnapshot::from_spec(spec, JobState::Running);
            state
                .jobs
                .insert(spec.name().to_string(), (Some(spec.clone()), snapshot));
            return Ok(CreateOutcome::AlreadyExists);
        }
        if state.jobs.contains_key(spec.name()) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let snapshot = JobSnapshot::from_spec(spec, JobState::Ready);
        state
            .jobs
            .insert(spec.name().to_string(), (Some(spec.clone()), snapshot));
        state.counts.jobs_created += 1;
        Ok(CreateOutcome::Created)
    }

    async fn update_job(&self, spec: &CrawlJobSpec) -> CatalogResult<()> {
        let mut state = self.state()?;
        state.counts.update_job += 1;
        check_namespace(&state, spec.namespace())?;
        check_job(&state, spec.name())?;

        let Some((stored, snapshot)) = state.jobs.get_mut(spec.name()) else {
            return Err(CatalogError::JobNotFound(spec.name().to_string()));
        };
        *stored = Some(spec.clone());
        snapshot.schedule = spec.schedule().map(|s| s.to_string());
        snapshot.target_path = Some(spec.target_path().to_string());
        Ok(())
    }

    async fn start_job(&self, name: &str) -> CatalogResult<StartOutcome> {
        let mut state = self.state()?;
        state.counts.start_job += 1;
        check_job(&state, name)?;

        let Some((_, snapshot)) = state.jobs.get_mut(name) else {
            return Err(CatalogError::JobNotFound(name.to_string()));
        };
        if matches!(snapshot.state, JobState::Running | JobState::Stopping) {
            return Ok(StartOutcome::AlreadyRunning);
        }
        snapshot.state = JobState::Running;
        state.counts.jobs_started += 1;
        Ok(StartOutcome::Started)
    }

    async fn get_table_schema(
        &self,
        namespace: &str,
        location: &str,
    ) -> CatalogResult<Option<TableSchema>> {
        let state = self.state()?;
        check_namespace(&state, namespace)?;
        Ok(state
            .tables
            .iter()
            .find(|t| t.namespace == namespace && same_location(&t.location, location))
            .cloned())
    }
}
