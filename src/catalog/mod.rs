//! Catalog and crawl service abstraction
//!
//! The external service owns two kinds of resources the engine reconciles:
//! - catalog namespaces (one per chain, or per chain sub-division)
//! - crawl jobs (one per table root)
//!
//! It also holds the tables its crawl jobs produce, which the completion
//! deduplicator reads back. "Already exists" and "already running" are
//! outcomes here, never errors: concurrent runs race on the same names.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crawler::CrawlJobSpec;

#[cfg(feature = "aws")]
pub mod glue;
pub mod memory;

/// Errors that can occur during catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The service rejected or failed the call
    #[error("Catalog service error: {0}")]
    Service(String),

    /// Crawl job not found
    #[error("Crawl job not found: {0}")]
    JobNotFound(String),

    /// A request could not be built from the job specification
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result of an idempotent create call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    /// Someone (possibly a concurrent run) created it first
    AlreadyExists,
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created)
    }
}

/// Result of starting a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Crawl job lifecycle state as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Ready,
    Running,
    Stopping,
    #[default]
    Unknown,
}

/// Outcome of the most recent crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastRunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Observed state of a crawl job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub name: String,
    pub state: JobState,
    /// Scheduler expression, `None` when unscheduled
    pub schedule: Option<String>,
    /// First crawl target (`s3://bucket/path/`)
    pub target_path: Option<String>,
    pub last_run: Option<LastRunStatus>,
}

impl JobSnapshot {
    /// Snapshot of a job as the given spec would create it
    pub fn from_spec(spec: &CrawlJobSpec, state: JobState) -> Self {
        Self {
            name: spec.name().to_string(),
            state,
            schedule: spec.schedule().map(|s| s.to_string()),
            target_path: Some(spec.target_path().to_string()),
            last_run: None,
        }
    }
}

/// Table produced by a crawl job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub namespace: String,
    pub name: String,
    /// Storage location (`s3://bucket/path/`)
    pub location: String,
    /// Inferred data columns, in catalog order
    pub columns: Vec<String>,
    /// Declared partition keys
    pub partition_columns: Vec<String>,
}

/// Trait for catalog and crawl service operations
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Check if a namespace exists
    async fn namespace_exists(&self, name: &str) -> CatalogResult<bool>;

    /// Create a namespace
    async fn create_namespace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> CatalogResult<CreateOutcome>;

    /// Look up a crawl job, `None` when it does not exist
    async fn get_job(&self, name: &str) -> CatalogResult<Option<JobSnapshot>>;

    /// Create a crawl job
    async fn create_job(&self, spec: &CrawlJobSpec) -> CatalogResult<CreateOutcome>;

    /// Overwrite an existing crawl job with the spec
    async fn update_job(&self, spec: &CrawlJobSpec) -> CatalogResult<()>;

    /// Start a crawl job
    async fn start_job(&self, name: &str) -> CatalogResult<StartOutcome>;

    /// Table whose location is `location` in `namespace`, if any
    async fn get_table_schema(
        &self,
        namespace: &str,
        location: &str,
    ) -> CatalogResult<Option<TableSchema>>;
}

/// Compare storage locations ignoring trailing slashes
pub fn same_location(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
