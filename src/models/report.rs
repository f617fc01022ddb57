//! Discovery and completion reports
//!
//! Reports are observational output only. The external catalog stays the
//! authority on what exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ChainDescriptor;
use crate::error::{DiscoveryError, ErrorKind};

/// Where the run's chain list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Explicit registry document
    Manifest,
    /// Heuristic prefix scan
    Scan,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Manifest => write!(f, "manifest"),
            SourceKind::Scan => write!(f, "scan"),
        }
    }
}

/// Outcome for one crawl job (and its namespace) in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    /// Chain identity (`v1.0/btc`)
    pub chain: String,
    pub namespace: String,
    pub job_name: String,
    pub target_path: String,
    /// This run created the catalog namespace
    pub namespace_created: bool,
    /// This run created the crawl job
    pub job_created: bool,
    /// This run updated a drifted crawl job
    pub job_updated: bool,
    /// This run started the crawl job
    pub job_started: bool,
}

impl ResourceEntry {
    /// True when the run created anything for this entry
    pub fn created_anything(&self) -> bool {
        self.namespace_created || self.job_created
    }
}

/// A chain or namespace that could not be reconciled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    pub chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub kind: ErrorKind,
    pub cause: String,
}

impl FailureEntry {
    pub fn new(chain: &ChainDescriptor, namespace: Option<String>, error: &DiscoveryError) -> Self {
        Self {
            chain: chain.identity(),
            namespace,
            kind: error.kind(),
            cause: error.to_string(),
        }
    }
}

/// A resolution that succeeded but needs a human look
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEntry {
    pub chain: String,
    pub path: String,
    pub reason: String,
}

/// Per-run discovery report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// Unique id of the run
    pub run_id: Uuid,
    pub source: SourceKind,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Number of chains the source produced
    pub chains_discovered: usize,
    pub created: Vec<ResourceEntry>,
    pub updated: Vec<ResourceEntry>,
    pub skipped: Vec<ResourceEntry>,
    pub failed: Vec<FailureEntry>,
    pub flagged: Vec<FlagEntry>,
}

impl DiscoveryReport {
    /// Start an empty report
    pub fn new(source: SourceKind) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            source,
            started_at: now,
            completed_at: now,
            chains_discovered: 0,
            created: Vec::new(),
            updated: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            flagged: Vec::new(),
        }
    }

    /// File an entry under created, updated or skipped
    pub fn add_entry(&mut self, entry: ResourceEntry) {
        if entry.created_anything() {
            self.created.push(entry);
        } else if entry.job_updated {
            self.updated.push(entry);
        } else {
            self.skipped.push(entry);
        }
    }

    pub fn add_failure(&mut self, failure: FailureEntry) {
        self.failed.push(failure);
    }

    pub fn add_flag(&mut self, flag: FlagEntry) {
        self.flagged.push(flag);
    }

    /// Sort entries and stamp the completion time
    pub fn complete(&mut self) {
        self.created.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        self.updated.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        self.skipped.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        self.failed.sort_by(|a, b| a.chain.cmp(&b.chain));
        self.flagged.sort_by(|a, b| a.chain.cmp(&b.chain));
        self.completed_at = Utc::now();
    }

    /// No failures and nothing flagged
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.flagged.is_empty()
    }

    /// Number of crawl jobs started by this run
    pub fn jobs_started(&self) -> usize {
        self.created
            .iter()
            .chain(self.updated.iter())
            .chain(self.skipped.iter())
            .filter(|e| e.job_started)
            .count()
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "source={} chains={} created={} updated={} skipped={} failed={} flagged={}",
            self.source,
            self.chains_discovered,
            self.created.len(),
            self.updated.len(),
            self.skipped.len(),
            self.failed.len(),
            self.flagged.len()
        )
    }
}

/// Terminal status of a crawl job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Succeeded,
    Failed,
}

/// Job-state-change event emitted by the crawl service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStateChangeEvent {
    pub job_id: String,
    pub status: JobRunStatus,
    pub namespace: String,
    /// Location the job crawled (`s3://bucket/path/`)
    pub table_root: String,
}

/// Result of post-processing a finished crawl job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub job_id: String,
    pub status: JobRunStatus,
    pub namespace: String,
    pub table_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub final_columns: Vec<String>,
    pub partition_columns: Vec<String>,
    pub duplicates_removed: Vec<String>,
    pub completed_at: DateTime<Utc>,
}
