//! Error taxonomy for discovery runs
//!
//! Only [`DiscoveryError::Configuration`] aborts a whole run. Every other
//! error is isolated to the chain or namespace that raised it and ends up
//! in the run's [`DiscoveryReport`](crate::models::DiscoveryReport).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::storage::StorageError;

/// Errors raised by the discovery and reconciliation engine
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Invalid or unknown settings, surfaced before any external call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Registry document unusable; recovered by falling back to a scan
    #[error("Discovery source error: {0}")]
    DiscoverySource(#[from] DiscoverySourceError),

    /// A namespace layout could not be resolved to any table root
    #[error("Cannot resolve table roots for chain '{chain}': {reason}")]
    StructuralResolution { chain: String, reason: String },

    /// Catalog/crawler call failed for a reason other than "already exists"
    #[error("Reconciliation failed for namespace '{namespace}': {reason}")]
    Reconciliation { namespace: String, reason: String },

    /// Per-namespace time bound exceeded
    #[error("Chain '{chain}' timed out after {}s", .after.as_secs())]
    Timeout { chain: String, after: Duration },

    /// Object store failure outside of a single namespace (e.g. the scan)
    #[error("Object store error: {0}")]
    ObjectStore(#[from] StorageError),

    /// Direct catalog call failure (manual trigger, status lookups)
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Result type for engine operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

impl DiscoveryError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        DiscoveryError::Configuration(message.into())
    }

    /// Shorthand for a structural resolution error
    pub fn structural(chain: impl Into<String>, reason: impl Into<String>) -> Self {
        DiscoveryError::StructuralResolution {
            chain: chain.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a reconciliation error
    pub fn reconciliation(namespace: impl Into<String>, reason: impl ToString) -> Self {
        DiscoveryError::Reconciliation {
            namespace: namespace.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable category written into reports
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiscoveryError::Configuration(_) => ErrorKind::Configuration,
            DiscoveryError::DiscoverySource(_) => ErrorKind::DiscoverySource,
            DiscoveryError::StructuralResolution { .. } => ErrorKind::StructuralResolution,
            DiscoveryError::Reconciliation { .. } | DiscoveryError::Catalog(_) => {
                ErrorKind::Reconciliation
            }
            DiscoveryError::Timeout { .. } => ErrorKind::Timeout,
            DiscoveryError::ObjectStore(_) => ErrorKind::ObjectStore,
        }
    }

    /// Whether the error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiscoveryError::Configuration(_) | DiscoveryError::ObjectStore(_)
        )
    }
}

/// Failure category recorded per namespace in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    DiscoverySource,
    StructuralResolution,
    Reconciliation,
    Timeout,
    ObjectStore,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::DiscoverySource => "discovery_source",
            ErrorKind::StructuralResolution => "structural_resolution",
            ErrorKind::Reconciliation => "reconciliation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ObjectStore => "object_store",
        };
        write!(f, "{}", name)
    }
}

/// Reasons the registry document cannot be used for a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySourceError {
    /// No document at the registry path
    #[error("Registry document not found at '{0}'")]
    Missing(String),

    /// The object store refused or failed the read
    #[error("Failed to read registry document '{path}': {reason}")]
    Read { path: String, reason: String },

    /// The document exists but cannot be parsed into chain records
    #[error("Malformed registry document '{path}': {reason}")]
    Malformed { path: String, reason: String },
}
