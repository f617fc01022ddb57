//! Chain Catalog - discovery and reconciliation engine for partitioned datasets
//!
//! Catalogs hierarchically organised blockchain datasets stored in an object
//! store. A discovery run:
//! - finds dataset namespaces (registry document, or a prefix scan fallback)
//! - resolves each namespace into table roots and partition depths
//! - builds a crawl job specification per table root
//! - reconciles catalog namespaces and crawl jobs against the external
//!   catalog/crawler service, idempotently
//!
//! Finished crawl jobs are post-processed by the completion deduplicator,
//! which strips inferred columns that collide with partition keys.

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod resolver;
pub mod schedule;
pub mod storage;

// Re-export commonly used types
#[cfg(feature = "aws")]
pub use catalog::glue::GlueCatalog;
pub use catalog::memory::InMemoryCatalog;
pub use catalog::{CatalogError, CatalogService, CreateOutcome, JobSnapshot, StartOutcome};
pub use config::{EngineConfig, ValidatedConfig};
pub use crawler::{CrawlJobConfigBuilder, CrawlJobSpec};
pub use dedup::{CompletionDeduplicator, dedupe_columns};
pub use discovery::{DiscoverySource, ManifestFetcher, NamespaceScanner};
pub use engine::DiscoveryEngine;
pub use error::{DiscoveryError, DiscoveryResult, DiscoverySourceError, ErrorKind};
pub use models::{
    ChainDescriptor, CompletionReport, DiscoveryReport, GroupingPolicy, JobStateChangeEvent,
    TableRoot,
};
pub use notify::{LogNotifier, NotificationMessage, Notifier};
pub use reconcile::ResourceReconciler;
pub use resolver::PathResolver;
pub use schedule::{ScheduleExpression, SymbolicSchedule, translate};
pub use storage::memory::InMemoryObjectStore;
#[cfg(feature = "aws")]
pub use storage::s3::S3ObjectStore;
pub use storage::{ObjectStore, StorageError};
