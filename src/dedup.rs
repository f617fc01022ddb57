//! Post-crawl schema deduplication
//!
//! Crawlers infer data columns from file contents, and files written with
//! their partition key inside (a `date` column under `date=...`) make the
//! partition key show up twice. The deduplicator computes the column list
//! with partition keys removed. It reports; it does not write the catalog.

use std::sync::Arc;

use chrono::Utc;

use crate::catalog::CatalogService;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{CompletionReport, JobRunStatus, JobStateChangeEvent};

/// Split `columns` into columns kept and partition-key duplicates removed
///
/// Matching is exact and case-sensitive; order is preserved in both lists.
pub fn dedupe_columns(
    columns: &[String],
    partition_columns: &[String],
) -> (Vec<String>, Vec<String>) {
    columns
        .iter()
        .cloned()
        .partition(|column| !partition_columns.contains(column))
}

/// Handles job-state-change events from the crawl service
pub struct CompletionDeduplicator {
    catalog: Arc<dyn CatalogService>,
}

impl CompletionDeduplicator {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog }
    }

    /// Build the completion report for a finished crawl job
    pub async fn process(&self, event: &JobStateChangeEvent) -> DiscoveryResult<CompletionReport> {
        let mut report = CompletionReport {
            job_id: event.job_id.clone(),
            status: event.status,
            namespace: event.namespace.clone(),
            table_root: event.table_root.clone(),
            table_name: None,
            final_columns: Vec::new(),
            partition_columns: Vec::new(),
            duplicates_removed: Vec::new(),
            completed_at: Utc::now(),
        };

        if event.status == JobRunStatus::Failed {
            tracing::warn!(
                namespace = %event.namespace,
                "Crawl job {} failed, nothing to deduplicate",
                event.job_id
            );
            return Ok(report);
        }

        let table = self
            .catalog
            .get_table_schema(&event.namespace, &event.table_root)
            .await
            .map_err(|e| DiscoveryError::reconciliation(&event.namespace, e))?
            .ok_or_else(|| {
                DiscoveryError::reconciliation(
                    &event.namespace,
                    format!("no table found at {}", event.table_root),
                )
            })?;

        let (final_columns, removed) = dedupe_columns(&table.columns, &table.partition_columns);
        if !removed.is_empty() {
            tracing::info!(
                namespace = %event.namespace,
                "Table {} repeats partition column(s) {:?}",
                table.name,
                removed
            );
        }

        report.table_name = Some(table.name);
        report.final_columns = final_columns;
        report.partition_columns = table.partition_columns;
        report.duplicates_removed = removed;
        Ok(report)
    }
}
