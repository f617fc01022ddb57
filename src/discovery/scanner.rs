//! Prefix scan fallback
//!
//! Infers chains from the bucket layout `{root}/{version}/{chain}/...`.

use super::manifest::is_version_segment;
use crate::models::ChainDescriptor;
use crate::storage::{ObjectStore, StorageResult, join_key, last_segment, list_all};

/// Lists version prefixes and turns their children into chains
pub struct NamespaceScanner;

impl NamespaceScanner {
    /// Scan `root` for chains
    ///
    /// With no `version_prefixes`, every child of `root` named like a
    /// version (`v1.0`) is scanned.
    pub async fn scan(
        store: &dyn ObjectStore,
        root: &str,
        version_prefixes: &[String],
    ) -> StorageResult<Vec<ChainDescriptor>> {
        let versions: Vec<String> = if version_prefixes.is_empty() {
            list_all(store, root)
                .await?
                .child_names()
                .into_iter()
                .filter(|name| is_version_segment(name))
                .map(str::to_string)
                .collect()
        } else {
            version_prefixes.to_vec()
        };

        let mut chains = Vec::new();
        for version in &versions {
            let listing = list_all(store, &join_key(root, version)).await?;
            tracing::debug!("Version '{}' holds {} chain(s)", version, listing.prefixes.len());

            chains.extend(
                listing
                    .prefixes
                    .iter()
                    .map(|prefix| ChainDescriptor::new(last_segment(prefix), prefix, version)),
            );
        }

        chains.sort_by(|a, b| {
            (&a.dataset_version, &a.name).cmp(&(&b.dataset_version, &b.name))
        });
        chains.dedup_by(|a, b| a.dataset_version == b.dataset_version && a.name == b.name);
        Ok(chains)
    }
}
