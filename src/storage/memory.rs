//! In-memory object store
//!
//! Holds keys in a sorted map and answers delimited listings with a
//! configurable page size. Records every listed prefix so callers can
//! check which parts of a tree were walked.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{
    ListPage, ObjectEntry, ObjectStore, StorageError, StorageResult, dir_prefix, join_key,
    normalize_prefix,
};

/// Default number of entries returned per listing page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

pub struct InMemoryObjectStore {
    bucket: String,
    objects: BTreeMap<String, Vec<u8>>,
    page_size: usize,
    list_calls: AtomicUsize,
    listed: Mutex<Vec<String>>,
}

impl InMemoryObjectStore {
    /// Create an empty store for `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            list_calls: AtomicUsize::new(0),
            listed: Mutex::new(Vec::new()),
        }
    }

    /// Create a store holding empty objects at `keys`
    pub fn with_keys<I, S>(bucket: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::new(bucket);
        for key in keys {
            store.insert(key, Vec::new());
        }
        store
    }

    /// Limit the number of entries per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add or replace an object
    pub fn insert(&mut self, key: impl Into<String>, content: impl Into<Vec<u8>>) {
        let key = normalize_prefix(&key.into());
        self.objects.insert(key, content.into());
    }

    /// Number of objects held
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of `list_page` calls served
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Prefixes that have been listed, in call order
    pub fn listed_prefixes(&self) -> Vec<String> {
        self.listed
            .lock()
            .map(|listed| listed.clone())
            .unwrap_or_default()
    }

    /// Children directly under `prefix`, sorted by name
    fn children(&self, prefix: &str) -> Vec<Child> {
        let request = dir_prefix(prefix);
        let mut children: BTreeMap<String, Child> = BTreeMap::new();

        for (key, content) in self.objects.range(request.clone()..) {
            let Some(rest) = key.strip_prefix(&request) else {
                break;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    let full = join_key(prefix, dir);
                    children
                        .entry(full.clone())
                        .or_insert(Child::Prefix(full));
                }
                None if !rest.is_empty() => {
                    children.insert(
                        key.clone(),
                        Child::Object(ObjectEntry {
                            key: key.clone(),
                            size: content.len() as u64,
                        }),
                    );
                }
                None => {}
            }
        }

        children.into_values().collect()
    }
}

enum Child {
    Prefix(String),
    Object(ObjectEntry),
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> StorageResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listed) = self.listed.lock() {
            listed.push(normalize_prefix(prefix));
        }

        let offset = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| StorageError::ListFailed {
                prefix: prefix.to_string(),
                reason: format!("invalid continuation token '{}'", token),
            })?,
            None => 0,
        };

        let children = self.children(prefix);
        let end = (offset + self.page_size).min(children.len());
        let mut page = ListPage::default();

        for child in children.iter().skip(offset).take(end.saturating_sub(offset)) {
            match child {
                Child::Prefix(p) => page.prefixes.push(p.clone()),
                Child::Object(o) => page.objects.push(o.clone()),
            }
        }

        if end < children.len() {
            page.next = Some(end.to_string());
        }

        Ok(page)
    }

    async fn get_object(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.objects.get(&normalize_prefix(key)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::list_all;

    fn store() -> InMemoryObjectStore {
        InMemoryObjectStore::with_keys(
            "bucket",
            [
                "v1.0/btc/blocks/date=2024-01-01/part-0.parquet",
                "v1.0/btc/transactions/date=2024-01-01/part-0.parquet",
                "v1.0/eth/blocks/date=2024-01-01/part-0.parquet",
                "v1.0/README.md",
                "v1.1/ton/blocks/date=2024-01-01/part-0.parquet",
            ],
        )
    }

    #[tokio::test]
    async fn test_delimited_listing() {
        let store = store();
        let listing = list_all(&store, "v1.0").await.unwrap();
        assert_eq!(listing.prefixes, vec!["v1.0/btc", "v1.0/eth"]);
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].key, "v1.0/README.md");
    }

    #[tokio::test]
    async fn test_root_listing() {
        let store = store();
        let listing = list_all(&store, "").await.unwrap();
        assert_eq!(listing.child_names(), vec!["v1.0", "v1.1"]);
    }

    #[tokio::test]
    async fn test_pagination_is_drained() {
        let store = store().with_page_size(1);
        let listing = list_all(&store, "v1.0").await.unwrap();
        assert_eq!(listing.prefixes.len(), 2);
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_listing_does_not_match_sibling_prefixes() {
        let store = InMemoryObjectStore::with_keys("bucket", ["v1.0/eth/a.parquet", "v1.0/eth2/b.parquet"]);
        let listing = list_all(&store, "v1.0/eth").await.unwrap();
        assert!(listing.prefixes.is_empty());
        assert_eq!(listing.objects.len(), 1);
    }

    #[tokio::test]
    async fn test_get_object() {
        let mut store = InMemoryObjectStore::new("bucket");
        store.insert("registry.yaml", b"chains: []".to_vec());
        assert_eq!(
            store.get_object("registry.yaml").await.unwrap(),
            Some(b"chains: []".to_vec())
        );
        assert_eq!(store.get_object("missing.yaml").await.unwrap(), None);
    }
}
