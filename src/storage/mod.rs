//! Object store listing abstraction
//!
//! Discovery only ever needs delimiter-based prefix listings and, for the
//! registry document, a single object read. Keys are bucket-relative and
//! directory prefixes are handled without leading or trailing slashes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
#[cfg(feature = "aws")]
pub mod s3;

/// Errors that can occur while talking to the object store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Listing a prefix failed
    #[error("Listing failed for prefix '{prefix}': {reason}")]
    ListFailed { prefix: String, reason: String },

    /// Reading an object failed
    #[error("Failed to read object '{key}': {reason}")]
    ReadFailed { key: String, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A listed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Bucket-relative key
    pub key: String,
    /// Size in bytes
    pub size: u64,
}

/// One page of a delimited listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Child directory prefixes (normalized, no trailing slash)
    pub prefixes: Vec<String>,
    /// Objects directly under the listed prefix
    pub objects: Vec<ObjectEntry>,
    /// Continuation token for the next page
    pub next: Option<String>,
}

/// A fully drained delimited listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub prefixes: Vec<String>,
    pub objects: Vec<ObjectEntry>,
}

impl Listing {
    /// True when the prefix holds neither child prefixes nor objects
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.objects.is_empty()
    }

    /// Last path segment of every child prefix
    pub fn child_names(&self) -> Vec<&str> {
        self.prefixes.iter().map(|p| last_segment(p)).collect()
    }
}

/// Prefix-based object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket (or container) name, used to build crawl target URIs
    fn bucket(&self) -> &str;

    /// List one page of children under `prefix`, using `/` as delimiter
    async fn list_page(&self, prefix: &str, continuation: Option<String>)
    -> StorageResult<ListPage>;

    /// Read a whole object; `Ok(None)` when the key does not exist
    async fn get_object(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;
}

/// Drain every page of a delimited listing
pub async fn list_all(store: &dyn ObjectStore, prefix: &str) -> StorageResult<Listing> {
    let mut listing = Listing::default();
    let mut continuation = None;

    loop {
        let page = store.list_page(prefix, continuation).await?;
        listing.prefixes.extend(page.prefixes);
        listing.objects.extend(page.objects);

        match page.next {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    listing.prefixes.sort();
    listing.prefixes.dedup();
    Ok(listing)
}

/// Strip leading and trailing slashes from a prefix
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

/// Prefix form used in listing requests (`a/b/`, or empty for the root)
pub fn dir_prefix(prefix: &str) -> String {
    let normalized = normalize_prefix(prefix);
    if normalized.is_empty() {
        normalized
    } else {
        format!("{}/", normalized)
    }
}

/// Join two key fragments with a single slash
pub fn join_key(base: &str, child: &str) -> String {
    let base = base.trim_matches('/');
    let child = child.trim_matches('/');
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, child),
    }
}

/// Non-empty path segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Count of non-empty path segments
pub fn segment_count(path: &str) -> usize {
    segments(path).count()
}

/// Last non-empty path segment, or the empty string
pub fn last_segment(path: &str) -> &str {
    segments(path).last().unwrap_or("")
}

/// Directory URI for a bucket-relative path (`s3://bucket/path/`)
pub fn s3_uri(bucket: &str, path: &str) -> String {
    let path = normalize_prefix(path);
    if path.is_empty() {
        format!("s3://{}/", bucket)
    } else {
        format!("s3://{}/{}/", bucket, path)
    }
}
