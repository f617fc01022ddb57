//! Table root model

use serde::{Deserialize, Serialize};

use crate::storage::{normalize_prefix, segment_count};

/// How partitions found at the table level are grouped into tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupingPolicy {
    /// Merge every `key=value` partition at the table level into one table
    #[default]
    CombineCompatibleSchemas,
}

impl GroupingPolicy {
    /// Name used by the crawl service configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingPolicy::CombineCompatibleSchemas => "CombineCompatibleSchemas",
        }
    }
}

/// The directory at which Hive-style partitioning begins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRoot {
    /// Catalog namespace this table belongs to
    pub namespace: String,
    /// Table name, unique within the namespace
    pub name: String,
    /// Bucket-relative path of the table root
    pub path: String,
    /// Non-empty segment count of `path`
    pub partition_depth: usize,
    pub grouping_policy: GroupingPolicy,
    /// Partition keys, outermost first
    pub partition_columns: Vec<String>,
    /// Network/environment sub-division the table was found in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdivision: Option<String>,
}

impl TableRoot {
    /// Create a table root; the depth is always derived from the path
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        path: &str,
        partition_columns: Vec<String>,
    ) -> Self {
        let path = normalize_prefix(path);
        Self {
            namespace: namespace.into(),
            name: name.into(),
            partition_depth: segment_count(&path),
            path,
            grouping_policy: GroupingPolicy::default(),
            partition_columns,
            subdivision: None,
        }
    }

    pub fn with_subdivision(mut self, subdivision: impl Into<String>) -> Self {
        self.subdivision = Some(subdivision.into());
        self
    }

    /// True when no `key=value` level was found under the root
    pub fn is_unpartitioned(&self) -> bool {
        self.partition_columns.is_empty()
    }
}
