//! Crawl job specifications
//!
//! A [`CrawlJobSpec`] is built once per [`TableRoot`] by the
//! [`CrawlJobConfigBuilder`]. Incremental recrawls must pair with a log-only
//! schema change policy; [`CrawlJobSpec::try_new`] is the only constructor
//! and rejects any other combination.

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{ChainDescriptor, GroupingPolicy, TableRoot};
use crate::schedule::{ScheduleExpression, SymbolicSchedule};
use crate::storage::s3_uri;

/// Objects sampled per leaf folder when inferring a schema
pub const DEFAULT_SAMPLE_SIZE: u32 = 10;

/// Non-data objects that must never feed schema inference
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "**.json",
    "**.json.gz",
    "**.csv",
    "**.csv.gz",
    "**/_SUCCESS",
    "**.crc",
    "**/_metadata",
    "**/_common_metadata",
    "**/_temporary/**",
    "**.tmp",
];

/// Which folders a recrawl visits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecrawlBehavior {
    /// Only folders added since the last crawl
    #[default]
    IncrementalOnly,
    /// Every folder on every run
    CrawlEverything,
}

/// What happens in the catalog when an inferred schema changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateBehavior {
    #[default]
    LogOnly,
    UpdateInCatalog,
}

/// What happens in the catalog when crawled objects disappear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    #[default]
    LogOnly,
    DeleteFromCatalog,
    DeprecateInCatalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChangePolicy {
    pub update: UpdateBehavior,
    pub delete: DeleteBehavior,
}

impl SchemaChangePolicy {
    pub fn log_only() -> Self {
        Self::default()
    }

    pub fn is_log_only(&self) -> bool {
        self.update == UpdateBehavior::LogOnly && self.delete == DeleteBehavior::LogOnly
    }
}

/// Rejects schema change policies the recrawl behaviour cannot honour
pub fn check_recrawl_policy(
    recrawl: RecrawlBehavior,
    policy: &SchemaChangePolicy,
) -> DiscoveryResult<()> {
    if recrawl == RecrawlBehavior::IncrementalOnly && !policy.is_log_only() {
        return Err(DiscoveryError::config(
            "incremental_only recrawls require update and delete behaviour 'log_only'",
        ));
    }
    Ok(())
}

/// Table grouping passed to the crawler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingConfig {
    /// Segment depth at which tables begin (bucket excluded)
    pub table_level_depth: usize,
    pub policy: GroupingPolicy,
}

impl GroupingConfig {
    /// Crawler configuration document
    ///
    /// The crawl service counts the bucket as level one, so the rendered
    /// table level is one deeper than `table_level_depth`.
    pub fn to_configuration_json(&self) -> String {
        serde_json::json!({
            "Version": 1.0,
            "Grouping": {
                "TableGroupingPolicy": self.policy.as_str(),
                "TableLevelConfiguration": self.table_level_depth + 1,
            },
            "CrawlerOutput": {
                "Partitions": { "AddOrUpdateBehavior": "InheritFromTable" }
            }
        })
        .to_string()
    }
}

/// Inputs for a [`CrawlJobSpec`], checked by [`CrawlJobSpec::try_new`]
#[derive(Debug, Clone)]
pub struct CrawlJobDraft {
    pub name: String,
    pub namespace: String,
    pub chain: String,
    pub description: Option<String>,
    pub target_path: String,
    pub sample_size: u32,
    pub exclusion_patterns: Vec<String>,
    pub grouping: GroupingConfig,
    pub recrawl_behavior: RecrawlBehavior,
    pub schema_change_policy: SchemaChangePolicy,
    pub schedule: Option<ScheduleExpression>,
    pub partition_columns: Vec<String>,
    pub role: Option<String>,
}

/// Complete desired configuration of one crawl job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJobSpec {
    name: String,
    namespace: String,
    chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    target_path: String,
    sample_size: u32,
    exclusion_patterns: Vec<String>,
    grouping: GroupingConfig,
    recrawl_behavior: RecrawlBehavior,
    schema_change_policy: SchemaChangePolicy,
    schedule: Option<ScheduleExpression>,
    partition_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl CrawlJobSpec {
    /// Validate a draft into a spec
    pub fn try_new(draft: CrawlJobDraft) -> DiscoveryResult<Self> {
        check_recrawl_policy(draft.recrawl_behavior, &draft.schema_change_policy)?;
        if draft.sample_size == 0 {
            return Err(DiscoveryError::config("sample size must be positive"));
        }
        if draft.name.is_empty() || draft.namespace.is_empty() {
            return Err(DiscoveryError::config(
                "crawl jobs need a name and a namespace",
            ));
        }

        Ok(Self {
            name: draft.name,
            namespace: draft.namespace,
            chain: draft.chain,
            description: draft.description,
            target_path: draft.target_path,
            sample_size: draft.sample_size,
            exclusion_patterns: draft.exclusion_patterns,
            grouping: draft.grouping,
            recrawl_behavior: draft.recrawl_behavior,
            schema_change_policy: draft.schema_change_policy,
            schedule: draft.schedule,
            partition_columns: draft.partition_columns,
            role: draft.role,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Identity of the chain the job was built for
    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn exclusion_patterns(&self) -> &[String] {
        &self.exclusion_patterns
    }

    pub fn grouping(&self) -> &GroupingConfig {
        &self.grouping
    }

    pub fn recrawl_behavior(&self) -> RecrawlBehavior {
        self.recrawl_behavior
    }

    pub fn schema_change_policy(&self) -> SchemaChangePolicy {
        self.schema_change_policy
    }

    pub fn schedule(&self) -> Option<&ScheduleExpression> {
        self.schedule.as_ref()
    }

    pub fn partition_columns(&self) -> &[String] {
        &self.partition_columns
    }

    /// Service role the crawler runs as
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

/// Global crawler settings, validated once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerSettings {
    pub default_schedule: SymbolicSchedule,
    pub sample_size: u32,
    pub exclusions: Vec<String>,
    pub recrawl_behavior: RecrawlBehavior,
    pub schema_change_policy: SchemaChangePolicy,
    pub role: Option<String>,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            default_schedule: SymbolicSchedule::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            recrawl_behavior: RecrawlBehavior::default(),
            schema_change_policy: SchemaChangePolicy::log_only(),
            role: None,
        }
    }
}

/// Deterministic crawl job name for a table root
pub fn job_name(root: &TableRoot) -> String {
    format!("{}_{}_crawler", root.namespace, root.name)
}

/// Turns resolved table roots into crawl job specifications
///
/// Works from the table root and settings alone; it has no object store
/// handle, so the sample size can never depend on how many objects exist.
pub struct CrawlJobConfigBuilder<'a> {
    bucket: &'a str,
    settings: &'a CrawlerSettings,
}

impl<'a> CrawlJobConfigBuilder<'a> {
    pub fn new(bucket: &'a str, settings: &'a CrawlerSettings) -> Self {
        Self { bucket, settings }
    }

    /// Build the spec for one table root
    ///
    /// `schedule_override` replaces the global default schedule for the
    /// chain when set.
    pub fn build(
        &self,
        chain: &ChainDescriptor,
        root: &TableRoot,
        schedule_override: Option<SymbolicSchedule>,
    ) -> DiscoveryResult<CrawlJobSpec> {
        let schedule = schedule_override.unwrap_or(self.settings.default_schedule);

        CrawlJobSpec::try_new(CrawlJobDraft {
            name: job_name(root),
            namespace: root.namespace.clone(),
            chain: chain.identity(),
            description: chain.description.clone(),
            target_path: s3_uri(self.bucket, &root.path),
            sample_size: self.settings.sample_size,
            exclusion_patterns: self.settings.exclusions.clone(),
            grouping: GroupingConfig {
                table_level_depth: root.partition_depth,
                policy: root.grouping_policy,
            },
            recrawl_behavior: self.settings.recrawl_behavior,
            schema_change_policy: self.settings.schema_change_policy,
            schedule: schedule.expression(),
            partition_columns: root.partition_columns.clone(),
            role: self.settings.role.clone(),
        })
    }
}
