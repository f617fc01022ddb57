//! Engine configuration file support
//!
//! Handles parsing of `.chain-catalog.toml` configuration files,
//! environment variable overrides, and the one-time validation that turns
//! raw settings into a [`ValidatedConfig`].

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::crawler::{
    CrawlerSettings, DEFAULT_EXCLUSIONS, DEFAULT_SAMPLE_SIZE, DeleteBehavior, RecrawlBehavior,
    SchemaChangePolicy, UpdateBehavior, check_recrawl_policy,
};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::resolver::{
    DEFAULT_MAX_DEPTH, DEFAULT_RAW_FORMATS, DEFAULT_STRUCTURED_FORMATS,
    DEFAULT_SUBDIVISION_PATTERN, ResolverSettings,
};
use crate::schedule::SymbolicSchedule;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".chain-catalog.toml";

/// Default public dataset bucket
pub const DEFAULT_BUCKET: &str = "aws-public-blockchain";

/// Default bucket region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Dataset version whose namespaces carry no version suffix
pub const DEFAULT_VERSION: &str = "v1.0";

/// Default registry document key (relative to the storage root)
pub const DEFAULT_REGISTRY_PATH: &str = "registry.yaml";

/// Upper bound accepted by the crawl service for per-folder sampling
pub const MAX_SAMPLE_SIZE: i64 = 249;

/// Default per-namespace time bound
pub const DEFAULT_NAMESPACE_TIMEOUT_SECS: u64 = 300;

/// Default number of chains reconciled concurrently
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Environment variable for the bucket
pub const ENV_BUCKET: &str = "CHAIN_CATALOG_BUCKET";

/// Environment variable for the bucket region
pub const ENV_REGION: &str = "CHAIN_CATALOG_REGION";

/// Environment variable for the storage root prefix
pub const ENV_ROOT: &str = "CHAIN_CATALOG_ROOT";

/// Environment variable for the registry document path
pub const ENV_REGISTRY_PATH: &str = "CHAIN_CATALOG_REGISTRY_PATH";

/// Environment variable for the global schedule
pub const ENV_SCHEDULE: &str = "CHAIN_CATALOG_SCHEDULE";

/// Environment variable for the crawler sample size
pub const ENV_SAMPLE_SIZE: &str = "CHAIN_CATALOG_SAMPLE_SIZE";

/// Object store configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    /// Bucket holding the datasets
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Prefix under which version directories live (empty for bucket root)
    #[serde(default)]
    pub root: String,

    /// Bucket region
    #[serde(default = "default_region")]
    pub region: String,

    /// Send requester-pays headers on listing calls
    #[serde(default = "default_true")]
    pub requester_pays: bool,

    /// Version prefixes to scan; empty means every `v*` child of the root
    #[serde(default = "default_version_prefixes")]
    pub version_prefixes: Vec<String>,

    /// Version whose namespaces get no version suffix
    #[serde(default = "default_version")]
    pub default_version: String,
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_version_prefixes() -> Vec<String> {
    vec!["v1.0".to_string(), "v1.1".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            root: String::new(),
            region: default_region(),
            requester_pays: true,
            version_prefixes: default_version_prefixes(),
            default_version: default_version(),
        }
    }
}

/// Registry document configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Key of the registry document, relative to the storage root
    #[serde(default = "default_registry_path")]
    pub path: String,

    /// Look for a registry document at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_registry_path() -> String {
    DEFAULT_REGISTRY_PATH.to_string()
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            enabled: true,
        }
    }
}

/// Crawl job configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerSection {
    /// Global symbolic schedule (`hourly`, `daily`, `weekly`, `disabled`)
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Files sampled per leaf folder
    #[serde(default = "default_sample_size")]
    pub sample_size: i64,

    /// Replaces the default exclusion patterns when set
    #[serde(default)]
    pub exclusions: Option<Vec<String>>,

    #[serde(default)]
    pub recrawl: RecrawlBehavior,

    #[serde(default)]
    pub update_behavior: UpdateBehavior,

    #[serde(default)]
    pub delete_behavior: DeleteBehavior,

    /// Service role the crawl jobs run as
    #[serde(default)]
    pub role: Option<String>,

    /// Prefix for every catalog namespace name
    #[serde(default)]
    pub namespace_prefix: String,
}

fn default_schedule() -> String {
    SymbolicSchedule::default().to_string()
}

fn default_sample_size() -> i64 {
    i64::from(DEFAULT_SAMPLE_SIZE)
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            sample_size: default_sample_size(),
            exclusions: None,
            recrawl: RecrawlBehavior::default(),
            update_behavior: UpdateBehavior::default(),
            delete_behavior: DeleteBehavior::default(),
            role: None,
            namespace_prefix: String::new(),
        }
    }
}

/// Structural resolution configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverSection {
    /// Maximum directory depth searched below a namespace root
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Directory name markers of structured (columnar) subtrees
    #[serde(default = "default_structured_formats")]
    pub structured_formats: Vec<String>,

    /// Directory name markers of raw subtrees
    #[serde(default = "default_raw_formats")]
    pub raw_formats: Vec<String>,

    /// Regex matching network/environment sub-division directories
    #[serde(default = "default_subdivision_pattern")]
    pub subdivision_pattern: String,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_structured_formats() -> Vec<String> {
    DEFAULT_STRUCTURED_FORMATS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_raw_formats() -> Vec<String> {
    DEFAULT_RAW_FORMATS.iter().map(|s| s.to_string()).collect()
}

fn default_subdivision_pattern() -> String {
    DEFAULT_SUBDIVISION_PATTERN.to_string()
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            structured_formats: default_structured_formats(),
            raw_formats: default_raw_formats(),
            subdivision_pattern: default_subdivision_pattern(),
        }
    }
}

/// Run bounds configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    /// Time bound for reconciling one chain
    #[serde(default = "default_namespace_timeout_secs")]
    pub namespace_timeout_secs: u64,

    /// Chains reconciled at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_namespace_timeout_secs() -> u64 {
    DEFAULT_NAMESPACE_TIMEOUT_SECS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            namespace_timeout_secs: default_namespace_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Per-chain overrides (`[chains.<name>]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainOverride {
    #[serde(default)]
    pub schedule: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Main configuration structure
///
/// Represents the `.chain-catalog.toml` configuration file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub crawler: CrawlerSection,

    #[serde(default)]
    pub resolver: ResolverSection,

    #[serde(default)]
    pub run: RunSection,

    /// Overrides keyed by chain name
    #[serde(default)]
    pub chains: BTreeMap<String, ChainOverride>,
}

impl EngineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a specific bucket, defaults elsewhere
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            storage: StorageSection {
                bucket: bucket.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.chain-catalog.toml` in the directory.
    /// Falls back to defaults if not found.
    pub fn load(dir: &Path) -> DiscoveryResult<Self> {
        Self::load_file(&dir.join(CONFIG_FILENAME))
    }

    /// Load configuration from an explicit file path
    pub fn load_file(config_path: &Path) -> DiscoveryResult<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path).map_err(|e| {
                DiscoveryError::config(format!(
                    "Failed to read config '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> DiscoveryResult<Self> {
        toml::from_str(content)
            .map_err(|e| DiscoveryError::config(format!("Failed to parse config: {}", e)))
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> DiscoveryResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DiscoveryError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment variable overrides
    ///
    /// A value that cannot be parsed is a configuration error.
    pub fn apply_env_overrides(&mut self) -> DiscoveryResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> DiscoveryResult<()> {
        if let Some(bucket) = lookup(ENV_BUCKET) {
            self.storage.bucket = bucket;
        }

        if let Some(region) = lookup(ENV_REGION) {
            self.storage.region = region;
        }

        if let Some(root) = lookup(ENV_ROOT) {
            self.storage.root = root;
        }

        if let Some(path) = lookup(ENV_REGISTRY_PATH) {
            self.registry.path = path;
        }

        // Validated later, so an unknown name still fails the run
        if let Some(schedule) = lookup(ENV_SCHEDULE) {
            self.crawler.schedule = schedule;
        }

        if let Some(size) = lookup(ENV_SAMPLE_SIZE) {
            self.crawler.sample_size = size.trim().parse().map_err(|_| {
                DiscoveryError::config(format!(
                    "{} must be a whole number, got '{}'",
                    ENV_SAMPLE_SIZE, size
                ))
            })?;
        }

        Ok(())
    }

    /// Validate every setting once, before any external call
    pub fn validate(&self) -> DiscoveryResult<ValidatedConfig> {
        if self.storage.bucket.trim().is_empty() {
            return Err(DiscoveryError::config("storage.bucket must not be empty"));
        }

        let default_schedule: SymbolicSchedule = self.crawler.schedule.parse()?;

        if !(1..=MAX_SAMPLE_SIZE).contains(&self.crawler.sample_size) {
            return Err(DiscoveryError::config(format!(
                "crawler.sample_size must be between 1 and {}, got {}",
                MAX_SAMPLE_SIZE, self.crawler.sample_size
            )));
        }
        // Range checked above.
        let sample_size = self.crawler.sample_size as u32;

        let schema_change_policy = SchemaChangePolicy {
            update: self.crawler.update_behavior,
            delete: self.crawler.delete_behavior,
        };
        check_recrawl_policy(self.crawler.recrawl, &schema_change_policy)?;

        if self.resolver.max_depth == 0 {
            return Err(DiscoveryError::config("resolver.max_depth must be at least 1"));
        }
        if self.run.namespace_timeout_secs == 0 {
            return Err(DiscoveryError::config(
                "run.namespace_timeout_secs must be at least 1",
            ));
        }
        if self.run.max_concurrency == 0 {
            return Err(DiscoveryError::config("run.max_concurrency must be at least 1"));
        }

        let subdivision_pattern = Regex::new(&self.resolver.subdivision_pattern).map_err(|e| {
            DiscoveryError::config(format!("Invalid resolver.subdivision_pattern: {}", e))
        })?;

        let mut chains = BTreeMap::new();
        for (name, chain) in &self.chains {
            let schedule = match &chain.schedule {
                Some(schedule) => Some(schedule.parse::<SymbolicSchedule>().map_err(|e| {
                    DiscoveryError::config(format!("chains.{}: {}", name, e))
                })?),
                None => None,
            };
            chains.insert(
                name.clone(),
                ValidatedChain {
                    schedule,
                    description: chain.description.clone(),
                },
            );
        }

        let registry_path = if self.registry.enabled && !self.registry.path.trim().is_empty() {
            Some(self.registry.path.clone())
        } else {
            None
        };

        Ok(ValidatedConfig {
            storage: self.storage.clone(),
            registry_path,
            crawler: CrawlerSettings {
                default_schedule,
                sample_size,
                exclusions: self.crawler.exclusions.clone().unwrap_or_else(|| {
                    DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect()
                }),
                recrawl_behavior: self.crawler.recrawl,
                schema_change_policy,
                role: self.crawler.role.clone(),
            },
            resolver: ResolverSettings {
                max_depth: self.resolver.max_depth,
                structured_formats: lowercase_all(&self.resolver.structured_formats),
                raw_formats: lowercase_all(&self.resolver.raw_formats),
                subdivision_pattern,
                namespace_prefix: self.crawler.namespace_prefix.clone(),
                default_version: self.storage.default_version.clone(),
            },
            namespace_timeout: Duration::from_secs(self.run.namespace_timeout_secs),
            max_concurrency: self.run.max_concurrency,
            chains,
        })
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Per-chain overrides after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedChain {
    pub schedule: Option<SymbolicSchedule>,
    pub description: Option<String>,
}

/// Configuration that passed [`EngineConfig::validate`]
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub storage: StorageSection,
    /// `None` when registry lookup is disabled
    pub registry_path: Option<String>,
    pub crawler: CrawlerSettings,
    pub resolver: ResolverSettings,
    pub namespace_timeout: Duration,
    pub max_concurrency: usize,
    pub chains: BTreeMap<String, ValidatedChain>,
}

impl ValidatedConfig {
    /// Schedule override for a chain, if one is configured
    pub fn schedule_for(&self, chain: &str) -> Option<SymbolicSchedule> {
        self.chains.get(chain).and_then(|c| c.schedule)
    }

    /// Description override for a chain, if one is configured
    pub fn description_for(&self, chain: &str) -> Option<&str> {
        self.chains
            .get(chain)
            .and_then(|c| c.description.as_deref())
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Chain catalog configuration

[storage]
bucket = "aws-public-blockchain"
# Prefix holding the version directories (empty for the bucket root)
root = ""
region = "us-east-1"
requester_pays = true
# Leave empty to scan every v* directory under the root
version_prefixes = ["v1.0", "v1.1"]
default_version = "v1.0"

[registry]
# Registry document, relative to the storage root (.yaml or .json)
path = "registry.yaml"
enabled = true

[crawler]
# hourly, daily, weekly or disabled
schedule = "daily"
# Files sampled per leaf folder (1-249)
sample_size = 10
# incremental_only (requires log_only behaviours) or crawl_everything
recrawl = "incremental_only"
update_behavior = "log_only"
delete_behavior = "log_only"
# role = "arn:aws:iam::123456789012:role/chain-catalog-crawler"
namespace_prefix = ""

[resolver]
max_depth = 8

[run]
namespace_timeout_secs = 300
max_concurrency = 8

# Per-chain overrides
# [chains.btc]
# schedule = "hourly"
# description = "Bitcoin blocks and transactions"
"#
}
