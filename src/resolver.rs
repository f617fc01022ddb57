//! Structural resolution of namespace roots into table roots
//!
//! Works on delimited listings only and never reads object contents.
//! Resolution runs in four steps:
//!
//! 1. If the namespace root holds a structured-format subtree next to a
//!    raw-format sibling, only the structured subtree is kept. The raw
//!    sibling is never listed.
//! 2. Children of the kept subtree that name a network or environment
//!    (`mainnet`, `testnet`, ...) become separate catalog namespaces
//!    (`{chain}_{subdivision}`). Plain directories beside them stay under
//!    the chain's own namespace and are reported as unassigned.
//! 3. Inside each group, directories whose children are `key=value`
//!    prefixes are table roots. When plain directories reappear below a
//!    `key=value` run (`version=2/blocks/date=...`), the search continues
//!    so the table root is the deepest point at which partitioning begins.
//!    The run is followed along its greatest value, compared numerically
//!    when the values are numbers (`version=10` beats `version=9`).
//! 4. Partition keys are read from the `key=value` segment names.
//!
//! A group with no `key=value` level anywhere is its own (unpartitioned)
//! table root. If the search stopped at the depth limit with directories
//! left unexplored, the result is flagged as ambiguous.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{ChainDescriptor, TableRoot};
use crate::storage::{
    Listing, ObjectStore, last_segment, list_all, normalize_prefix, segments,
};

/// Default depth limit below a namespace root
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Default structured (columnar) format markers
pub const DEFAULT_STRUCTURED_FORMATS: &[&str] = &["parquet", "orc", "avro", "delta", "iceberg"];

/// Default raw format markers
pub const DEFAULT_RAW_FORMATS: &[&str] = &["json", "jsonl", "ndjson", "csv", "raw", "txt"];

/// Default network/environment sub-division pattern
pub const DEFAULT_SUBDIVISION_PATTERN: &str =
    r"(?i)^([a-z0-9]+[-_])?(mainnet|testnet|devnet|signet|regtest|prod|production|staging)$|^[a-z0-9]+[-_]net$";

static RE_PARTITION_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_\-]*)=(.*)$").expect("Invalid partition regex")
});

const COMPRESSION_SUFFIXES: &[&str] = &["gz", "snappy", "zst", "bz2", "lz4", "zstd"];

static RE_NAME_INVALID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]+").expect("Invalid name regex"));

/// Resolver settings, validated once per run
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub max_depth: usize,
    pub structured_formats: Vec<String>,
    pub raw_formats: Vec<String>,
    pub subdivision_pattern: Regex,
    /// Prepended to every catalog namespace name
    pub namespace_prefix: String,
    /// Chains under this version get no version suffix in their namespace
    pub default_version: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            structured_formats: DEFAULT_STRUCTURED_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            raw_formats: DEFAULT_RAW_FORMATS.iter().map(|s| s.to_string()).collect(),
            subdivision_pattern: Regex::new(DEFAULT_SUBDIVISION_PATTERN)
                .expect("Invalid subdivision regex"),
            namespace_prefix: String::new(),
            default_version: crate::config::DEFAULT_VERSION.to_string(),
        }
    }
}

/// Outcome of resolving one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub table_roots: Vec<TableRoot>,
    /// Raw-format sibling subtrees that were dropped
    pub excluded: Vec<String>,
    /// Groups whose search stopped at the depth limit
    pub ambiguous: Vec<String>,
    /// Plain directories found beside network subdivisions
    pub unassigned: Vec<String>,
}

impl Resolution {
    /// Distinct catalog namespaces, in first-seen order
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for root in &self.table_roots {
            if !names.contains(&root.namespace.as_str()) {
                names.push(&root.namespace);
            }
        }
        names
    }
}

/// Split a `key=value` segment
pub fn partition_key(segment: &str) -> Option<&str> {
    RE_PARTITION_SEGMENT
        .captures(segment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// True when `name` is `marker` or has it as a `-`, `_` or `.` separated token
fn name_has_marker(name: &str, marker: &str) -> bool {
    let name = name.to_lowercase();
    name == marker || name.split(['-', '_', '.']).any(|t| t == marker)
}

fn is_partition_prefix(prefix: &str) -> bool {
    partition_key(last_segment(prefix)).is_some()
}

/// Lowercase, replace anything outside `[a-z0-9_]` with `_`
pub fn sanitize_name(name: &str) -> String {
    RE_NAME_INVALID
        .replace_all(&name.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// Deterministic catalog namespace name for a chain (and sub-division)
pub fn namespace_name(
    settings: &ResolverSettings,
    chain: &ChainDescriptor,
    subdivision: Option<&str>,
) -> String {
    let mut name = format!("{}{}", settings.namespace_prefix, chain.name);
    if let Some(subdivision) = subdivision {
        name.push('_');
        name.push_str(subdivision);
    }
    if chain.dataset_version != settings.default_version {
        name.push('_');
        name.push_str(&chain.dataset_version);
    }
    sanitize_name(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Structured,
    Raw,
    Unknown,
}

/// Where a `key=value` run led
enum PartitionWalk {
    /// Objects (or nothing) below the run: a table root
    Leaf(Vec<String>),
    /// Plain directories below the run: keep searching from here
    Resumes { at: String, listing: Listing },
    /// Depth limit reached inside the run
    Truncated(Vec<String>),
}

struct Group {
    subdivision: Option<String>,
    base: String,
    listing: Listing,
    /// Sits beside subdivisions under the chain's own namespace
    unassigned: bool,
}

/// Resolves namespace roots into table roots
pub struct PathResolver<'a> {
    store: &'a dyn ObjectStore,
    settings: &'a ResolverSettings,
}

impl<'a> PathResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, settings: &'a ResolverSettings) -> Self {
        Self { store, settings }
    }

    /// Resolve every table root under a chain's namespace root
    pub async fn resolve(&self, chain: &ChainDescriptor) -> DiscoveryResult<Resolution> {
        let root = normalize_prefix(&chain.root_path);
        let listing = self.list(chain, &root).await?;
        if listing.is_empty() {
            return Err(DiscoveryError::structural(
                chain.identity(),
                format!("namespace root '{}' holds no objects", root),
            ));
        }

        let (selected, selected_listing, excluded) =
            self.select_structured(chain, &root, listing).await?;

        let mut resolution = Resolution {
            table_roots: Vec::new(),
            excluded,
            ambiguous: Vec::new(),
            unassigned: Vec::new(),
        };
        let mut names: HashMap<String, Vec<String>> = HashMap::new();

        for group in self.split_subdivisions(&selected, selected_listing) {
            let namespace = namespace_name(self.settings, chain, group.subdivision.as_deref());
            let (found, truncated) = self
                .find_partition_roots(chain, &group.base, group.listing)
                .await?;

            if truncated {
                tracing::warn!(
                    chain = %chain.identity(),
                    "Search under '{}' stopped at depth {}; partitioning may be deeper",
                    group.base,
                    self.settings.max_depth
                );
                resolution.ambiguous.push(group.base.clone());
            }
            if group.unassigned {
                tracing::warn!(
                    chain = %chain.identity(),
                    "'{}' sits beside network subdivisions; cataloging it under '{}'",
                    group.base,
                    namespace
                );
                resolution.unassigned.push(group.base.clone());
            }
            let taken = names.entry(namespace.clone()).or_default();
            // Unassigned groups share a namespace with each other.
            let name_base = if group.unassigned { &selected } else { &group.base };

            if found.is_empty() {
                // No key=value level: the group base is the table root.
                let mut name = sanitize_name(last_segment(&group.base));
                if taken.contains(&name) {
                    name = table_name(name_base, &group.base);
                }
                taken.push(name.clone());
                let mut table = TableRoot::new(&namespace, name, &group.base, Vec::new());
                table.subdivision = group.subdivision.clone();
                resolution.table_roots.push(table);
                continue;
            }

            for (path, columns) in found {
                let mut name = sanitize_name(last_segment(&path));
                if taken.contains(&name) {
                    name = table_name(name_base, &path);
                }
                taken.push(name.clone());

                let mut table = TableRoot::new(&namespace, name, &path, columns);
                table.subdivision = group.subdivision.clone();
                resolution.table_roots.push(table);
            }
        }

        tracing::debug!(
            chain = %chain.identity(),
            "Resolved {} table root(s), excluded {:?}",
            resolution.table_roots.len(),
            resolution.excluded
        );

        Ok(resolution)
    }

    async fn list(&self, chain: &ChainDescriptor, prefix: &str) -> DiscoveryResult<Listing> {
        list_all(self.store, prefix)
            .await
            .map_err(|e| DiscoveryError::structural(chain.identity(), e.to_string()))
    }

    fn classify(&self, name: &str) -> Format {
        let has_marker =
            |formats: &[String]| formats.iter().any(|f| name_has_marker(name, f));

        if has_marker(&self.settings.structured_formats) {
            Format::Structured
        } else if has_marker(&self.settings.raw_formats) {
            Format::Raw
        } else {
            Format::Unknown
        }
    }

    /// Classify an object key by its extension, ignoring compression suffixes
    fn classify_key(&self, key: &str) -> Format {
        let name = last_segment(key).to_lowercase();
        let mut stem = name.as_str();
        while let Some((rest, ext)) = stem.rsplit_once('.') {
            if COMPRESSION_SUFFIXES.contains(&ext) {
                stem = rest;
                continue;
            }
            return self.classify(ext);
        }
        Format::Unknown
    }

    /// Follow the first child at each level until objects show a format
    async fn probe_format(&self, chain: &ChainDescriptor, prefix: &str) -> DiscoveryResult<Format> {
        let mut current = prefix.to_string();
        for _ in 0..=self.settings.max_depth {
            let listing = self.list(chain, &current).await?;
            if let Some(format) = listing
                .objects
                .iter()
                .map(|o| self.classify_key(&o.key))
                .find(|f| *f != Format::Unknown)
            {
                return Ok(format);
            }
            match listing.prefixes.first() {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        Ok(Format::Unknown)
    }

    /// Step 1: keep only the structured subtree when raw siblings exist
    async fn select_structured(
        &self,
        chain: &ChainDescriptor,
        root: &str,
        listing: Listing,
    ) -> DiscoveryResult<(String, Listing, Vec<String>)> {
        let mut classified: Vec<(String, Format)> = listing
            .prefixes
            .iter()
            .map(|p| (p.clone(), self.classify(last_segment(p))))
            .collect();

        let has = |classified: &[(String, Format)], format: Format| {
            classified.iter().any(|(_, f)| *f == format)
        };

        // Names only settle it when both kinds are present; otherwise look
        // at object keys under the siblings whose names say nothing.
        let indicative = has(&classified, Format::Structured) || has(&classified, Format::Raw);
        let settled = has(&classified, Format::Structured) && has(&classified, Format::Raw);
        if classified.len() >= 2 && indicative && !settled {
            for (prefix, format) in classified.iter_mut() {
                if *format == Format::Unknown {
                    *format = self.probe_format(chain, prefix).await?;
                }
            }
        }

        if !has(&classified, Format::Raw) {
            return Ok((root.to_string(), listing, Vec::new()));
        }

        // Earlier entries in the structured list win when several exist.
        let preferred = self.settings.structured_formats.iter().find_map(|marker| {
            classified.iter().find(|(p, f)| {
                *f == Format::Structured && name_has_marker(last_segment(p), marker)
            })
        });
        let Some((selected, _)) = preferred
            .or_else(|| classified.iter().find(|(_, f)| *f == Format::Structured))
            .cloned()
        else {
            return Ok((root.to_string(), listing, Vec::new()));
        };

        let excluded: Vec<String> = classified
            .into_iter()
            .filter(|(_, f)| *f == Format::Raw)
            .map(|(p, _)| p)
            .collect();

        tracing::info!(
            chain = %chain.identity(),
            "Using structured subtree '{}', excluding {:?}",
            selected,
            excluded
        );

        let selected_listing = self.list(chain, &selected).await?;
        Ok((selected, selected_listing, excluded))
    }

    /// Step 2: split the selected subtree into network/environment groups
    ///
    /// Plain directories and `key=value` prefixes beside the subdivisions
    /// become extra groups under the chain's own namespace.
    fn split_subdivisions(&self, selected: &str, listing: Listing) -> Vec<Group> {
        let (partitions, plain): (Vec<&String>, Vec<&String>) =
            listing.prefixes.iter().partition(|p| is_partition_prefix(p));
        let (subdivisions, others): (Vec<&String>, Vec<&String>) = plain
            .into_iter()
            .partition(|p| self.settings.subdivision_pattern.is_match(last_segment(p)));

        if subdivisions.is_empty() {
            return vec![Group {
                subdivision: None,
                base: selected.to_string(),
                listing,
                unassigned: false,
            }];
        }

        let mut groups: Vec<Group> = subdivisions
            .into_iter()
            .map(|p| Group {
                subdivision: Some(last_segment(p).to_string()),
                base: p.clone(),
                listing: Listing::default(),
                unassigned: false,
            })
            .collect();

        if !partitions.is_empty() {
            groups.push(Group {
                subdivision: None,
                base: selected.to_string(),
                listing: Listing {
                    prefixes: partitions.into_iter().cloned().collect(),
                    objects: Vec::new(),
                },
                unassigned: true,
            });
        }
        groups.extend(others.into_iter().map(|p| Group {
            subdivision: None,
            base: p.clone(),
            listing: Listing::default(),
            unassigned: true,
        }));

        groups
    }

    /// Step 3: breadth-first search for directories that hold partitions
    ///
    /// Returns the table roots with their partition keys, and whether the
    /// depth limit cut the search short.
    async fn find_partition_roots(
        &self,
        chain: &ChainDescriptor,
        base: &str,
        base_listing: Listing,
    ) -> DiscoveryResult<(Vec<(String, Vec<String>)>, bool)> {
        let base_listing = if base_listing.is_empty() {
            self.list(chain, base).await?
        } else {
            base_listing
        };

        let mut found = Vec::new();
        let mut truncated = false;
        let mut queue = VecDeque::from([(base.to_string(), base_listing, 0usize)]);

        while let Some((dir, listing, depth)) = queue.pop_front() {
            let (partitions, plain): (Vec<&String>, Vec<&String>) = listing
                .prefixes
                .iter()
                .partition(|p| is_partition_prefix(p));

            if !partitions.is_empty() {
                match self.follow_partitions(chain, &partitions, depth).await? {
                    (PartitionWalk::Leaf(columns), _) => found.push((dir, columns)),
                    (PartitionWalk::Truncated(columns), _) => {
                        truncated = true;
                        found.push((dir, columns));
                    }
                    (PartitionWalk::Resumes { at, listing }, at_depth) => {
                        queue.push_back((at, listing, at_depth));
                    }
                }
                continue;
            }

            if depth >= self.settings.max_depth {
                truncated |= !plain.is_empty();
                continue;
            }

            for prefix in plain {
                let child = self.list(chain, prefix).await?;
                queue.push_back((prefix.clone(), child, depth + 1));
            }
        }

        Ok((found, truncated))
    }

    /// Walk down a `key=value` run along the greatest value at each level
    async fn follow_partitions(
        &self,
        chain: &ChainDescriptor,
        partitions: &[&String],
        depth: usize,
    ) -> DiscoveryResult<(PartitionWalk, usize)> {
        let mut columns: Vec<String> = Vec::new();
        let mut current = greatest(partitions);
        let mut depth = depth + 1;

        loop {
            if let Some(key) = partition_key(last_segment(&current))
                && !columns.iter().any(|c| c == key)
            {
                columns.push(key.to_string());
            }

            if depth > self.settings.max_depth {
                return Ok((PartitionWalk::Truncated(columns), depth));
            }

            let listing = self.list(chain, &current).await?;
            let (nested, plain): (Vec<&String>, Vec<&String>) = listing
                .prefixes
                .iter()
                .partition(|p| is_partition_prefix(p));

            if !nested.is_empty() {
                current = greatest(&nested);
                depth += 1;
                continue;
            }

            if !plain.is_empty() {
                tracing::debug!(
                    chain = %chain.identity(),
                    "Partitioning resumes below '{}'; treating it as a versioned root",
                    current
                );
                return Ok((
                    PartitionWalk::Resumes {
                        at: current,
                        listing,
                    },
                    depth,
                ));
            }

            return Ok((PartitionWalk::Leaf(columns), depth));
        }
    }
}

/// Prefix with the greatest `key=value` value
fn greatest(prefixes: &[&String]) -> String {
    prefixes
        .iter()
        .max_by(|a, b| compare_partition_values(partition_value(a), partition_value(b)))
        .map(|p| (*p).clone())
        .unwrap_or_default()
}

fn partition_value(prefix: &str) -> &str {
    let segment = last_segment(prefix);
    segment.split_once('=').map_or(segment, |(_, value)| value)
}

/// Numeric segment order when both values are dotted numbers (`10`, `1.10`),
/// plain string order otherwise
fn compare_partition_values(a: &str, b: &str) -> Ordering {
    let numeric = |value: &str| -> Option<Vec<u64>> {
        value
            .trim_start_matches(['v', 'V'])
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    };
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Table name from the whole path below the group base (`traces_v2_blocks`)
///
/// Used when the last segment alone collides with an earlier table.
fn table_name(base: &str, path: &str) -> String {
    let base_depth = segments(base).count();
    let relative: Vec<&str> = segments(path).skip(base_depth).collect();
    let name = if relative.is_empty() {
        last_segment(path).to_string()
    } else {
        relative.join("_")
    };
    sanitize_name(&name)
}
