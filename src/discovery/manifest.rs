//! Registry document loading
//!
//! The registry lists known chains explicitly, either as a bare sequence
//! of records or as a mapping with a `chains` key:
//!
//! ```yaml
//! chains:
//!   - name: btc
//!     path: v1.0/btc
//!     description: Bitcoin blocks and transactions
//!   - name: ton
//!     path: v1.1/ton
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DiscoverySourceError;
use crate::models::ChainDescriptor;
use crate::storage::{ObjectStore, join_key, normalize_prefix, segments};

static RE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v\d+(\.\d+)*$").expect("Invalid version regex"));

/// True for dataset version directory names (`v1`, `v1.0`, `v2.1.3`)
pub fn is_version_segment(segment: &str) -> bool {
    RE_VERSION.is_match(segment)
}

/// One chain entry of the registry document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub name: String,
    /// Namespace root, relative to the storage root
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Dataset version; taken from the path when omitted
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Bare(Vec<RegistryRecord>),
    Mapping { chains: Vec<RegistryRecord> },
}

/// A parsed registry document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDocument {
    /// Key the document was read from
    pub path: String,
    pub records: Vec<RegistryRecord>,
}

impl RegistryDocument {
    /// Parse document bytes; JSON for `.json` keys, YAML otherwise
    pub fn parse(path: &str, content: &[u8]) -> Result<Self, DiscoverySourceError> {
        let malformed = |reason: String| DiscoverySourceError::Malformed {
            path: path.to_string(),
            reason,
        };

        let raw: RawDocument = if path.to_lowercase().ends_with(".json") {
            serde_json::from_slice(content).map_err(|e| malformed(e.to_string()))?
        } else {
            serde_yaml::from_slice(content).map_err(|e| malformed(e.to_string()))?
        };

        let records = match raw {
            RawDocument::Bare(records) => records,
            RawDocument::Mapping { chains } => chains,
        };

        if records.is_empty() {
            return Err(malformed("document lists no chains".to_string()));
        }
        if let Some(record) = records
            .iter()
            .find(|r| r.name.trim().is_empty() || normalize_prefix(&r.path).is_empty())
        {
            return Err(malformed(format!(
                "record '{}' needs a non-empty name and path",
                record.name
            )));
        }

        Ok(Self {
            path: path.to_string(),
            records,
        })
    }

    /// Chain descriptors for every record, rooted under `root`
    pub fn descriptors(&self, root: &str, default_version: &str) -> Vec<ChainDescriptor> {
        let mut chains: Vec<ChainDescriptor> = self
            .records
            .iter()
            .map(|record| {
                let version = record
                    .version
                    .clone()
                    .or_else(|| {
                        segments(&record.path)
                            .next()
                            .filter(|s| is_version_segment(s))
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| default_version.to_string());

                let mut chain =
                    ChainDescriptor::new(&record.name, join_key(root, &record.path), version);
                chain.description = record.description.clone();
                chain
            })
            .collect();

        chains.sort_by(|a, b| {
            (&a.dataset_version, &a.name).cmp(&(&b.dataset_version, &b.name))
        });
        chains.dedup_by(|a, b| a.dataset_version == b.dataset_version && a.name == b.name);
        chains
    }
}

/// Reads the registry document from the object store
pub struct ManifestFetcher;

impl ManifestFetcher {
    /// Fetch and parse the document at `path`
    pub async fn fetch(
        store: &dyn ObjectStore,
        path: &str,
    ) -> Result<RegistryDocument, DiscoverySourceError> {
        let content = store
            .get_object(path)
            .await
            .map_err(|e| DiscoverySourceError::Read {
                path: path.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| DiscoverySourceError::Missing(path.to_string()))?;

        RegistryDocument::parse(path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_mapping() {
        let yaml = b"chains:\n  - name: btc\n    path: v1.0/btc\n    description: Bitcoin\n";
        let doc = RegistryDocument::parse("registry.yaml", yaml).unwrap();
        assert_eq!(doc.records.len(), 1);
        assert_eq!(doc.records[0].description.as_deref(), Some("Bitcoin"));
    }

    #[test]
    fn test_parse_json_bare_sequence() {
        let json = br#"[{"name": "eth", "path": "v1.0/eth"}, {"name": "ton", "path": "v1.1/ton"}]"#;
        let doc = RegistryDocument::parse("chains.json", json).unwrap();
        assert_eq!(doc.records.len(), 2);
    }

    #[test]
    fn test_parse_rejects_empty_fields() {
        let yaml = b"- name: btc\n  path: ''\n";
        let err = RegistryDocument::parse("registry.yaml", yaml).unwrap_err();
        assert!(matches!(err, DiscoverySourceError::Malformed { .. }));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = RegistryDocument::parse("registry.json", b"{not json").unwrap_err();
        assert!(matches!(err, DiscoverySourceError::Malformed { .. }));

        let err = RegistryDocument::parse("registry.yaml", b"chains: 3").unwrap_err();
        assert!(matches!(err, DiscoverySourceError::Malformed { .. }));
    }

    #[test]
    fn test_descriptor_versions() {
        let yaml = b"- name: ton\n  path: v1.1/ton\n- name: custom\n  path: datasets/custom\n- name: pinned\n  path: other/pinned\n  version: v2.0\n";
        let doc = RegistryDocument::parse("registry.yaml", yaml).unwrap();
        let chains = doc.descriptors("root", "v1.0");

        let find = |name: &str| chains.iter().find(|c| c.name == name).unwrap();
        assert_eq!(find("ton").dataset_version, "v1.1");
        assert_eq!(find("ton").root_path, "root/v1.1/ton");
        assert_eq!(find("custom").dataset_version, "v1.0");
        assert_eq!(find("pinned").dataset_version, "v2.0");
    }

    #[test]
    fn test_version_segment() {
        assert!(is_version_segment("v1"));
        assert!(is_version_segment("v1.0"));
        assert!(!is_version_segment("version1"));
        assert!(!is_version_segment("v1."));
    }
}
