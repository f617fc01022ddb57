//! Chain descriptor model

use serde::{Deserialize, Serialize};

/// A discovered dataset namespace (one per source chain and dataset version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    /// Chain name (e.g. `btc`, `eth`, `ton`)
    pub name: String,
    /// Bucket-relative namespace root
    pub root_path: String,
    /// Human readable description, attached to the catalog namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Dataset version prefix the chain was found under (e.g. `v1.0`)
    pub dataset_version: String,
}

impl ChainDescriptor {
    /// Create a new descriptor without a description
    pub fn new(
        name: impl Into<String>,
        root_path: impl Into<String>,
        dataset_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
            description: None,
            dataset_version: dataset_version.into(),
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Stable identity used in reports (`v1.0/btc`)
    pub fn identity(&self) -> String {
        format!("{}/{}", self.dataset_version, self.name)
    }
}

impl std::fmt::Display for ChainDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.identity(), self.root_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let chain = ChainDescriptor::new("btc", "v1.0/btc", "v1.0");
        assert_eq!(chain.identity(), "v1.0/btc");
        assert!(chain.description.is_none());
    }

    #[test]
    fn test_serialize_camel_case() {
        let chain = ChainDescriptor::new("eth", "v1.0/eth", "v1.0").with_description("Ethereum");
        let json = serde_json::to_string(&chain).unwrap();
        assert!(json.contains("\"rootPath\":\"v1.0/eth\""));
        assert!(json.contains("\"datasetVersion\":\"v1.0\""));
        assert!(json.contains("Ethereum"));
    }
}
