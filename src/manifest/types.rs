use crate::cluster_config::EndpointPorts;
use crate::security::CertificateLookupError;
use crate::topology::Node;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("node {node} references unknown node type {node_type}")]
    UnknownNodeType { node: String, node_type: String },
    #[error("endpoint ports for node {0} overflow the port range")]
    PortOverflow(String),
    #[error("manifest versions are exhausted after {0}")]
    VersionExhausted(u64),
    #[error(transparent)]
    Lookup(#[from] CertificateLookupError),
    #[error("manifest serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ManifestError {
    pub fn code(&self) -> &'static str {
        match self {
            ManifestError::UnknownNodeType { .. } => "unknown-node-type",
            ManifestError::PortOverflow(_) => "port-overflow",
            ManifestError::VersionExhausted(_) => "version-exhausted",
            ManifestError::Lookup(_) => "certificate-lookup-failed",
            ManifestError::Serialization(_) => "manifest-serialization",
        }
    }
}

/// Node entry as it is sealed into a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestNode {
    pub name: String,
    pub ip_address: String,
    pub fault_domain: String,
    pub upgrade_domain: String,
    pub node_type: String,
    pub is_seed: bool,
    pub endpoints: EndpointPorts,
}

impl ManifestNode {
    pub fn from_node(node: &Node, endpoints: EndpointPorts) -> Self {
        Self {
            name: node.name.clone(),
            ip_address: node.ip_address.clone(),
            fault_domain: node.fault_domain.clone(),
            upgrade_domain: node.upgrade_domain.clone(),
            node_type: node.node_type.clone(),
            is_seed: node.is_seed,
            endpoints,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSection {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
}

impl SettingsSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, parameter: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(parameter.into(), value.to_string());
        self
    }

    pub fn get(&self, parameter: &str) -> Option<&str> {
        self.parameters.get(parameter).map(String::as_str)
    }
}

/// A sealed, versioned snapshot of topology and settings. Nodes are sorted by
/// name and sections by section name before the content hash is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub cluster_name: String,
    pub version: u64,
    pub config_version: String,
    pub admin_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_version: Option<String>,
    pub nodes: Vec<ManifestNode>,
    pub settings: Vec<SettingsSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl Manifest {
    pub(crate) fn seal(mut self) -> Result<Self, ManifestError> {
        self.nodes.sort_by(|a, b| a.name.cmp(&b.name));
        self.settings.sort_by(|a, b| a.name.cmp(&b.name));
        self.content_hash = None;
        let canonical = serde_json::to_vec(&self)?;
        self.content_hash = Some(hex::encode(Sha256::digest(&canonical)));
        Ok(self)
    }

    /// Hex SHA-256 over the manifest content, set when the manifest is sealed.
    pub fn digest(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn node(&self, name: &str) -> Option<&ManifestNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn seed_names(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter(|node| node.is_seed)
            .map(|node| node.name.clone())
            .collect()
    }

    pub fn seed_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_seed).count()
    }

    pub fn section(&self, name: &str) -> Option<&SettingsSection> {
        self.settings.iter().find(|section| section.name == name)
    }
}
