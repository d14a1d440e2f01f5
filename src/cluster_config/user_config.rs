use super::reliability::ReliabilityLevel;
use super::security::SecurityDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Endpoint ports a node of a given type listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointPorts {
    pub client_connection: u16,
    pub cluster_connection: u16,
    pub lease_driver: u16,
    pub service_connection: u16,
    pub http_gateway: u16,
}

impl Default for EndpointPorts {
    fn default() -> Self {
        Self {
            client_connection: 19000,
            cluster_connection: 19001,
            lease_driver: 19002,
            service_connection: 19006,
            http_gateway: 19080,
        }
    }
}

impl EndpointPorts {
    /// Shifts every port by `offset`, saturating at the top of the port range.
    pub fn offset(self, offset: u16) -> Self {
        Self {
            client_connection: self.client_connection.saturating_add(offset),
            cluster_connection: self.cluster_connection.saturating_add(offset),
            lease_driver: self.lease_driver.saturating_add(offset),
            service_connection: self.service_connection.saturating_add(offset),
            http_gateway: self.http_gateway.saturating_add(offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeType {
    pub name: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub endpoints: EndpointPorts,
}

impl NodeType {
    pub fn primary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_primary: true,
            endpoints: EndpointPorts::default(),
        }
    }

    pub fn secondary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_primary: false,
            endpoints: EndpointPorts::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddonFeature {
    RepairManager,
    DnsService,
    BackupRestoreService,
    ResourceMonitorService,
}

impl fmt::Display for AddonFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddonFeature::RepairManager => "RepairManager",
            AddonFeature::DnsService => "DnsService",
            AddonFeature::BackupRestoreService => "BackupRestoreService",
            AddonFeature::ResourceMonitorService => "ResourceMonitorService",
        };
        f.write_str(name)
    }
}

/// Operator-facing cluster description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub cluster_name: String,
    pub config_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_version: Option<String>,
    #[serde(default)]
    pub reliability_level: ReliabilityLevel,
    pub node_types: Vec<NodeType>,
    #[serde(default)]
    pub security: SecurityDescriptor,
    #[serde(default)]
    pub addon_features: BTreeSet<AddonFeature>,
    /// Names the operator explicitly asks to drop from the topology.
    #[serde(default)]
    pub nodes_to_be_removed: Vec<String>,
}

impl UserConfig {
    pub fn new(cluster_name: impl Into<String>, config_version: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            config_version: config_version.into(),
            code_version: None,
            reliability_level: ReliabilityLevel::None,
            node_types: Vec::new(),
            security: SecurityDescriptor::default(),
            addon_features: BTreeSet::new(),
            nodes_to_be_removed: Vec::new(),
        }
    }

    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.node_types.iter().find(|node_type| node_type.name == name)
    }

    pub fn primary_node_types(&self) -> impl Iterator<Item = &NodeType> {
        self.node_types.iter().filter(|node_type| node_type.is_primary)
    }

    pub fn is_primary_type(&self, name: &str) -> bool {
        self.node_type(name)
            .map(|node_type| node_type.is_primary)
            .unwrap_or(false)
    }
}

/// Administrator-owned settings layered over the generated manifest settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    pub version: String,
    /// section name -> parameter name -> value
    #[serde(default)]
    pub fabric_settings: BTreeMap<String, BTreeMap<String, String>>,
}

impl AdminConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            fabric_settings: BTreeMap::new(),
        }
    }

    pub fn with_setting(
        mut self,
        section: impl Into<String>,
        parameter: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.fabric_settings
            .entry(section.into())
            .or_default()
            .insert(parameter.into(), value.into());
        self
    }
}
