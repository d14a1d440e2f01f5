use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A single logical node in the target topology.
///
/// `is_seed` is derived by the seed selector and sealed into manifests; it is
/// never authoritative on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub ip_address: String,
    pub fault_domain: String,
    pub upgrade_domain: String,
    pub node_type: String,
    #[serde(default)]
    pub is_seed: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        ip_address: impl Into<String>,
        fault_domain: impl Into<String>,
        upgrade_domain: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ip_address: ip_address.into(),
            fault_domain: fault_domain.into(),
            upgrade_domain: upgrade_domain.into(),
            node_type: node_type.into(),
            is_seed: false,
            enabled: true,
        }
    }

    pub fn as_seed(mut self) -> Self {
        self.is_seed = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn domain_pair(&self) -> DomainPair {
        DomainPair {
            fault_domain: self.fault_domain.clone(),
            upgrade_domain: self.upgrade_domain.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainPair {
    pub fault_domain: String,
    pub upgrade_domain: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("node {0} appears more than once in the topology")]
    DuplicateNode(String),
}

/// Node name -> node mapping plus the backing machine list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    nodes: BTreeMap<String, Node>,
    machines: Vec<String>,
}

impl Topology {
    /// Builds a topology whose machine list is the distinct node addresses.
    pub fn from_nodes<I>(nodes: I) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut map = BTreeMap::new();
        for node in nodes {
            let name = node.name.clone();
            if map.insert(name.clone(), node).is_some() {
                return Err(TopologyError::DuplicateNode(name));
            }
        }
        let machines = map
            .values()
            .map(|node| node.ip_address.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Ok(Self {
            nodes: map,
            machines,
        })
    }

    pub fn with_machines(mut self, machines: Vec<String>) -> Self {
        self.machines = machines;
        self
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn machines(&self) -> &[String] {
        &self.machines
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn enabled_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| node.enabled)
    }

    pub fn seed_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| node.is_seed)
    }

    /// Several logical nodes share a machine.
    pub fn is_scale_min(&self) -> bool {
        !self.machines.is_empty() && self.machines.len() < self.nodes.len()
    }

    pub fn fault_domain_count(&self) -> usize {
        self.enabled_nodes()
            .map(|node| node.fault_domain.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn upgrade_domain_count(&self) -> usize {
        self.enabled_nodes()
            .map(|node| node.upgrade_domain.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Returns a copy whose seed flags match `seeds` exactly.
    pub fn with_seed_flags(&self, seeds: &BTreeSet<String>) -> Self {
        let mut nodes = self.nodes.clone();
        for (name, node) in nodes.iter_mut() {
            node.is_seed = seeds.contains(name);
        }
        Self {
            nodes,
            machines: self.machines.clone(),
        }
    }
}
