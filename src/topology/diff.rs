use super::node::{Node, Topology};
use crate::upgrade::ValidationError;
use std::collections::BTreeSet;

/// Node-level difference between a committed topology and a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyDiff {
    pub added: Vec<Node>,
    pub removed: Vec<Node>,
    /// Present in both topologies but disabled in the target.
    pub disabled: Vec<Node>,
}

impl TopologyDiff {
    pub fn between(current: &Topology, target: &Topology) -> Self {
        let added = added_nodes(current, target);
        let removed = current
            .nodes()
            .filter(|node| !target.contains(&node.name))
            .cloned()
            .collect();
        let disabled = target
            .nodes()
            .filter(|node| !node.enabled)
            .filter(|node| {
                current
                    .node(&node.name)
                    .map(|existing| existing.enabled)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Self {
            added,
            removed,
            disabled,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.disabled.is_empty()
    }

    /// Names that leave the set of enabled nodes, either removed or disabled.
    pub fn departing(&self) -> BTreeSet<String> {
        self.removed
            .iter()
            .chain(self.disabled.iter())
            .map(|node| node.name.clone())
            .collect()
    }
}

pub fn added_nodes(current: &Topology, target: &Topology) -> Vec<Node> {
    target
        .nodes()
        .filter(|node| !current.contains(&node.name))
        .cloned()
        .collect()
}

/// Nodes dropped from the target. Every drop must be listed in
/// `nodes_to_be_removed`, and every listed name must actually be dropped.
pub fn removed_nodes(
    current: &Topology,
    target: &Topology,
    nodes_to_be_removed: &[String],
) -> Result<Vec<Node>, ValidationError> {
    let listed: BTreeSet<&str> = nodes_to_be_removed
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    let mut removed = Vec::new();
    for node in current.nodes() {
        if target.contains(&node.name) {
            continue;
        }
        if !listed.contains(node.name.as_str()) {
            return Err(ValidationError::UnlistedNodeRemoval(node.name.clone()));
        }
        removed.push(node.clone());
    }
    for name in listed {
        if !removed.iter().any(|node| node.name == name) {
            return Err(ValidationError::UnknownNodeRemoval(name.to_string()));
        }
    }
    Ok(removed)
}
