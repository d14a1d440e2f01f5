use super::node::Topology;
use crate::cluster_config::UserConfig;
use crate::upgrade::ValidationError;
use std::collections::BTreeMap;
use std::net::IpAddr;

const MIN_DOMAINS_FOR_MULTI_NODE: usize = 3;

/// Static checks on a target topology against the config that owns it.
pub fn validate_topology(topology: &Topology, config: &UserConfig) -> Result<(), ValidationError> {
    for node in topology.nodes() {
        if !is_valid_node_name(&node.name) {
            return Err(ValidationError::InvalidNodeName(node.name.clone()));
        }
        if !is_valid_address(&node.ip_address) {
            return Err(ValidationError::MalformedAddress {
                node: node.name.clone(),
                address: node.ip_address.clone(),
            });
        }
        if config.node_type(&node.node_type).is_none() {
            return Err(ValidationError::UnknownNodeType {
                node: node.name.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }

    if topology.len() > 2 && !topology.is_scale_min() {
        let fault_domains = topology.fault_domain_count();
        if fault_domains < MIN_DOMAINS_FOR_MULTI_NODE {
            return Err(ValidationError::FaultDomainsTooFew(fault_domains));
        }
        let upgrade_domains = topology.upgrade_domain_count();
        if upgrade_domains < MIN_DOMAINS_FOR_MULTI_NODE {
            return Err(ValidationError::UpgradeDomainsTooFew(upgrade_domains));
        }
    }
    Ok(())
}

/// A node keeps its address and type for as long as it keeps its name, and an
/// address already in use cannot be re-registered under a new name.
pub fn verify_node_identities(current: &Topology, target: &Topology) -> Result<(), ValidationError> {
    for node in current.nodes() {
        if let Some(next) = target.node(&node.name) {
            if next.ip_address != node.ip_address || next.node_type != node.node_type {
                return Err(ValidationError::NodeIdentityChanged(node.name.clone()));
            }
        }
    }

    let mut by_address: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for node in current.nodes() {
        by_address
            .entry(node.ip_address.as_str())
            .or_default()
            .push((node.name.as_str(), node.node_type.as_str()));
    }
    for node in target.nodes() {
        if let Some(sharing) = by_address.get(node.ip_address.as_str()) {
            let name_known = sharing.iter().any(|(name, _)| *name == node.name);
            let type_known = sharing.iter().any(|(_, kind)| *kind == node.node_type);
            if !name_known || !type_known {
                return Err(ValidationError::NodeIdentityChanged(node.name.clone()));
            }
        }
    }
    Ok(())
}

pub fn is_valid_node_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}

pub fn is_valid_address(address: &str) -> bool {
    if address.parse::<IpAddr>().is_ok() {
        return true;
    }
    let host = address.strip_suffix('.').unwrap_or(address);
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    // All-numeric dotted names that failed IP parsing are malformed IPs.
    if host.chars().all(|ch| ch.is_ascii_digit() || ch == '.') {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
    })
}
