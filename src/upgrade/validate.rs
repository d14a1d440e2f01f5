//! Checks that a target configuration is an acceptable successor of the
//! committed one. Every check here runs before classification.

use super::cluster::ClusterSnapshot;
use super::errors::ValidationError;
use crate::cluster_config::{AddonFeature, UserConfig};
use crate::topology::{removed_nodes, verify_node_identities, TopologyDiff};
use log::warn;

pub fn validate_config_update(
    current: &ClusterSnapshot,
    target: &ClusterSnapshot,
) -> Result<(), ValidationError> {
    let result = check(current, target);
    if let Err(err) = &result {
        warn!(
            "event=config_update_rejected cluster={} code={} reason=\"{}\"",
            current.user.cluster_name,
            err.code(),
            err
        );
    }
    result
}

fn check(current: &ClusterSnapshot, target: &ClusterSnapshot) -> Result<(), ValidationError> {
    if current.user.cluster_name != target.user.cluster_name {
        return Err(ValidationError::ClusterNameChanged {
            current: current.user.cluster_name.clone(),
            target: target.user.cluster_name.clone(),
        });
    }
    if current.user.config_version == target.user.config_version {
        return Err(ValidationError::IdenticalConfigVersion(
            target.user.config_version.clone(),
        ));
    }
    check_node_types(&current.user, &target.user)?;

    match (
        current.user.security.is_certificate_secured(),
        target.user.security.is_certificate_secured(),
    ) {
        (false, true) => return Err(ValidationError::AuthenticationModeChange("added")),
        (true, false) => return Err(ValidationError::AuthenticationModeChange("removed")),
        _ => {}
    }

    if current.user.addon_features.contains(&AddonFeature::RepairManager)
        && !target.user.addon_features.contains(&AddonFeature::RepairManager)
    {
        return Err(ValidationError::RemoveRepairManagerUnsupported);
    }

    verify_node_identities(&current.topology, &target.topology)?;
    let removed = removed_nodes(
        &current.topology,
        &target.topology,
        &target.user.nodes_to_be_removed,
    )?;
    if !removed.is_empty() && current.topology.is_scale_min() {
        return Err(ValidationError::ScaleMinRemoveNode);
    }

    if current.user.reliability_level != target.user.reliability_level {
        let diff = TopologyDiff::between(&current.topology, &target.topology);
        let departing = diff.departing();
        if let Some(node) = current
            .topology
            .nodes()
            .find(|node| departing.contains(&node.name) && !node.is_seed)
        {
            return Err(ValidationError::RemoveNonSeedWithReliabilityChange(
                node.name.clone(),
            ));
        }
    }
    Ok(())
}

fn check_node_types(current: &UserConfig, target: &UserConfig) -> Result<(), ValidationError> {
    for node_type in current.primary_node_types() {
        if !target.is_primary_type(&node_type.name) {
            return Err(ValidationError::PrimaryNodeTypeModified(
                node_type.name.clone(),
            ));
        }
    }
    for node_type in &current.node_types {
        let Some(next) = target.node_type(&node_type.name) else {
            continue;
        };
        if next.endpoints.client_connection != node_type.endpoints.client_connection {
            return Err(ValidationError::EndpointUpdateNotAllowed {
                node_type: node_type.name.clone(),
                endpoint: "client-connection",
            });
        }
        if next.endpoints.http_gateway != node_type.endpoints.http_gateway {
            return Err(ValidationError::EndpointUpdateNotAllowed {
                node_type: node_type.name.clone(),
                endpoint: "http-gateway",
            });
        }
    }
    Ok(())
}
