//! Seed selection for a target and classification of the requested change.

use super::cluster::ClusterSnapshot;
use super::errors::ValidationError;
use super::state::UpgradePlan;
use crate::cluster_config::{normalize_identity, IdentityKind, SecurityDescriptor};
use crate::selection::{SeedDelta, SeedNodeSelector, SelectionError};
use crate::topology::{added_nodes, Node, Topology, TopologyDiff};
use std::collections::{BTreeMap, BTreeSet};

type IdentityFingerprint = (IdentityKind, String, BTreeMap<String, BTreeSet<String>>);

/// Runs the seed selector over the target's enabled primary nodes, starting
/// from the committed seed set.
pub fn select_seeds(
    committed: Option<&ClusterSnapshot>,
    target: &ClusterSnapshot,
) -> Result<SeedDelta, SelectionError> {
    let candidates: Vec<Node> = target
        .topology
        .enabled_nodes()
        .filter(|node| target.user.is_primary_type(&node.node_type))
        .cloned()
        .collect();
    let fault_domains = distinct(candidates.iter().map(|node| node.fault_domain.as_str()));
    let upgrade_domains = distinct(candidates.iter().map(|node| node.upgrade_domain.as_str()));

    let empty = Topology::default();
    let current = committed.map(|snapshot| &snapshot.topology).unwrap_or(&empty);
    let existing: Vec<Node> = current.seed_nodes().cloned().collect();
    let joining = added_nodes(current, &target.topology)
        .into_iter()
        .map(|node| node.name);

    SeedNodeSelector::new().prefer_nodes(joining).try_update(
        target.user.reliability_level,
        &existing,
        &candidates,
        fault_domains,
        upgrade_domains,
    )
}

pub fn classify(
    committed: Option<&ClusterSnapshot>,
    target: &ClusterSnapshot,
    delta: &SeedDelta,
) -> Result<UpgradePlan, ValidationError> {
    let Some(current) = committed else {
        return Ok(UpgradePlan::Baseline {
            seeds: delta.resulting_seeds(std::iter::empty()),
        });
    };

    let reliability_changed = current.user.reliability_level != target.user.reliability_level;
    if certificate_changed(&current.user.security, &target.user.security) {
        let topology_changed = !TopologyDiff::between(&current.topology, &target.topology).is_empty();
        if topology_changed || reliability_changed || !delta.is_empty() {
            return Err(ValidationError::MixedUpgradeNotAllowed);
        }
        let before = identity_values(&current.user.security);
        let after = identity_values(&target.user.security);
        return Ok(UpgradePlan::Certificate {
            added: after.difference(&before).cloned().collect(),
            removed: before.difference(&after).cloned().collect(),
        });
    }

    if reliability_changed {
        return Ok(UpgradePlan::AutoScale {
            from: current.user.reliability_level,
            to: target.user.reliability_level,
            delta: delta.clone(),
            resulting_seeds: delta.resulting_seeds(current.topology.seed_nodes()),
        });
    }

    if !delta.is_empty() {
        return Ok(UpgradePlan::SeedNode {
            delta: delta.clone(),
        });
    }
    Ok(UpgradePlan::Simple)
}

/// Any change to cluster certificate identities, their pinned issuers, or the
/// issuer stores.
pub fn certificate_changed(current: &SecurityDescriptor, target: &SecurityDescriptor) -> bool {
    fingerprint(current) != fingerprint(target)
        || issuer_stores(current) != issuer_stores(target)
}

fn fingerprint(descriptor: &SecurityDescriptor) -> Option<IdentityFingerprint> {
    let set = descriptor.cluster_identities()?;
    let identities = set
        .identities
        .iter()
        .map(|identity| {
            let issuers = identity
                .issuer_thumbprints
                .iter()
                .map(|issuer| normalize_identity(IdentityKind::Thumbprint, issuer))
                .collect();
            (normalize_identity(set.kind, &identity.value), issuers)
        })
        .collect();
    Some((set.kind, set.store_name.trim().to_ascii_lowercase(), identities))
}

fn issuer_stores(descriptor: &SecurityDescriptor) -> BTreeMap<String, BTreeSet<String>> {
    let mut stores: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for store in &descriptor.issuer_stores {
        stores
            .entry(store.issuer_common_name.trim().to_string())
            .or_default()
            .extend(store.normalized_stores());
    }
    stores
}

fn identity_values(descriptor: &SecurityDescriptor) -> BTreeSet<String> {
    descriptor
        .cluster_identities()
        .map(|set| set.normalized_values())
        .unwrap_or_default()
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values.collect::<BTreeSet<_>>().len()
}
