use super::state::UpgradeStatus;
use crate::security::CertificateRotationError;
use crate::topology::TopologyError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

/// Precondition failures. Raised before anything is mutated, so committed
/// cluster state is untouched whenever one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cluster name cannot change ({current} -> {target})")]
    ClusterNameChanged { current: String, target: String },
    #[error("config version {0} is already committed")]
    IdenticalConfigVersion(String),
    #[error("primary node type {0} cannot be deleted or demoted")]
    PrimaryNodeTypeModified(String),
    #[error("{endpoint} endpoint of node type {node_type} cannot change")]
    EndpointUpdateNotAllowed {
        node_type: String,
        endpoint: &'static str,
    },
    #[error("authentication mode cannot change: {0}")]
    AuthenticationModeChange(&'static str),
    #[error("the RepairManager add-on cannot be removed")]
    RemoveRepairManagerUnsupported,
    #[error("node {0} cannot change its address or node type")]
    NodeIdentityChanged(String),
    #[error("node {0} is not a seed and cannot be removed while the reliability level changes")]
    RemoveNonSeedWithReliabilityChange(String),
    #[error("nodes cannot be removed from a scale-min topology")]
    ScaleMinRemoveNode,
    #[error("certificate changes cannot be combined with topology or reliability changes")]
    MixedUpgradeNotAllowed,
    #[error("node name {0} contains invalid characters")]
    InvalidNodeName(String),
    #[error("node {node} has malformed address {address}")]
    MalformedAddress { node: String, address: String },
    #[error("node {node} references unknown node type {node_type}")]
    UnknownNodeType { node: String, node_type: String },
    #[error("at least three fault domains are required, found {0}")]
    FaultDomainsTooFew(usize),
    #[error("at least three upgrade domains are required, found {0}")]
    UpgradeDomainsTooFew(usize),
    #[error("node {0} was dropped from the topology without being listed for removal")]
    UnlistedNodeRemoval(String),
    #[error("node {0} is listed for removal but is not part of the current topology")]
    UnknownNodeRemoval(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("insufficient quorum: {reachable} of {target_seeds} target seeds reachable, {required} required")]
    InsufficientQuorum {
        required: usize,
        reachable: usize,
        target_seeds: usize,
    },
    #[error(transparent)]
    Certificate(#[from] CertificateRotationError),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::ClusterNameChanged { .. } => "cluster-name-changed",
            ValidationError::IdenticalConfigVersion(_) => "identical-config-version",
            ValidationError::PrimaryNodeTypeModified(_) => "primary-node-type-modified",
            ValidationError::EndpointUpdateNotAllowed { .. } => "endpoint-update-not-allowed",
            ValidationError::AuthenticationModeChange(_) => "authentication-mode-change",
            ValidationError::RemoveRepairManagerUnsupported => "remove-repair-manager-unsupported",
            ValidationError::NodeIdentityChanged(_) => "node-identity-changed",
            ValidationError::RemoveNonSeedWithReliabilityChange(_) => {
                "remove-non-seed-with-reliability-change"
            }
            ValidationError::ScaleMinRemoveNode => "scale-min-remove-node",
            ValidationError::MixedUpgradeNotAllowed => "mixed-upgrade-not-allowed",
            ValidationError::InvalidNodeName(_) => "invalid-node-name",
            ValidationError::MalformedAddress { .. } => "malformed-address",
            ValidationError::UnknownNodeType { .. } => "unknown-node-type",
            ValidationError::FaultDomainsTooFew(_) => "fault-domains-too-few",
            ValidationError::UpgradeDomainsTooFew(_) => "upgrade-domains-too-few",
            ValidationError::UnlistedNodeRemoval(_) => "unlisted-node-removal",
            ValidationError::UnknownNodeRemoval(_) => "unknown-node-removal",
            ValidationError::Topology(_) => "duplicate-node",
            ValidationError::InsufficientQuorum { .. } => "insufficient-quorum",
            ValidationError::Certificate(err) => err.code(),
        }
    }

    /// Quorum and certificate lookups depend on live cluster state and may
    /// pass on a later attempt; everything else needs a corrected target.
    pub fn is_retryable(&self) -> bool {
        match self {
            ValidationError::InsufficientQuorum { .. } => true,
            ValidationError::Certificate(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// A pushed manifest that did not converge.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("manifest version {manifest_version} failed to converge: {reason}")]
pub struct StepFailure {
    pub manifest_version: u64,
    pub reason: String,
    pub failed_at: SystemTime,
}

impl StepFailure {
    pub fn code(&self) -> &'static str {
        "step-failed"
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cluster {0} already has an upgrade in flight")]
    UpgradeInFlight(String),
    #[error("cluster {0} has no pending upgrade")]
    NoPendingUpgrade(String),
    #[error("upgrade cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: UpgradeStatus,
        to: UpgradeStatus,
    },
    #[error("upgrade cannot be interrupted while a code version change is underway")]
    NotInterruptible,
    #[error("convergence reported for manifest {reported}, expected {expected:?}")]
    StepOutOfOrder { expected: Option<u64>, reported: u64 },
    #[error("manifest digest mismatch for version {0}")]
    DigestMismatch(u64),
    #[error("upgrade belongs to cluster {expected}, not {found}")]
    ClusterMismatch { expected: String, found: String },
    #[error("cluster {0} is not registered")]
    UnknownCluster(String),
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::UpgradeInFlight(_) => "upgrade-in-flight",
            LifecycleError::NoPendingUpgrade(_) => "no-pending-upgrade",
            LifecycleError::InvalidTransition { .. } => "invalid-transition",
            LifecycleError::NotInterruptible => "not-interruptible",
            LifecycleError::StepOutOfOrder { .. } => "step-out-of-order",
            LifecycleError::DigestMismatch(_) => "digest-mismatch",
            LifecycleError::ClusterMismatch { .. } => "cluster-mismatch",
            LifecycleError::UnknownCluster(_) => "unknown-cluster",
        }
    }
}
