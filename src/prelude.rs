//! Convenience re-exports for callers driving upgrades. Pull this module in
//! via `use toposhift::prelude::*;`.

pub use crate::cluster_config::{AdminConfig, ReliabilityLevel, UserConfig};
pub use crate::config::OrchestratorConfig;
pub use crate::manifest::Manifest;
pub use crate::security::{CertificateLookup, CredentialCache};
pub use crate::topology::{Node, Topology};
pub use crate::upgrade::{
    ClusterId, ClusterRegistry, ClusterResource, ClusterSnapshot, NodeLiveness, StepProgress,
    UpgradeEnvironment, UpgradeKind, UpgradeLifecycle, UpgradeStatus,
};
pub use crate::util::error::{ErrorClass, Result as UpgradeResult, UpgradeError};
