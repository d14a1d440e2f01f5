//! Versioned configuration snapshots. Values here are never mutated once a
//! snapshot is handed to the upgrade machinery; new targets replace them
//! wholesale.

mod reliability;
mod security;
mod user_config;

pub use reliability::{ReliabilityLevel, ReplicaSetSize};
pub use security::{
    CertificateIdentity, CertificateIdentitySet, IdentityKind, IssuerStore, SecurityDescriptor,
};
pub(crate) use security::normalize as normalize_identity;
pub use user_config::{AddonFeature, AdminConfig, EndpointPorts, NodeType, UserConfig};
