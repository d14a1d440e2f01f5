//! Quorum-safe upgrade planning for seed-based clusters.
//!
//! Given the committed configuration of a cluster and a desired target, the
//! crate decides what kind of upgrade is being asked for, checks that it can
//! run without dropping the seed layer below quorum or breaking certificate
//! trust, and produces the ordered manifests an external reconciliation loop
//! pushes one at a time.

pub mod cluster_config;
pub mod config;
pub mod manifest;
pub mod prelude;
pub mod security;
pub mod selection;
pub mod telemetry;
pub mod timeouts;
pub mod topology;
pub mod upgrade;
pub mod util;

pub use cluster_config::{
    AddonFeature, AdminConfig, CertificateIdentity, CertificateIdentitySet, EndpointPorts,
    IdentityKind, IssuerStore, NodeType, ReliabilityLevel, ReplicaSetSize, SecurityDescriptor,
    UserConfig,
};
pub use config::{ConfigError, OrchestratorConfig, RetrySettings};
pub use manifest::{
    Manifest, ManifestError, ManifestNode, ManifestSequenceBuilder, ManifestVersionAllocator,
    NonSeedChanges, SequenceError, SettingsGenerator, SettingsSection,
};
pub use security::{
    CertificateInventory, CertificateLookup, CertificateLookupError, CertificateRotation,
    CertificateRotationError, CertificateRotationValidator, CertificateValidity, CredentialCache,
    InstalledCertificate,
};
pub use selection::{DomainSpread, SeedDelta, SeedNodeSelector, SelectionError};
pub use telemetry::{MetricsRegistry, MetricsSnapshot};
pub use topology::{DomainPair, Node, Topology, TopologyDiff, TopologyError};
pub use upgrade::{
    ClusterId, ClusterRegistry, ClusterResource, ClusterSnapshot, JournalEvent, JournalRecord,
    LifecycleError, LivenessError, ManifestSequence, NodeHealth, NodeLiveness, NodeStatus,
    StepFailure, StepProgress, UpgradeEnvironment, UpgradeJournal, UpgradeKind, UpgradeLifecycle,
    UpgradePlan, UpgradeState, UpgradeStatus, ValidationError,
};
pub use util::{ErrorClass, RetryPolicy, RetryStrategy, UpgradeError};
