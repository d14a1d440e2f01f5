//! Upgrade classification, preconditions and lifecycle.

mod classify;
mod cluster;
mod errors;
mod journal;
mod liveness;
mod state;
mod validate;

pub use classify::{certificate_changed, classify, select_seeds};
pub use cluster::{ClusterRegistry, ClusterResource, ClusterSnapshot, StepProgress, UpgradeEnvironment};
pub use errors::{LifecycleError, StepFailure, ValidationError};
pub use journal::{JournalEvent, JournalRecord, UpgradeJournal};
pub use liveness::{
    quorum_size, LivenessError, NodeHealth, NodeLiveness, NodeStatus, QuorumProbe, QuorumReport,
};
pub use state::{
    ClusterId, ManifestSequence, UpgradeKind, UpgradeLifecycle, UpgradePlan, UpgradeState,
    UpgradeStatus,
};
pub use validate::validate_config_update;
