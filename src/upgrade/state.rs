//! Pending upgrade state and the behaviour shared by every upgrade kind.

use super::cluster::{ClusterSnapshot, UpgradeEnvironment};
use super::errors::{LifecycleError, StepFailure, ValidationError};
use super::liveness::QuorumProbe;
use crate::cluster_config::{ReliabilityLevel, SecurityDescriptor};
use crate::manifest::{Manifest, ManifestError, ManifestVersionAllocator};
use crate::security::CertificateRotationValidator;
use crate::selection::SeedDelta;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

/// Identifier used to resolve an upgrade back to the cluster that owns it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    Baseline,
    Simple,
    SeedNode,
    Certificate,
    AutoScale,
}

impl UpgradeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpgradeKind::Baseline => "baseline",
            UpgradeKind::Simple => "simple",
            UpgradeKind::SeedNode => "seed-node",
            UpgradeKind::Certificate => "certificate",
            UpgradeKind::AutoScale => "auto-scale",
        }
    }
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a pending upgrade changes, with the data each kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradePlan {
    Baseline {
        seeds: BTreeSet<String>,
    },
    Simple,
    SeedNode {
        delta: SeedDelta,
    },
    Certificate {
        added: Vec<String>,
        removed: Vec<String>,
    },
    AutoScale {
        from: ReliabilityLevel,
        to: ReliabilityLevel,
        delta: SeedDelta,
        resulting_seeds: BTreeSet<String>,
    },
}

impl UpgradePlan {
    pub fn kind(&self) -> UpgradeKind {
        match self {
            UpgradePlan::Baseline { .. } => UpgradeKind::Baseline,
            UpgradePlan::Simple => UpgradeKind::Simple,
            UpgradePlan::SeedNode { .. } => UpgradeKind::SeedNode,
            UpgradePlan::Certificate { .. } => UpgradeKind::Certificate,
            UpgradePlan::AutoScale { .. } => UpgradeKind::AutoScale,
        }
    }

    pub fn seed_delta(&self) -> Option<&SeedDelta> {
        match self {
            UpgradePlan::SeedNode { delta } | UpgradePlan::AutoScale { delta, .. } => Some(delta),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeStatus {
    NotStarted,
    InProgress,
    Completed,
    RolledBack,
    Failed,
}

impl UpgradeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UpgradeStatus::Completed | UpgradeStatus::RolledBack | UpgradeStatus::Failed
        )
    }
}

/// Ordered manifests with a cursor on the next one to push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSequence {
    manifests: Vec<Manifest>,
    cursor: usize,
}

impl ManifestSequence {
    pub fn new(manifests: Vec<Manifest>) -> Self {
        Self {
            manifests,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn current(&self) -> Option<&Manifest> {
        self.manifests.get(self.cursor)
    }

    pub fn advance(&mut self) -> Option<&Manifest> {
        if self.cursor < self.manifests.len() {
            self.cursor += 1;
        }
        self.current()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.manifests.len()
    }

    pub fn applied(&self) -> &[Manifest] {
        &self.manifests[..self.cursor.min(self.manifests.len())]
    }

    pub fn remaining(&self) -> &[Manifest] {
        &self.manifests[self.cursor.min(self.manifests.len())..]
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// An accepted target and its progress. The owning cluster is referenced by
/// id only; `ClusterRegistry` resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeState {
    pub cluster_id: ClusterId,
    pub plan: UpgradePlan,
    pub status: UpgradeStatus,
    /// Target snapshot with seed flags matching the planned seed set.
    pub target: ClusterSnapshot,
    pub sequence: ManifestSequence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UpgradeState {
    pub fn new(cluster_id: ClusterId, plan: UpgradePlan, target: ClusterSnapshot) -> Self {
        Self {
            cluster_id,
            plan,
            status: UpgradeStatus::NotStarted,
            target,
            sequence: ManifestSequence::default(),
            started_at: None,
            finished_at: None,
            failure: None,
            reason: None,
        }
    }

    pub fn kind(&self) -> UpgradeKind {
        self.plan.kind()
    }

    fn transition(&mut self, to: UpgradeStatus) -> Result<(), LifecycleError> {
        let allowed = match (self.status, to) {
            (UpgradeStatus::NotStarted, UpgradeStatus::InProgress) => true,
            (UpgradeStatus::InProgress, UpgradeStatus::Completed) => true,
            (UpgradeStatus::NotStarted | UpgradeStatus::InProgress, UpgradeStatus::RolledBack) => {
                true
            }
            (UpgradeStatus::NotStarted | UpgradeStatus::InProgress, UpgradeStatus::Failed) => true,
            _ => false,
        };
        if !allowed {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Hooks every upgrade kind answers to. Kind-specific behaviour is selected
/// by matching on the plan.
pub trait UpgradeLifecycle {
    /// Preconditions for starting. Never touches committed state.
    fn validate(
        &self,
        committed: Option<&ClusterSnapshot>,
        env: &UpgradeEnvironment<'_>,
    ) -> Result<(), ValidationError>;

    /// The only place a manifest version is drawn from the cluster counter.
    fn next_manifest_version(
        &self,
        versions: &mut ManifestVersionAllocator,
    ) -> Result<u64, ManifestError>;

    fn on_started(&mut self, now: SystemTime) -> Result<(), LifecycleError>;

    /// Replaces the committed snapshot with the target.
    fn on_completed(
        &mut self,
        committed: &mut Option<ClusterSnapshot>,
        now: SystemTime,
    ) -> Result<(), LifecycleError>;

    /// `outcome` must be `RolledBack` or `Failed`.
    fn on_rolled_back_or_failed(
        &mut self,
        outcome: UpgradeStatus,
        now: SystemTime,
        reason: &str,
    ) -> Result<(), LifecycleError>;

    fn can_interrupt_upgrade(&self, committed: Option<&ClusterSnapshot>) -> bool;
}

impl UpgradeLifecycle for UpgradeState {
    fn validate(
        &self,
        committed: Option<&ClusterSnapshot>,
        env: &UpgradeEnvironment<'_>,
    ) -> Result<(), ValidationError> {
        match &self.plan {
            UpgradePlan::Baseline { .. } | UpgradePlan::Simple | UpgradePlan::SeedNode { .. } => {
                Ok(())
            }
            UpgradePlan::Certificate { .. } => {
                let unsecured = SecurityDescriptor::unsecured();
                let current = committed
                    .map(|snapshot| &snapshot.user.security)
                    .unwrap_or(&unsecured);
                CertificateRotationValidator::new(env.credentials.clone()).validate(
                    current,
                    &self.target.user.security,
                    env.now,
                )?;
                Ok(())
            }
            UpgradePlan::AutoScale {
                resulting_seeds, ..
            } => {
                let probe = QuorumProbe::new(
                    env.liveness,
                    env.config.liveness_timeout,
                    env.config.liveness_retry.policy(),
                );
                let report = probe.probe(resulting_seeds);
                if report.is_met() {
                    Ok(())
                } else {
                    Err(ValidationError::InsufficientQuorum {
                        required: report.required,
                        reachable: report.reachable.len(),
                        target_seeds: report.target_seeds,
                    })
                }
            }
        }
    }

    fn next_manifest_version(
        &self,
        versions: &mut ManifestVersionAllocator,
    ) -> Result<u64, ManifestError> {
        versions.allocate()
    }

    fn on_started(&mut self, now: SystemTime) -> Result<(), LifecycleError> {
        self.transition(UpgradeStatus::InProgress)?;
        self.started_at = Some(now);
        info!(
            "event=upgrade_started cluster={} kind={} steps={}",
            self.cluster_id,
            self.kind(),
            self.sequence.len()
        );
        Ok(())
    }

    fn on_completed(
        &mut self,
        committed: &mut Option<ClusterSnapshot>,
        now: SystemTime,
    ) -> Result<(), LifecycleError> {
        self.transition(UpgradeStatus::Completed)?;
        self.finished_at = Some(now);
        *committed = Some(self.target.clone());
        info!(
            "event=upgrade_completed cluster={} kind={} config_version={}",
            self.cluster_id,
            self.kind(),
            self.target.user.config_version
        );
        Ok(())
    }

    fn on_rolled_back_or_failed(
        &mut self,
        outcome: UpgradeStatus,
        now: SystemTime,
        reason: &str,
    ) -> Result<(), LifecycleError> {
        if !matches!(outcome, UpgradeStatus::RolledBack | UpgradeStatus::Failed) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: outcome,
            });
        }
        self.transition(outcome)?;
        self.finished_at = Some(now);
        self.reason = Some(reason.to_string());
        warn!(
            "event=upgrade_ended cluster={} kind={} status={:?} applied_steps={} reason=\"{}\"",
            self.cluster_id,
            self.kind(),
            outcome,
            self.sequence.applied().len(),
            reason
        );
        Ok(())
    }

    fn can_interrupt_upgrade(&self, committed: Option<&ClusterSnapshot>) -> bool {
        match self.plan {
            UpgradePlan::Simple | UpgradePlan::AutoScale { .. } => {
                let current = committed.and_then(|snapshot| snapshot.user.code_version.as_deref());
                current == self.target.user.code_version.as_deref()
            }
            _ => true,
        }
    }
}
