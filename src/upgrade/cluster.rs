//! The cluster resource: sole owner of committed state, the manifest version
//! counter, and at most one in-flight upgrade.

use super::classify::{classify, select_seeds};
use super::errors::{LifecycleError, StepFailure};
use super::journal::{JournalEvent, JournalRecord, UpgradeJournal};
use super::liveness::NodeLiveness;
use super::state::{
    ClusterId, ManifestSequence, UpgradeKind, UpgradeLifecycle, UpgradeState, UpgradeStatus,
};
use super::validate::validate_config_update;
use crate::cluster_config::{AdminConfig, UserConfig};
use crate::config::OrchestratorConfig;
use crate::manifest::{
    Manifest, ManifestSequenceBuilder, ManifestVersionAllocator, NonSeedChanges, SettingsGenerator,
};
use crate::security::CredentialCache;
use crate::telemetry::MetricsRegistry;
use crate::topology::{validate_topology, Topology, TopologyDiff};
use crate::util::UpgradeError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

/// A complete configuration snapshot: operator config, admin overrides, and
/// the node topology. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub user: UserConfig,
    pub admin: AdminConfig,
    pub topology: Topology,
}

impl ClusterSnapshot {
    pub fn new(user: UserConfig, admin: AdminConfig, topology: Topology) -> Self {
        Self {
            user,
            admin,
            topology,
        }
    }

    pub fn seed_names(&self) -> BTreeSet<String> {
        self.topology
            .seed_nodes()
            .map(|node| node.name.clone())
            .collect()
    }
}

/// Collaborators and clock for one planning or validation pass.
pub struct UpgradeEnvironment<'a> {
    pub liveness: &'a dyn NodeLiveness,
    pub credentials: Arc<CredentialCache>,
    pub config: &'a OrchestratorConfig,
    pub now: SystemTime,
}

impl<'a> UpgradeEnvironment<'a> {
    pub fn new(
        liveness: &'a dyn NodeLiveness,
        credentials: Arc<CredentialCache>,
        config: &'a OrchestratorConfig,
        now: SystemTime,
    ) -> Self {
        Self {
            liveness,
            credentials,
            config,
            now,
        }
    }

    pub fn settings_generator(&self) -> SettingsGenerator {
        SettingsGenerator::new(self.credentials.clone())
            .with_system_services(self.config.system_services.iter().cloned())
            .with_port_stride(self.config.port_stride)
    }
}

/// Result of a convergence report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepProgress {
    /// More manifests remain; the next one carries this version.
    Advanced { next_version: u64 },
    /// The last manifest converged and the target is now committed.
    Completed { version: u64 },
}

#[derive(Debug)]
pub struct ClusterResource {
    id: ClusterId,
    committed: Option<ClusterSnapshot>,
    versions: ManifestVersionAllocator,
    pending: Option<UpgradeState>,
    last_failed: Option<UpgradeState>,
    last_applied: Option<Manifest>,
    journal: UpgradeJournal,
    metrics: MetricsRegistry,
}

impl ClusterResource {
    pub fn new(id: ClusterId, journal_capacity: usize) -> Self {
        Self {
            id,
            committed: None,
            versions: ManifestVersionAllocator::new(),
            pending: None,
            last_failed: None,
            last_applied: None,
            journal: UpgradeJournal::new(journal_capacity),
            metrics: MetricsRegistry::new("toposhift"),
        }
    }

    /// Rehydrates a cluster that already has committed state.
    pub fn with_committed(
        id: ClusterId,
        journal_capacity: usize,
        committed: ClusterSnapshot,
        last_version: u64,
    ) -> Self {
        let mut cluster = Self::new(id, journal_capacity);
        cluster.committed = Some(committed);
        cluster.versions = ManifestVersionAllocator::starting_after(last_version);
        cluster.metrics.set_gauge("manifest.committed_version", last_version);
        cluster
    }

    pub fn id(&self) -> &ClusterId {
        &self.id
    }

    pub fn committed(&self) -> Option<&ClusterSnapshot> {
        self.committed.as_ref()
    }

    pub fn pending(&self) -> Option<&UpgradeState> {
        self.pending.as_ref()
    }

    pub fn last_failed(&self) -> Option<&UpgradeState> {
        self.last_failed.as_ref()
    }

    pub fn last_applied_manifest(&self) -> Option<&Manifest> {
        self.last_applied.as_ref()
    }

    pub fn last_allocated_version(&self) -> u64 {
        self.versions.last_allocated()
    }

    pub fn journal(&self) -> &UpgradeJournal {
        &self.journal
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Validates `target`, classifies the change and plans its manifests.
    /// Nothing is mutated unless every check passes.
    pub fn propose(
        &mut self,
        target: ClusterSnapshot,
        env: &UpgradeEnvironment<'_>,
    ) -> Result<&UpgradeState, UpgradeError> {
        if self.pending.is_some() {
            return Err(LifecycleError::UpgradeInFlight(self.id.to_string()).into());
        }
        self.metrics.inc_counter("upgrade.proposed", 1);
        let (state, versions) = match self.plan(target, env) {
            Ok(planned) => planned,
            Err(err) => {
                self.metrics.inc_counter("upgrade.rejected", 1);
                warn!(
                    "event=upgrade_rejected cluster={} class={:?} code={} reason=\"{}\"",
                    self.id,
                    err.class(),
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        self.versions = versions;
        self.metrics
            .observe("upgrade.sequence_length", 16, state.sequence.len() as u64);
        self.metrics
            .set_gauge("manifest.pending", state.sequence.len() as u64);
        self.record(JournalEvent::Proposed, state.kind(), env.now, |record| {
            record.with_version(state.sequence.current().map_or(0, |m| m.version))
        });
        info!(
            "event=upgrade_planned cluster={} kind={} steps={} first_version={}",
            self.id,
            state.kind(),
            state.sequence.len(),
            state.sequence.current().map_or(0, |m| m.version)
        );
        Ok(self.pending.insert(state))
    }

    fn plan(
        &self,
        target: ClusterSnapshot,
        env: &UpgradeEnvironment<'_>,
    ) -> Result<(UpgradeState, ManifestVersionAllocator), UpgradeError> {
        let committed = self.committed.as_ref();
        if let Some(current) = committed {
            validate_config_update(current, &target)?;
        }
        validate_topology(&target.topology, &target.user)?;

        let delta = select_seeds(committed, &target)?;
        let plan = classify(committed, &target, &delta)?;
        info!(
            "event=upgrade_classified cluster={} kind={} seeds_added={} seeds_removed={} target_seeds={}",
            self.id,
            plan.kind(),
            delta.added.len(),
            delta.removed.len(),
            delta.target_seed_count
        );

        let current_seeds: Vec<_> = committed
            .map(|snapshot| snapshot.topology.seed_nodes().cloned().collect())
            .unwrap_or_default();
        let resulting = delta.resulting_seeds(&current_seeds);
        let mut seeded = target;
        seeded.topology = seeded.topology.with_seed_flags(&resulting);

        let mut state = UpgradeState::new(self.id.clone(), plan, seeded);
        state.validate(committed, env)?;

        let mut versions = self.versions.clone();
        let manifests = self.build_manifests(&state, committed, &mut versions, env)?;
        state.sequence = ManifestSequence::new(manifests);
        Ok((state, versions))
    }

    fn build_manifests(
        &self,
        state: &UpgradeState,
        committed: Option<&ClusterSnapshot>,
        versions: &mut ManifestVersionAllocator,
        env: &UpgradeEnvironment<'_>,
    ) -> Result<Vec<Manifest>, UpgradeError> {
        let generator = env.settings_generator();
        let target = &state.target;
        if let (Some(current), Some(delta)) = (committed, state.plan.seed_delta()) {
            if !delta.is_empty() {
                let seed_changes: BTreeSet<&str> = delta
                    .added
                    .iter()
                    .chain(delta.removed.iter())
                    .map(|node| node.name.as_str())
                    .collect();
                let diff = TopologyDiff::between(&current.topology, &target.topology);
                let non_seed = NonSeedChanges {
                    added: diff
                        .added
                        .into_iter()
                        .filter(|node| node.enabled && !seed_changes.contains(node.name.as_str()))
                        .collect(),
                    removed: diff
                        .removed
                        .into_iter()
                        .chain(diff.disabled)
                        .filter(|node| !seed_changes.contains(node.name.as_str()))
                        .collect(),
                };
                let manifests = ManifestSequenceBuilder::new(&generator, &target.user, &target.admin)
                    .build(
                        &current.topology,
                        &target.topology,
                        Ok(delta.clone()),
                        &non_seed,
                        || state.next_manifest_version(versions),
                    )?;
                return Ok(manifests);
            }
        }
        let version = state.next_manifest_version(versions)?;
        let manifest = generator.render(
            &target.user,
            &target.admin,
            version,
            target.topology.enabled_nodes(),
        )?;
        Ok(vec![manifest])
    }

    pub fn start_upgrade(&mut self, now: SystemTime) -> Result<&Manifest, UpgradeError> {
        let state = self.pending_mut()?;
        state.on_started(now)?;
        let kind = state.kind();
        self.record(JournalEvent::Started, kind, now, |record| record);
        self.next_manifest()
            .ok_or_else(|| LifecycleError::NoPendingUpgrade(self.id.to_string()).into())
    }

    /// The manifest the caller should push next, if an upgrade is running.
    pub fn next_manifest(&self) -> Option<&Manifest> {
        self.pending
            .as_ref()
            .filter(|state| state.status == UpgradeStatus::InProgress)
            .and_then(|state| state.sequence.current())
    }

    /// Records convergence of the manifest at `version`. When `digest` is
    /// given it must match the pushed manifest's content hash.
    pub fn report_step_converged(
        &mut self,
        version: u64,
        digest: Option<&str>,
        now: SystemTime,
    ) -> Result<StepProgress, UpgradeError> {
        let id = self.id.to_string();
        let state = self.pending_mut()?;
        let expected = expect_in_progress(state)?;
        let manifest = match state.sequence.current() {
            Some(manifest) if manifest.version == version => manifest.clone(),
            _ => {
                return Err(LifecycleError::StepOutOfOrder {
                    expected,
                    reported: version,
                }
                .into())
            }
        };
        if let Some(reported) = digest {
            if manifest.digest() != Some(reported) {
                return Err(LifecycleError::DigestMismatch(version).into());
            }
        }
        state.sequence.advance();
        let next = state.sequence.current().map(|next| next.version);
        let kind = state.kind();
        info!(
            "event=step_converged cluster={} version={} seeds={} remaining={}",
            id,
            version,
            manifest.seed_count(),
            state.sequence.remaining().len()
        );
        self.last_applied = Some(manifest);
        self.metrics.inc_counter("upgrade.steps_applied", 1);
        self.metrics.set_gauge("manifest.committed_version", version);
        self.record(JournalEvent::StepConverged, kind, now, |record| {
            record.with_version(version)
        });

        if let Some(next_version) = next {
            if let Some(state) = self.pending.as_ref() {
                self.metrics
                    .set_gauge("manifest.pending", state.sequence.remaining().len() as u64);
            }
            return Ok(StepProgress::Advanced { next_version });
        }

        let mut state = self
            .pending
            .take()
            .ok_or_else(|| LifecycleError::NoPendingUpgrade(id.clone()))?;
        if let Err(err) = state.on_completed(&mut self.committed, now) {
            self.pending = Some(state);
            return Err(err.into());
        }
        self.metrics.inc_counter("upgrade.completed", 1);
        self.metrics.set_gauge("manifest.pending", 0);
        self.record(JournalEvent::Completed, kind, now, |record| {
            record.with_version(version)
        });
        Ok(StepProgress::Completed { version })
    }

    /// Marks the upgrade Failed. Steps that already converged stay applied.
    pub fn report_step_failed(
        &mut self,
        version: u64,
        now: SystemTime,
        reason: &str,
    ) -> Result<StepFailure, UpgradeError> {
        let state = self.pending_mut()?;
        let expected = expect_in_progress(state)?;
        if expected != Some(version) {
            return Err(LifecycleError::StepOutOfOrder {
                expected,
                reported: version,
            }
            .into());
        }
        let failure = StepFailure {
            manifest_version: version,
            reason: reason.to_string(),
            failed_at: now,
        };
        state.on_rolled_back_or_failed(UpgradeStatus::Failed, now, reason)?;
        state.failure = Some(failure.clone());
        let kind = state.kind();
        self.last_failed = self.pending.take();
        self.metrics.inc_counter("upgrade.failed", 1);
        self.metrics.set_gauge("manifest.pending", 0);
        self.record(JournalEvent::StepFailed, kind, now, |record| {
            record.with_version(version).with_reason(reason)
        });
        Ok(failure)
    }

    /// Skips the remaining steps of the pending upgrade when its kind allows.
    pub fn interrupt(&mut self, now: SystemTime, reason: &str) -> Result<(), UpgradeError> {
        let committed = self.committed.as_ref();
        let state = self
            .pending
            .as_ref()
            .ok_or_else(|| LifecycleError::NoPendingUpgrade(self.id.to_string()))?;
        if !state.can_interrupt_upgrade(committed) {
            return Err(LifecycleError::NotInterruptible.into());
        }
        self.discard_pending(JournalEvent::Interrupted, now, reason)
    }

    /// Operator rollback to the committed configuration. Discards the pending
    /// upgrade (or clears a failed one) and, when steps were already applied,
    /// returns a freshly versioned manifest of the committed configuration.
    pub fn rollback(
        &mut self,
        env: &UpgradeEnvironment<'_>,
        reason: &str,
    ) -> Result<Option<Manifest>, UpgradeError> {
        let state = match (&self.pending, &self.last_failed) {
            (Some(state), _) | (None, Some(state)) => state,
            (None, None) => {
                return Err(LifecycleError::NoPendingUpgrade(self.id.to_string()).into())
            }
        };
        let applied = !state.sequence.applied().is_empty();
        let restore = match (&self.committed, applied) {
            (Some(committed), true) => {
                let mut versions = self.versions.clone();
                let version = state.next_manifest_version(&mut versions)?;
                let manifest = env.settings_generator().render(
                    &committed.user,
                    &committed.admin,
                    version,
                    committed.topology.enabled_nodes(),
                )?;
                Some((manifest, versions))
            }
            _ => None,
        };
        let restore = restore.map(|(manifest, versions)| {
            self.versions = versions;
            manifest
        });
        if self.pending.is_some() {
            self.discard_pending(JournalEvent::RolledBack, env.now, reason)?;
        } else if let Some(failed) = self.last_failed.take() {
            self.record(JournalEvent::RolledBack, failed.kind(), env.now, |record| {
                record.with_reason(reason)
            });
        }
        if let Some(manifest) = &restore {
            info!(
                "event=rollback_manifest cluster={} version={} seeds={}",
                self.id,
                manifest.version,
                manifest.seed_count()
            );
            self.last_applied = Some(manifest.clone());
        }
        Ok(restore)
    }

    fn discard_pending(
        &mut self,
        event: JournalEvent,
        now: SystemTime,
        reason: &str,
    ) -> Result<(), UpgradeError> {
        let mut state = self
            .pending
            .take()
            .ok_or_else(|| LifecycleError::NoPendingUpgrade(self.id.to_string()))?;
        if let Err(err) = state.on_rolled_back_or_failed(UpgradeStatus::RolledBack, now, reason) {
            self.pending = Some(state);
            return Err(err.into());
        }
        self.metrics.set_gauge("manifest.pending", 0);
        self.record(event, state.kind(), now, |record| record.with_reason(reason));
        Ok(())
    }

    /// Reattaches a deserialized upgrade to this cluster.
    pub fn attach(&mut self, state: UpgradeState) -> Result<(), LifecycleError> {
        if state.cluster_id != self.id {
            return Err(LifecycleError::ClusterMismatch {
                expected: self.id.to_string(),
                found: state.cluster_id.to_string(),
            });
        }
        if self.pending.is_some() {
            return Err(LifecycleError::UpgradeInFlight(self.id.to_string()));
        }
        if state.status.is_terminal() {
            return Err(LifecycleError::InvalidTransition {
                from: state.status,
                to: UpgradeStatus::InProgress,
            });
        }
        self.pending = Some(state);
        Ok(())
    }

    fn pending_mut(&mut self) -> Result<&mut UpgradeState, LifecycleError> {
        let id = &self.id;
        self.pending
            .as_mut()
            .ok_or_else(|| LifecycleError::NoPendingUpgrade(id.to_string()))
    }

    fn record<F>(&mut self, event: JournalEvent, kind: UpgradeKind, now: SystemTime, decorate: F)
    where
        F: FnOnce(JournalRecord) -> JournalRecord,
    {
        let record = decorate(JournalRecord::new(self.id.clone(), event, kind, now));
        self.journal.record(record);
    }
}

fn expect_in_progress(state: &UpgradeState) -> Result<Option<u64>, LifecycleError> {
    if state.status != UpgradeStatus::InProgress {
        return Err(LifecycleError::InvalidTransition {
            from: state.status,
            to: UpgradeStatus::InProgress,
        });
    }
    Ok(state.sequence.current().map(|manifest| manifest.version))
}

/// Owns every cluster resource and resolves upgrade back-references.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    clusters: HashMap<ClusterId, ClusterResource>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cluster: ClusterResource) -> Option<ClusterResource> {
        self.clusters.insert(cluster.id().clone(), cluster)
    }

    pub fn get(&self, id: &ClusterId) -> Option<&ClusterResource> {
        self.clusters.get(id)
    }

    pub fn get_mut(&mut self, id: &ClusterId) -> Option<&mut ClusterResource> {
        self.clusters.get_mut(id)
    }

    pub fn resolve(&self, state: &UpgradeState) -> Result<&ClusterResource, LifecycleError> {
        self.clusters
            .get(&state.cluster_id)
            .ok_or_else(|| LifecycleError::UnknownCluster(state.cluster_id.to_string()))
    }

    /// Routes a deserialized upgrade back to its owning cluster.
    pub fn rehydrate(&mut self, state: UpgradeState) -> Result<(), LifecycleError> {
        let cluster = self
            .clusters
            .get_mut(&state.cluster_id)
            .ok_or_else(|| LifecycleError::UnknownCluster(state.cluster_id.to_string()))?;
        cluster.attach(state)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Ids of clusters with an upgrade in flight.
    pub fn in_flight(&self) -> Vec<&ClusterId> {
        let mut ids: Vec<_> = self
            .clusters
            .values()
            .filter(|cluster| cluster.pending().is_some())
            .map(ClusterResource::id)
            .collect();
        ids.sort();
        ids
    }
}
