#[path = "../support/upgrade/fixtures.rs"]
mod fixtures;

use fixtures::{
    committed_cluster, five_node_bronze, node, now, seed, seed_names, snapshot, Harness,
    StaticLiveness, CLUSTER,
};
use toposhift::{
    AdminConfig, ClusterId, ClusterRegistry, ClusterResource, ErrorClass, JournalEvent,
    LifecycleError, ReliabilityLevel, StepProgress, UpgradeError, UpgradeKind, UpgradePlan,
    UpgradeState, UpgradeStatus,
};

fn all_up() -> Harness {
    Harness::new(StaticLiveness::up(&["n1", "n2", "n3", "n4", "n5"]))
}

fn admin_bump() -> toposhift::ClusterSnapshot {
    let mut target = five_node_bronze();
    target.user.config_version = "1.1".into();
    target.admin = AdminConfig::new("2").with_setting("Diagnostics", "Level", "verbose");
    target
}

fn lifecycle_code(err: &UpgradeError) -> Option<&'static str> {
    match err {
        UpgradeError::Lifecycle(err) => Some(err.code()),
        _ => None,
    }
}

#[test]
fn first_deployment_is_a_baseline_with_a_single_manifest() {
    let harness = all_up();
    let mut cluster = ClusterResource::new(ClusterId::new(CLUSTER), 16);
    let target = snapshot(
        "1.0",
        ReliabilityLevel::Bronze,
        vec![node(1), node(2), node(3), node(4), node(5)],
    );

    let state = cluster.propose(target, &harness.env()).unwrap();
    assert_eq!(state.kind(), UpgradeKind::Baseline);
    assert_eq!(
        state.plan,
        UpgradePlan::Baseline {
            seeds: seed_names(&["n1", "n2", "n3"])
        }
    );
    assert_eq!(state.sequence.len(), 1);
    assert_eq!(state.sequence.manifests()[0].version, 1);
    assert_eq!(state.target.seed_names(), seed_names(&["n1", "n2", "n3"]));

    let manifest = cluster.start_upgrade(now()).unwrap().clone();
    assert_eq!(manifest.seed_count(), 3);
    assert_eq!(
        cluster
            .report_step_converged(1, manifest.digest(), now())
            .unwrap(),
        StepProgress::Completed { version: 1 }
    );
    assert_eq!(
        cluster.committed().map(|c| c.seed_names()),
        Some(seed_names(&["n1", "n2", "n3"]))
    );
    assert_eq!(cluster.metrics().counter("upgrade.completed"), 1);
}

#[test]
fn settings_only_change_is_simple_and_journaled() {
    let harness = all_up();
    let mut cluster = committed_cluster(five_node_bronze(), 10);

    let state = cluster.propose(admin_bump(), &harness.env()).unwrap();
    assert_eq!(state.plan, UpgradePlan::Simple);
    assert_eq!(state.status, UpgradeStatus::NotStarted);
    let manifest = state.sequence.manifests()[0].clone();
    assert_eq!(manifest.version, 11);
    assert_eq!(
        manifest.section("Diagnostics").and_then(|s| s.get("Level")),
        Some("verbose")
    );
    assert!(cluster.next_manifest().is_none());

    cluster.start_upgrade(now()).unwrap();
    assert_eq!(cluster.next_manifest().map(|m| m.version), Some(11));
    cluster.report_step_converged(11, None, now()).unwrap();

    let events: Vec<JournalEvent> = cluster.journal().iter().map(|r| r.event).collect();
    assert_eq!(
        events,
        vec![
            JournalEvent::Proposed,
            JournalEvent::Started,
            JournalEvent::StepConverged,
            JournalEvent::Completed,
        ]
    );
    let last = cluster.journal().latest().unwrap();
    assert_eq!(last.kind, UpgradeKind::Simple);
    assert_eq!(last.manifest_version, Some(11));
    assert_eq!(cluster.committed().unwrap().admin.version, "2");
}

#[test]
fn second_proposal_waits_for_the_first() {
    let harness = all_up();
    let mut cluster = committed_cluster(five_node_bronze(), 10);
    cluster.propose(admin_bump(), &harness.env()).unwrap();

    let mut again = admin_bump();
    again.user.config_version = "1.2".into();
    let err = cluster.propose(again, &harness.env()).unwrap_err();
    assert_eq!(lifecycle_code(&err), Some("upgrade-in-flight"));
    assert_eq!(err.class(), ErrorClass::Lifecycle);
    assert!(err.is_retryable());
    assert_eq!(cluster.last_allocated_version(), 11);
}

#[test]
fn convergence_reports_are_checked_against_the_pushed_manifest() {
    let harness = all_up();
    let mut cluster = committed_cluster(five_node_bronze(), 10);
    cluster.propose(admin_bump(), &harness.env()).unwrap();

    let early = cluster.report_step_converged(11, None, now()).unwrap_err();
    assert_eq!(lifecycle_code(&early), Some("invalid-transition"));

    cluster.start_upgrade(now()).unwrap();
    let wrong = cluster.report_step_converged(12, None, now()).unwrap_err();
    assert_eq!(lifecycle_code(&wrong), Some("step-out-of-order"));
    let tampered = cluster
        .report_step_converged(11, Some("00ff"), now())
        .unwrap_err();
    assert_eq!(lifecycle_code(&tampered), Some("digest-mismatch"));
    assert_eq!(cluster.pending().map(|s| s.sequence.cursor()), Some(0));
}

#[test]
fn code_version_change_cannot_be_interrupted() {
    let harness = all_up();
    let mut cluster = committed_cluster(five_node_bronze(), 10);
    let mut target = admin_bump();
    target.user.code_version = Some("8.1".into());
    cluster.propose(target, &harness.env()).unwrap();
    cluster.start_upgrade(now()).unwrap();

    let err = cluster.interrupt(now(), "operator").unwrap_err();
    assert!(matches!(
        err,
        UpgradeError::Lifecycle(LifecycleError::NotInterruptible)
    ));
    assert!(cluster.pending().is_some());
}

#[test]
fn config_only_upgrade_can_be_interrupted() {
    let harness = all_up();
    let mut cluster = committed_cluster(five_node_bronze(), 10);
    cluster.propose(admin_bump(), &harness.env()).unwrap();
    cluster.start_upgrade(now()).unwrap();

    cluster.interrupt(now(), "maintenance window closed").unwrap();
    assert!(cluster.pending().is_none());
    assert_eq!(cluster.committed().unwrap().user.config_version, "1.0");
    let last = cluster.journal().latest().unwrap();
    assert_eq!(last.event, JournalEvent::Interrupted);
    assert_eq!(last.reason.as_deref(), Some("maintenance window closed"));
}

#[test]
fn rollback_before_any_step_needs_no_restore_manifest() {
    let harness = all_up();
    let mut cluster = committed_cluster(five_node_bronze(), 10);
    cluster.propose(admin_bump(), &harness.env()).unwrap();

    let restore = cluster.rollback(&harness.env(), "changed my mind").unwrap();
    assert!(restore.is_none());
    assert!(cluster.pending().is_none());
    assert_eq!(cluster.last_allocated_version(), 11);
    assert_eq!(
        cluster.journal().latest().map(|r| r.event),
        Some(JournalEvent::RolledBack)
    );

    let err = cluster.rollback(&harness.env(), "again").unwrap_err();
    assert_eq!(lifecycle_code(&err), Some("no-pending-upgrade"));
}

#[test]
fn serialized_upgrade_rehydrates_into_its_cluster() {
    let harness = Harness::new(StaticLiveness::up(&["n1", "n2", "n3", "n4", "n5", "n6"]));
    let mut origin = committed_cluster(five_node_bronze(), 10);
    let target = snapshot(
        "1.1",
        ReliabilityLevel::Bronze,
        vec![seed(1), node(2).disabled(), seed(3), node(4), node(5), node(6)],
    );
    origin.propose(target, &harness.env()).unwrap();
    let first = origin.start_upgrade(now()).unwrap().version;
    origin.report_step_converged(first, None, now()).unwrap();

    let encoded = serde_json::to_string(origin.pending().unwrap()).unwrap();
    let decoded: UpgradeState = serde_json::from_str(&encoded).unwrap();
    assert_eq!(&decoded, origin.pending().unwrap());

    let mut registry = ClusterRegistry::new();
    registry.register(committed_cluster(five_node_bronze(), first));
    registry.rehydrate(decoded.clone()).unwrap();
    assert_eq!(registry.in_flight(), vec![&ClusterId::new(CLUSTER)]);

    let cluster = registry.resolve(&decoded).unwrap();
    assert_eq!(cluster.next_manifest().map(|m| m.version), Some(first + 1));
    assert_eq!(
        cluster.next_manifest().map(|m| m.seed_names()),
        Some(seed_names(&["n1", "n3", "n6"]))
    );

    assert_eq!(
        registry.rehydrate(decoded.clone()),
        Err(LifecycleError::UpgradeInFlight(CLUSTER.into()))
    );
    let mut stray = decoded;
    stray.cluster_id = ClusterId::new("elsewhere");
    assert_eq!(
        registry.rehydrate(stray),
        Err(LifecycleError::UnknownCluster("elsewhere".into()))
    );
}
