#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use toposhift::{
    AdminConfig, CertificateInventory, ClusterId, ClusterResource, ClusterSnapshot,
    CredentialCache, InstalledCertificate, LivenessError, Node, NodeHealth, NodeLiveness,
    NodeStatus, NodeType, OrchestratorConfig, ReliabilityLevel, Topology, UpgradeEnvironment,
    UserConfig,
};

pub const CLUSTER: &str = "prod-east";

pub fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Node `n{domain}` alone in fault domain `fd:/dc{domain}` and upgrade domain `ud{domain}`.
pub fn node(domain: usize) -> Node {
    Node::new(
        format!("n{domain}"),
        format!("10.0.0.{domain}"),
        format!("fd:/dc{domain}"),
        format!("ud{domain}"),
        "primary",
    )
}

pub fn seed(domain: usize) -> Node {
    node(domain).as_seed()
}

pub fn user(version: &str, level: ReliabilityLevel) -> UserConfig {
    let mut user = UserConfig::new(CLUSTER, version);
    user.node_types.push(NodeType::primary("primary"));
    user.reliability_level = level;
    user
}

pub fn snapshot(version: &str, level: ReliabilityLevel, nodes: Vec<Node>) -> ClusterSnapshot {
    ClusterSnapshot::new(
        user(version, level),
        AdminConfig::new("1"),
        Topology::from_nodes(nodes).expect("fixture topology"),
    )
}

/// Five nodes on five domains, Bronze, seeds on domains 1-3.
pub fn five_node_bronze() -> ClusterSnapshot {
    snapshot(
        "1.0",
        ReliabilityLevel::Bronze,
        vec![seed(1), seed(2), seed(3), node(4), node(5)],
    )
}

pub fn committed_cluster(snapshot: ClusterSnapshot, last_version: u64) -> ClusterResource {
    ClusterResource::with_committed(ClusterId::new(CLUSTER), 64, snapshot, last_version)
}

pub fn seed_names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Liveness source where only the listed nodes report Up.
pub struct StaticLiveness {
    up: BTreeSet<String>,
}

impl StaticLiveness {
    pub fn up(names: &[&str]) -> Self {
        Self {
            up: seed_names(names),
        }
    }
}

impl NodeLiveness for StaticLiveness {
    fn node_health(&self, node: &str, _timeout: Duration) -> Result<NodeHealth, LivenessError> {
        let status = if self.up.contains(node) {
            NodeStatus::Up
        } else {
            NodeStatus::Down
        };
        Ok(NodeHealth {
            name: node.to_string(),
            status,
            fault_domain: String::new(),
            upgrade_domain: String::new(),
        })
    }
}

pub fn valid_cert(node: &str, thumbprint: &str) -> InstalledCertificate {
    InstalledCertificate::new(
        node,
        "My",
        thumbprint,
        "cluster.example",
        now() - Duration::from_secs(86_400),
        now() + Duration::from_secs(86_400),
    )
}

pub struct Harness {
    pub liveness: StaticLiveness,
    pub credentials: Arc<CredentialCache>,
    pub config: OrchestratorConfig,
}

impl Harness {
    pub fn new(liveness: StaticLiveness) -> Self {
        Self::with_inventory(liveness, CertificateInventory::new())
    }

    pub fn with_inventory(liveness: StaticLiveness, inventory: CertificateInventory) -> Self {
        let mut config = OrchestratorConfig::default();
        config.liveness_retry.max_attempts = 1;
        config.liveness_retry.base_delay = Duration::ZERO;
        Self {
            liveness,
            credentials: Arc::new(CredentialCache::new(Arc::new(inventory))),
            config,
        }
    }

    pub fn env(&self) -> UpgradeEnvironment<'_> {
        UpgradeEnvironment::new(&self.liveness, self.credentials.clone(), &self.config, now())
    }
}
