use crate::util::RetryPolicy;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHealth {
    pub name: String,
    pub status: NodeStatus,
    pub fault_domain: String,
    pub upgrade_domain: String,
}

impl NodeHealth {
    pub fn is_up(&self) -> bool {
        self.status == NodeStatus::Up
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LivenessError {
    #[error("liveness lookup for {node} timed out after {after:?}")]
    Timeout { node: String, after: Duration },
    #[error("health service unavailable: {0}")]
    Unavailable(String),
    #[error("node {0} is unknown to the health service")]
    UnknownNode(String),
}

impl LivenessError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, LivenessError::UnknownNode(_))
    }
}

/// Read-only node health lookup supplied by the caller.
pub trait NodeLiveness {
    fn node_health(&self, node: &str, timeout: Duration) -> Result<NodeHealth, LivenessError>;
}

/// Strict majority of `seeds`.
pub fn quorum_size(seeds: usize) -> usize {
    seeds / 2 + 1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumReport {
    pub target_seeds: usize,
    pub required: usize,
    pub reachable: BTreeSet<String>,
    pub unreachable: BTreeSet<String>,
}

impl QuorumReport {
    pub fn is_met(&self) -> bool {
        self.target_seeds == 0 || self.reachable.len() >= self.required
    }
}

/// Checks how many of a seed set currently report Up.
pub struct QuorumProbe<'a> {
    liveness: &'a dyn NodeLiveness,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<'a> QuorumProbe<'a> {
    pub fn new(liveness: &'a dyn NodeLiveness, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            liveness,
            timeout,
            retry,
        }
    }

    /// A node counts as reachable only when it reports Up. Lookup errors that
    /// survive the retry policy count as unreachable.
    pub fn probe(&self, seeds: &BTreeSet<String>) -> QuorumReport {
        let mut reachable = BTreeSet::new();
        let mut unreachable = BTreeSet::new();
        for seed in seeds {
            let result = self.retry.run(
                |attempt| {
                    debug!("event=liveness_lookup node={} attempt={}", seed, attempt);
                    self.liveness.node_health(seed, self.timeout)
                },
                LivenessError::is_transient,
                std::thread::sleep,
            );
            match result {
                Ok(health) if health.is_up() => {
                    reachable.insert(seed.clone());
                }
                Ok(health) => {
                    debug!("event=liveness_not_up node={} status={:?}", seed, health.status);
                    unreachable.insert(seed.clone());
                }
                Err(err) => {
                    debug!("event=liveness_failed node={} error=\"{}\"", seed, err);
                    unreachable.insert(seed.clone());
                }
            }
        }
        let report = QuorumReport {
            target_seeds: seeds.len(),
            required: quorum_size(seeds.len()),
            reachable,
            unreachable,
        };
        info!(
            "event=quorum_check target_seeds={} required={} reachable={} met={}",
            report.target_seeds,
            report.required,
            report.reachable.len(),
            report.is_met()
        );
        report
    }
}
