//! Seed membership selection.
//!
//! The selector computes the smallest change to the current seed set that
//! reaches the reliability target while spreading seeds across fault and
//! upgrade domains. It is a pure function over the snapshots it is handed.

use super::spread::DomainSpread;
use crate::cluster_config::ReliabilityLevel;
use crate::topology::Node;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Smallest seed set that still tolerates losing one seed.
pub const MIN_QUORUM_SEED_COUNT: usize = 3;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{level} needs {required} seed-capable nodes, only {available} enabled")]
    InsufficientCandidates {
        level: ReliabilityLevel,
        required: usize,
        available: usize,
    },
    #[error("candidate {0} listed more than once")]
    DuplicateCandidate(String),
    #[error("domain counts must be non-zero (fault={fault_domains}, upgrade={upgrade_domains})")]
    InvalidDomainCounts {
        fault_domains: usize,
        upgrade_domains: usize,
    },
}

impl SelectionError {
    pub fn code(&self) -> &'static str {
        match self {
            SelectionError::InsufficientCandidates { .. } => "insufficient-candidates",
            SelectionError::DuplicateCandidate(_) => "duplicate-candidate",
            SelectionError::InvalidDomainCounts { .. } => "invalid-domain-counts",
        }
    }
}

/// Seed membership change produced by the selector.
///
/// `added` is in selection order, which the manifest sequence preserves.
/// `removed` lists forced removals (disabled or dropped seeds) first, then any
/// seeds shed because the reliability target shrank.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SeedDelta {
    pub added: Vec<Node>,
    pub removed: Vec<Node>,
    pub target_seed_count: usize,
}

impl SeedDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Seed names once the delta has been fully applied to `existing`.
    pub fn resulting_seeds<'a, I>(&self, existing: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let removed: BTreeSet<&str> = self.removed.iter().map(|node| node.name.as_str()).collect();
        existing
            .into_iter()
            .filter(|node| !removed.contains(node.name.as_str()))
            .map(|node| node.name.clone())
            .chain(self.added.iter().map(|node| node.name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedNodeSelector {
    preferred: BTreeSet<String>,
}

impl SeedNodeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes to favour when domain spread alone cannot break a tie, typically
    /// nodes joining in the same target topology.
    pub fn prefer_nodes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn try_update(
        &self,
        reliability_level: ReliabilityLevel,
        existing_enabled_seeds: &[Node],
        all_enabled_candidates: &[Node],
        fault_domain_count: usize,
        upgrade_domain_count: usize,
    ) -> Result<SeedDelta, SelectionError> {
        let mut pool: BTreeMap<&str, &Node> = BTreeMap::new();
        for node in all_enabled_candidates {
            if !node.enabled {
                debug!("event=seed_candidate_skipped node={} reason=disabled", node.name);
                continue;
            }
            if pool.insert(node.name.as_str(), node).is_some() {
                return Err(SelectionError::DuplicateCandidate(node.name.clone()));
            }
        }

        let required = reliability_level.seed_node_count();
        let target = reliability_level.capped_seed_count(pool.len());
        if !pool.is_empty() && (fault_domain_count == 0 || upgrade_domain_count == 0) {
            return Err(SelectionError::InvalidDomainCounts {
                fault_domains: fault_domain_count,
                upgrade_domains: upgrade_domain_count,
            });
        }
        let degenerate = fault_domain_count == 1 && upgrade_domain_count == 1;
        let floor = if degenerate {
            1
        } else {
            MIN_QUORUM_SEED_COUNT.min(required)
        };
        if required > 0 && target < floor {
            return Err(SelectionError::InsufficientCandidates {
                level: reliability_level,
                required: floor,
                available: pool.len(),
            });
        }

        let mut kept: Vec<Node> = Vec::new();
        let mut removed: Vec<Node> = Vec::new();
        let mut seen = BTreeSet::new();
        let mut existing: Vec<&Node> = existing_enabled_seeds.iter().collect();
        existing.sort_by(|a, b| a.name.cmp(&b.name));
        for seed in existing {
            if !seen.insert(seed.name.as_str()) {
                continue;
            }
            match pool.get(seed.name.as_str()) {
                Some(candidate) => kept.push((*candidate).clone()),
                None => removed.push(seed.clone()),
            }
        }

        let mut spread = DomainSpread::from_nodes(kept.iter());
        let mut added: Vec<Node> = Vec::new();

        while kept.len() > target {
            let victim_idx = self.pick_removal(&kept, &spread, degenerate);
            let victim = kept.remove(victim_idx);
            spread.forget(&victim);
            removed.push(victim);
        }

        if kept.len() < target {
            let chosen: BTreeSet<String> = kept.iter().map(|node| node.name.clone()).collect();
            let mut remaining: Vec<&Node> = pool
                .values()
                .copied()
                .filter(|node| !chosen.contains(&node.name))
                .collect();
            while kept.len() + added.len() < target {
                let Some(idx) = self.pick_addition(&remaining, &spread, degenerate) else {
                    break;
                };
                let mut node = remaining.remove(idx).clone();
                node.is_seed = true;
                spread.record(&node);
                added.push(node);
            }
        }

        let resulting = kept.len() + added.len();
        if resulting != target {
            return Err(SelectionError::InsufficientCandidates {
                level: reliability_level,
                required: target,
                available: resulting,
            });
        }

        info!(
            "event=seed_selection level={} target={} kept={} added={} removed={} fault_domains={} upgrade_domains={} distinct_pairs={}",
            reliability_level,
            target,
            kept.len(),
            added.len(),
            removed.len(),
            fault_domain_count,
            upgrade_domain_count,
            spread.distinct_pairs()
        );

        Ok(SeedDelta {
            added,
            removed,
            target_seed_count: target,
        })
    }

    fn pick_addition(
        &self,
        remaining: &[&Node],
        spread: &DomainSpread,
        degenerate: bool,
    ) -> Option<usize> {
        remaining
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let key = |node: &Node| {
                    let preferred = !self.preferred.contains(&node.name);
                    if degenerate {
                        (0, 0, 0, preferred)
                    } else {
                        (
                            spread.pair_load(node),
                            spread.fault_domain_load(node),
                            spread.upgrade_domain_load(node),
                            preferred,
                        )
                    }
                };
                key(a).cmp(&key(b)).then_with(|| a.name.cmp(&b.name))
            })
            .map(|(idx, _)| idx)
    }

    fn pick_removal(&self, kept: &[Node], spread: &DomainSpread, degenerate: bool) -> usize {
        kept.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                let key = |node: &Node| {
                    if degenerate {
                        (0, 0, 0)
                    } else {
                        (
                            spread.pair_load(node),
                            spread.fault_domain_load(node),
                            spread.upgrade_domain_load(node),
                        )
                    }
                };
                key(a).cmp(&key(b)).then_with(|| a.name.cmp(&b.name))
            })
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}
