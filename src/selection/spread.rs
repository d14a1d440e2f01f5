use crate::topology::{DomainPair, Node};
use std::collections::HashMap;

/// Running per-domain seed counts used to rank candidates.
#[derive(Debug, Clone, Default)]
pub struct DomainSpread {
    by_fault_domain: HashMap<String, usize>,
    by_upgrade_domain: HashMap<String, usize>,
    by_pair: HashMap<DomainPair, usize>,
}

impl DomainSpread {
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let mut spread = Self::default();
        for node in nodes {
            spread.record(node);
        }
        spread
    }

    pub fn record(&mut self, node: &Node) {
        *self
            .by_fault_domain
            .entry(node.fault_domain.clone())
            .or_insert(0) += 1;
        *self
            .by_upgrade_domain
            .entry(node.upgrade_domain.clone())
            .or_insert(0) += 1;
        *self.by_pair.entry(node.domain_pair()).or_insert(0) += 1;
    }

    pub fn forget(&mut self, node: &Node) {
        decrement(&mut self.by_fault_domain, &node.fault_domain);
        decrement(&mut self.by_upgrade_domain, &node.upgrade_domain);
        if let Some(count) = self.by_pair.get_mut(&node.domain_pair()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.by_pair.remove(&node.domain_pair());
            }
        }
    }

    pub fn fault_domain_load(&self, node: &Node) -> usize {
        self.by_fault_domain
            .get(&node.fault_domain)
            .copied()
            .unwrap_or(0)
    }

    pub fn upgrade_domain_load(&self, node: &Node) -> usize {
        self.by_upgrade_domain
            .get(&node.upgrade_domain)
            .copied()
            .unwrap_or(0)
    }

    pub fn pair_load(&self, node: &Node) -> usize {
        self.by_pair.get(&node.domain_pair()).copied().unwrap_or(0)
    }

    pub fn distinct_pairs(&self) -> usize {
        self.by_pair.len()
    }

    pub fn distinct_fault_domains(&self) -> usize {
        self.by_fault_domain.len()
    }
}

fn decrement(map: &mut HashMap<String, usize>, key: &str) {
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            map.remove(key);
        }
    }
}
