use serde::Serialize;
use std::collections::BTreeMap;

/// Counters, gauges and histograms published by a cluster resource. Every
/// name is stored under the registry namespace, so `upgrade.completed` and
/// `toposhift.upgrade.completed` address the same series.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    prefix: String,
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
    histograms: BTreeMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            prefix: format!("{}.", namespace.trim_end_matches('.')),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
            histograms: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        self.prefix.trim_end_matches('.')
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, delta: u64) -> u64 {
        let series = self.counters.entry(self.series(name.into())).or_insert(0);
        *series = series.saturating_add(delta);
        *series
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: u64) {
        self.gauges.insert(self.series(name.into()), value);
    }

    /// Records `value` into the named histogram. The first observation fixes
    /// the bucket layout with `max_value` as the top bound.
    pub fn observe(&mut self, name: impl Into<String>, max_value: u64, value: u64) {
        self.histograms
            .entry(self.series(name.into()))
            .or_insert_with(|| Histogram::up_to(max_value))
            .observe(value);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .get(&self.series(name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.get(&self.series(name.to_string())).copied()
    }

    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(&self.series(name.to_string()))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.clone(),
            gauges: self.gauges.clone(),
            histograms: self
                .histograms
                .iter()
                .map(|(name, histogram)| (name.clone(), histogram.clone()))
                .collect(),
        }
    }

    fn series(&self, name: String) -> String {
        if name.starts_with(&self.prefix) {
            name
        } else {
            format!("{}{}", self.prefix, name)
        }
    }
}

/// Fixed-bucket histogram. Bounds grow by half each step from 1 to the
/// maximum; values above the top bound land in the last bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Histogram {
    bounds: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn up_to(max_value: u64) -> Self {
        let top = max_value.max(1);
        let mut bounds = vec![1];
        while let Some(&last) = bounds.last() {
            if last >= top {
                break;
            }
            let next = (last + last.div_ceil(2)).min(top);
            bounds.push(next);
        }
        let counts = vec![0; bounds.len()];
        Self { bounds, counts }
    }

    pub fn observe(&mut self, value: u64) {
        let slot = self
            .bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.bounds.len() - 1);
        self.counts[slot] = self.counts[slot].saturating_add(1);
    }

    pub fn bounds(&self) -> &[u64] {
        &self.bounds
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, Histogram>,
}
