use super::state::{ClusterId, UpgradeKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEvent {
    Proposed,
    Started,
    StepConverged,
    Completed,
    StepFailed,
    Interrupted,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub cluster_id: ClusterId,
    pub event: JournalEvent,
    pub kind: UpgradeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recorded_at: SystemTime,
}

impl JournalRecord {
    pub fn new(cluster_id: ClusterId, event: JournalEvent, kind: UpgradeKind, recorded_at: SystemTime) -> Self {
        Self {
            cluster_id,
            event,
            kind,
            manifest_version: None,
            reason: None,
            recorded_at,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.manifest_version = Some(version);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Bounded history of upgrade lifecycle events for operator visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeJournal {
    capacity: usize,
    entries: VecDeque<JournalRecord>,
}

impl UpgradeJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.clamp(1, 64)),
        }
    }

    /// Returns the evicted record once the buffer is full.
    pub fn record(&mut self, record: JournalRecord) -> Option<JournalRecord> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(record);
        evicted
    }

    pub fn latest(&self) -> Option<&JournalRecord> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JournalRecord> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<JournalRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
