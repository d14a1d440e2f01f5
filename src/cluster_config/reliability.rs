use serde::{Deserialize, Serialize};
use std::fmt;

/// Named durability tier. Each tier maps monotonically to the number of seed
/// nodes the consensus layer should run with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ReliabilityLevel {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// Replica-set sizing handed to system services for a reliability level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSetSize {
    pub min: usize,
    pub target: usize,
}

impl ReliabilityLevel {
    pub const ALL: [ReliabilityLevel; 5] = [
        ReliabilityLevel::None,
        ReliabilityLevel::Bronze,
        ReliabilityLevel::Silver,
        ReliabilityLevel::Gold,
        ReliabilityLevel::Platinum,
    ];

    pub fn seed_node_count(self) -> usize {
        match self {
            ReliabilityLevel::None => 0,
            ReliabilityLevel::Bronze => 3,
            ReliabilityLevel::Silver => 5,
            ReliabilityLevel::Gold => 7,
            ReliabilityLevel::Platinum => 9,
        }
    }

    /// Seed count after capping at the size of the candidate pool.
    pub fn capped_seed_count(self, candidates: usize) -> usize {
        self.seed_node_count().min(candidates)
    }

    pub fn replica_set_size(self) -> ReplicaSetSize {
        let (min, target) = match self {
            ReliabilityLevel::None => (1, 1),
            ReliabilityLevel::Bronze => (3, 3),
            ReliabilityLevel::Silver => (3, 5),
            ReliabilityLevel::Gold => (5, 7),
            ReliabilityLevel::Platinum => (5, 9),
        };
        ReplicaSetSize { min, target }
    }

    /// Level an autoscaling cluster converges to for a given primary node count.
    pub fn for_primary_node_count(nodes: usize) -> Self {
        match nodes {
            0..=2 => ReliabilityLevel::None,
            3..=4 => ReliabilityLevel::Bronze,
            5..=6 => ReliabilityLevel::Silver,
            7..=8 => ReliabilityLevel::Gold,
            _ => ReliabilityLevel::Platinum,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReliabilityLevel::None => "None",
            ReliabilityLevel::Bronze => "Bronze",
            ReliabilityLevel::Silver => "Silver",
            ReliabilityLevel::Gold => "Gold",
            ReliabilityLevel::Platinum => "Platinum",
        }
    }
}

impl fmt::Display for ReliabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
