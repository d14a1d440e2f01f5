//! Node topology snapshots and the checks that run on them before any seed
//! selection happens.

mod diff;
mod node;
mod validate;

pub use diff::{added_nodes, removed_nodes, TopologyDiff};
pub use node::{DomainPair, Node, Topology, TopologyError};
pub use validate::{is_valid_address, is_valid_node_name, validate_topology, verify_node_identities};
