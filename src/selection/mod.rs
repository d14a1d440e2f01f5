//! Seed node selection across fault and upgrade domains.

mod seed;
mod spread;

pub use seed::{SeedDelta, SeedNodeSelector, SelectionError, MIN_QUORUM_SEED_COUNT};
pub use spread::DomainSpread;
