//! Default timing knobs for delegated lookups.
//!
//! The planner never polls on its own; these values only seed
//! `OrchestratorConfig` when a deployment does not override them.

use std::time::Duration;

/// Per-node deadline handed to the liveness lookup.
pub const LIVENESS_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
/// Attempts per node before a liveness lookup counts as unreachable.
pub const LIVENESS_RETRY_ATTEMPTS: usize = 3;
pub const LIVENESS_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
pub const LIVENESS_RETRY_MAX_DELAY: Duration = Duration::from_secs(5);
pub const LIVENESS_RETRY_JITTER: f64 = 0.2;

/// Advisory cadence for the external reconciliation loop. Handed back to the
/// caller, never slept on here.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(15);
