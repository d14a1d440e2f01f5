use super::types::ManifestError;
use serde::{Deserialize, Serialize};

/// Per-cluster manifest version counter. Versions are handed out strictly
/// increasing and are never handed out twice, including versions that were
/// allocated for sequences that later failed or were rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestVersionAllocator {
    last_allocated: u64,
}

impl ManifestVersionAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes after a version that is already in use.
    pub fn starting_after(last_allocated: u64) -> Self {
        Self { last_allocated }
    }

    /// Fails once the counter has handed out `u64::MAX`; the counter is left
    /// untouched so the last version is not reissued.
    pub fn allocate(&mut self) -> Result<u64, ManifestError> {
        let next = self
            .peek_next()
            .ok_or(ManifestError::VersionExhausted(self.last_allocated))?;
        self.last_allocated = next;
        Ok(next)
    }

    /// Zero until the first allocation.
    pub fn last_allocated(&self) -> u64 {
        self.last_allocated
    }

    pub fn peek_next(&self) -> Option<u64> {
        self.last_allocated.checked_add(1)
    }
}
