use crate::config::ConfigError;
use crate::manifest::{ManifestError, SequenceError};
use crate::selection::SelectionError;
use crate::upgrade::{LifecycleError, StepFailure, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = UpgradeError> = std::result::Result<T, E>;

/// Coarse grouping automation uses to pick between retry and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// A precondition is unmet; committed state is untouched.
    Validation,
    /// No safe seed diff exists; the upgrade never started.
    Selection,
    /// A pushed manifest did not converge.
    Step,
    /// The request does not fit the current lifecycle state.
    Lifecycle,
    Config,
}

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Sequence(SequenceError),
    #[error(transparent)]
    Step(#[from] StepFailure),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<SequenceError> for UpgradeError {
    fn from(err: SequenceError) -> Self {
        match err {
            SequenceError::Selection(err) => UpgradeError::Selection(err),
            SequenceError::Manifest(err) => UpgradeError::Manifest(err),
            other => UpgradeError::Sequence(other),
        }
    }
}

impl UpgradeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            UpgradeError::Validation(_) | UpgradeError::Manifest(_) => ErrorClass::Validation,
            UpgradeError::Selection(_) | UpgradeError::Sequence(_) => ErrorClass::Selection,
            UpgradeError::Step(_) => ErrorClass::Step,
            UpgradeError::Lifecycle(_) => ErrorClass::Lifecycle,
            UpgradeError::Config(_) => ErrorClass::Config,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            UpgradeError::Validation(err) => err.code(),
            UpgradeError::Selection(err) => err.code(),
            UpgradeError::Manifest(err) => err.code(),
            UpgradeError::Sequence(err) => err.code(),
            UpgradeError::Step(err) => err.code(),
            UpgradeError::Lifecycle(err) => err.code(),
            UpgradeError::Config(err) => err.code(),
        }
    }

    /// Whether the same request may succeed later without being changed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpgradeError::Validation(err) => err.is_retryable(),
            UpgradeError::Manifest(ManifestError::Lookup(err)) => err.is_transient(),
            UpgradeError::Step(_) => true,
            UpgradeError::Lifecycle(LifecycleError::UpgradeInFlight(_)) => true,
            _ => false,
        }
    }
}
