//! Shared error aggregation and retry policies.

pub mod error;
pub mod retry;

pub use error::{ErrorClass, UpgradeError};
pub use retry::{RetryHandle, RetryPolicy, RetryStrategy};
