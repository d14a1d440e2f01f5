//! Deployment configuration for the planner.

use crate::timeouts::{
    LIVENESS_CHECK_TIMEOUT, LIVENESS_RETRY_ATTEMPTS, LIVENESS_RETRY_BASE_DELAY,
    LIVENESS_RETRY_JITTER, LIVENESS_RETRY_MAX_DELAY, RECONCILE_INTERVAL,
};
use crate::util::{RetryPolicy, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// System services that receive replica-set sizing unless overridden.
pub const DEFAULT_SYSTEM_SERVICES: &[&str] = &[
    "ClusterManager",
    "FailoverManager",
    "NamingService",
    "FileStoreService",
];
/// Port gap between logical nodes sharing one machine.
pub const DEFAULT_PORT_STRIDE: u16 = 10;
pub const DEFAULT_JOURNAL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config-read",
            ConfigError::Parse { .. } => "config-parse",
            ConfigError::Invalid(_) => "config-invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub strategy: RetryStrategy,
    pub max_attempts: usize,
    #[serde(with = "millis")]
    pub base_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Exponential,
            max_attempts: LIVENESS_RETRY_ATTEMPTS,
            base_delay: LIVENESS_RETRY_BASE_DELAY,
            max_delay: LIVENESS_RETRY_MAX_DELAY,
            jitter: LIVENESS_RETRY_JITTER,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.strategy, self.max_attempts, self.base_delay)
            .with_max_delay(self.max_delay)
            .with_jitter(self.jitter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    #[serde(with = "millis")]
    pub liveness_timeout: Duration,
    pub liveness_retry: RetrySettings,
    #[serde(with = "millis")]
    pub reconcile_interval: Duration,
    pub port_stride: u16,
    pub system_services: Vec<String>,
    pub journal_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: LIVENESS_CHECK_TIMEOUT,
            liveness_retry: RetrySettings::default(),
            reconcile_interval: RECONCILE_INTERVAL,
            port_stride: DEFAULT_PORT_STRIDE,
            system_services: DEFAULT_SYSTEM_SERVICES
                .iter()
                .map(|service| service.to_string())
                .collect(),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        log::info!(
            "event=config_loaded path={} liveness_timeout_ms={} retry_attempts={} port_stride={}",
            path.display(),
            config.liveness_timeout.as_millis(),
            config.liveness_retry.max_attempts,
            config.port_stride
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness_timeout.is_zero() {
            return Err(ConfigError::Invalid("liveness_timeout must be non-zero".into()));
        }
        if self.liveness_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "liveness_retry.max_attempts must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.liveness_retry.jitter) {
            return Err(ConfigError::Invalid(
                "liveness_retry.jitter must be within [0, 1]".into(),
            ));
        }
        if self.port_stride == 0 {
            return Err(ConfigError::Invalid("port_stride must be non-zero".into()));
        }
        if self.system_services.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("system service names must be non-empty".into()));
        }
        if self.journal_capacity == 0 {
            return Err(ConfigError::Invalid("journal_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
