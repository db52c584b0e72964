//! Configuration loading.
//!
//! Hierarchical merge, lowest to highest precedence:
//! 1. programmatic defaults
//! 2. `.ensemble/config.yaml`
//! 3. `.ensemble/local.yaml`
//! 4. `ENSEMBLE_*` environment variables

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::{OrchestratorConfig, MIN_TIMEOUT_MS};

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    ReadFailed(String),

    #[error("Invalid default_timeout_ms: {0}. Must be at least {MIN_TIMEOUT_MS}")]
    InvalidTimeout(u64),

    #[error("Invalid retry_attempts: {0}. Must be at least 1")]
    InvalidRetryAttempts(u32),

    #[error("Invalid failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid half_open_attempts: {0}. Must be at least 1")]
    InvalidHalfOpenAttempts(u32),

    #[error("Invalid heartbeat_interval_ms: {0}. Must be positive")]
    InvalidHeartbeat(u64),

    #[error("Invalid claim_ttl_ms: {0}. Must be at least the heartbeat interval")]
    InvalidClaimTtl(u64),

    #[error("Invalid max_concurrency: {0}. Must be between 1 and 256")]
    InvalidMaxConcurrency(u32),

    #[error("Invalid retry backoff: initial {0} must not exceed max {1}")]
    InvalidBackoff(u64, u64),
}

/// Loader with the project-local layout.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `.ensemble/` in the current directory.
    pub fn load() -> Result<OrchestratorConfig, ConfigError> {
        Self::load_from(Path::new(".ensemble"))
    }

    /// Load from an explicit configuration directory.
    pub fn load_from(dir: &Path) -> Result<OrchestratorConfig, ConfigError> {
        let config: OrchestratorConfig = Figment::new()
            .merge(Serialized::defaults(OrchestratorConfig::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("ENSEMBLE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ReadFailed(e.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Range checks over the merged configuration.
    pub fn validate(config: &OrchestratorConfig) -> Result<(), ConfigError> {
        if config.engine.default_timeout_ms < MIN_TIMEOUT_MS {
            return Err(ConfigError::InvalidTimeout(config.engine.default_timeout_ms));
        }
        if config.engine.retry_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts(config.engine.retry_attempts));
        }
        if config.breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(
                config.breaker.failure_threshold,
            ));
        }
        if config.breaker.half_open_attempts == 0 {
            return Err(ConfigError::InvalidHalfOpenAttempts(
                config.breaker.half_open_attempts,
            ));
        }
        if config.retry.initial_delay_ms > config.retry.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_delay_ms,
                config.retry.max_delay_ms,
            ));
        }
        if config.cluster.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidHeartbeat(config.cluster.heartbeat_interval_ms));
        }
        if config.cluster.claim_ttl_ms < config.cluster.heartbeat_interval_ms {
            return Err(ConfigError::InvalidClaimTtl(config.cluster.claim_ttl_ms));
        }
        if config.cluster.max_concurrency == 0 || config.cluster.max_concurrency > 256 {
            return Err(ConfigError::InvalidMaxConcurrency(config.cluster.max_concurrency));
        }
        Ok(())
    }
}
