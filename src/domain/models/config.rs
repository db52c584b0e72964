//! Orchestrator configuration model.
//!
//! All recognised knobs live here as serde structs; the figment loader in
//! `infrastructure::config` merges defaults, YAML files, and `ENSEMBLE_*`
//! environment variables into one [`OrchestratorConfig`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::adapter::AdapterId;
use super::envelope::CLAIM_TTL_MS;
use super::node::HEARTBEAT_INTERVAL_MS;
use super::task::TaskKind;

/// Router configuration: strategy chain and preferred-adapter table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Strategy names in priority order (first wins).
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
    /// Static preferred adapter per task kind (rule table).
    #[serde(default = "default_rule_table")]
    pub preferred_by_kind: HashMap<TaskKind, AdapterId>,
    /// Prompt length at which the complexity strategy engages.
    #[serde(default = "default_long_prompt_chars")]
    pub long_prompt_chars: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            preferred_by_kind: default_rule_table(),
            long_prompt_chars: default_long_prompt_chars(),
        }
    }
}

fn default_strategies() -> Vec<String> {
    vec![
        "rule_based".to_string(),
        "complexity_based".to_string(),
        "performance_based".to_string(),
    ]
}

fn default_rule_table() -> HashMap<TaskKind, AdapterId> {
    let mut table = HashMap::new();
    for kind in TaskKind::ALL {
        let adapter = match kind {
            TaskKind::Multimodal | TaskKind::Search => AdapterId::Gemini,
            _ => AdapterId::Claude,
        };
        table.insert(kind, adapter);
    }
    table
}

fn default_long_prompt_chars() -> usize {
    1_500
}

/// Execution engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Run the validator on every successful execution.
    #[serde(default)]
    pub validate_after_success: bool,
    /// Extra error codes treated as retryable (allow list).
    #[serde(default)]
    pub retryable_codes: Vec<String>,
    /// Error codes never retried (deny list; wins over the allow list).
    #[serde(default)]
    pub non_retryable_codes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            validate_after_success: false,
            retryable_codes: Vec::new(),
            non_retryable_codes: Vec::new(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_attempts() -> u32 {
    3
}

/// Circuit breaker configuration, shared by all keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long an open circuit blocks before admitting a probe.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    /// Consecutive half-open successes required to close.
    #[serde(default = "default_half_open_attempts")]
    pub half_open_attempts: u32,
    /// Sliding window over which outcomes are kept for observation.
    #[serde(default = "default_monitoring_window_ms")]
    pub monitoring_window_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            half_open_attempts: default_half_open_attempts(),
            monitoring_window_ms: default_monitoring_window_ms(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_ms() -> u64 {
    60_000
}

fn default_half_open_attempts() -> u32 {
    3
}

fn default_monitoring_window_ms() -> u64 {
    60_000
}

/// Retry/backoff configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter fraction applied symmetrically around the computed delay.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> f64 {
    0.2
}

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL per task kind; kinds not listed fall back to `default_ttl_ms`.
    #[serde(default)]
    pub ttl_per_kind_ms: HashMap<TaskKind, u64>,
    #[serde(default = "default_cache_ttl_ms")]
    pub default_ttl_ms: u64,
    #[serde(default)]
    pub enable_compression: bool,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_bytes: usize,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_per_kind_ms: HashMap::new(),
            default_ttl_ms: default_cache_ttl_ms(),
            enable_compression: false,
            compression_threshold_bytes: default_compression_threshold(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl CacheConfig {
    /// Resolve the TTL for a task kind.
    pub fn ttl_for(&self, kind: TaskKind) -> u64 {
        self.ttl_per_kind_ms.get(&kind).copied().unwrap_or(self.default_ttl_ms)
    }
}

fn default_cache_ttl_ms() -> u64 {
    3_600_000
}

fn default_compression_threshold() -> usize {
    4_096
}

fn default_key_prefix() -> String {
    "ensemble".to_string()
}

/// Cluster / distributed coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Node id; auto-generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_claim_ttl_ms")]
    pub claim_ttl_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
    /// Idle sleep between empty queue polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            heartbeat_interval_ms: default_heartbeat_ms(),
            claim_ttl_ms: default_claim_ttl_ms(),
            max_concurrency: default_max_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_heartbeat_ms() -> u64 {
    HEARTBEAT_INTERVAL_MS
}

fn default_claim_ttl_ms() -> u64 {
    CLAIM_TTL_MS
}

fn default_max_concurrency() -> u32 {
    4
}

fn default_poll_interval_ms() -> u64 {
    250
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_knob_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.engine.default_timeout_ms, 30_000);
        assert_eq!(config.engine.retry_attempts, 3);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.reset_timeout_ms, 60_000);
        assert_eq!(config.breaker.half_open_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 1_000);
        assert!((config.retry.multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.cluster.heartbeat_interval_ms, 10_000);
        assert_eq!(config.cluster.claim_ttl_ms, 300_000);
    }

    #[test]
    fn test_rule_table_covers_every_kind() {
        let table = default_rule_table();
        for kind in TaskKind::ALL {
            assert!(table.contains_key(&kind), "missing rule for {kind:?}");
        }
        assert_eq!(table[&TaskKind::Multimodal], AdapterId::Gemini);
        assert_eq!(table[&TaskKind::Refactoring], AdapterId::Claude);
    }

    #[test]
    fn test_cache_ttl_fallback() {
        let mut config = CacheConfig::default();
        config.ttl_per_kind_ms.insert(TaskKind::Search, 60_000);
        assert_eq!(config.ttl_for(TaskKind::Search), 60_000);
        assert_eq!(config.ttl_for(TaskKind::Testing), config.default_ttl_ms);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = OrchestratorConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: OrchestratorConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, back);
    }
}
