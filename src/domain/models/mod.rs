//! Domain models for the Ensemble orchestration core.

pub mod adapter;
pub mod config;
pub mod envelope;
pub mod feedback;
pub mod node;
pub mod result;
pub mod task;

pub use adapter::{AdapterHealth, AdapterId, AdapterProfile, HealthStatus};
pub use config::{
    BreakerConfig, CacheConfig, ClusterConfig, EngineConfig, LogConfig, LogFormat,
    OrchestratorConfig, RetryConfig, RouterConfig,
};
pub use envelope::{
    score_for, ClaimRecord, QueueStatus, TaskEnvelope, CLAIM_TTL_MS, MAX_QUEUE_RETRIES,
    TASK_BODY_TTL_MS,
};
pub use feedback::{FeedbackRecord, RoutingAggregate};
pub use node::{NodeRecord, NodeStatus, HEARTBEAT_INTERVAL_MS, NODE_TTL_MS};
pub use result::{ResultMetadata, TaskResult};
pub use task::{
    Task, TaskConstraints, TaskKind, TaskMetadata, TaskPriority, TaskStatus, MAX_PROMPT_CHARS,
    MIN_TIMEOUT_MS,
};
