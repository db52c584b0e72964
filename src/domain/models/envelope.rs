//! Distributed queue envelope and claim records.
//!
//! An envelope wraps a task for the shared queue: submission timestamp,
//! effective priority, queue-level retry counter, and coarse status. A claim
//! record is the exclusive lease one node holds over a queued task.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::TaskResult;
use super::task::{Task, TaskPriority};

/// Task body TTL in the shared store: 24 hours.
pub const TASK_BODY_TTL_MS: u64 = 86_400_000;

/// Claim lease TTL: 300 seconds.
pub const CLAIM_TTL_MS: u64 = 300_000;

/// Maximum queue-level retries before a task is terminally failed.
pub const MAX_QUEUE_RETRIES: u32 = 3;

/// Coarse status of a task inside the distributed queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Envelope stored under `task:<id>` in the shared store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: Task,
    pub submitted_at: DateTime<Utc>,
    pub priority: TaskPriority,
    /// Queue-level retry counter. Independent of in-process retries.
    pub retry_count: u32,
    pub status: QueueStatus,
    /// Node currently (or last) processing this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Result persisted alongside the body on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        let priority = task.priority;
        Self {
            task,
            submitted_at: Utc::now(),
            priority,
            retry_count: 0,
            status: QueueStatus::Queued,
            node_id: None,
            started_at: None,
            result: None,
        }
    }

    /// Queue score: `now_ms − weight(priority)`.
    ///
    /// A heavier priority produces a smaller score, so the consumer pops the
    /// minimal score to serve the highest weight first; within one weight
    /// class, smaller means submitted earlier (best-effort FIFO).
    pub fn priority_score(&self) -> i64 {
        score_for(self.submitted_at, self.priority)
    }

    /// Recompute the score with a new priority, keeping the original
    /// submission timestamp so FIFO drift stays bounded.
    pub fn rescored(&self, priority: TaskPriority) -> i64 {
        score_for(self.submitted_at, priority)
    }

    /// Mark as claimed by a node.
    pub fn start_processing(&mut self, node_id: impl Into<String>) {
        self.status = QueueStatus::Processing;
        self.node_id = Some(node_id.into());
        self.started_at = Some(Utc::now());
    }

    /// Whether another queue-level retry is allowed.
    pub fn can_requeue(&self) -> bool {
        self.retry_count < MAX_QUEUE_RETRIES
    }
}

/// Compute a queue score for a submission instant and priority.
pub fn score_for(submitted_at: DateTime<Utc>, priority: TaskPriority) -> i64 {
    submitted_at.timestamp_millis() - priority.queue_weight()
}

/// Exclusive lease a node holds over a queued task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub task_id: Uuid,
    pub node_id: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl ClaimRecord {
    pub fn new(task_id: Uuid, node_id: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            task_id,
            node_id: node_id.into(),
            acquired_at: Utc::now(),
            ttl_ms,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.acquired_at + Duration::milliseconds(self.ttl_ms as i64)
    }

    /// An expired claim is an orphan: the task may be re-queued.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}
