//! Coordination store port: the shared state backing the distributed
//! coordinator.
//!
//! The layout mirrors a Redis-style deployment: task bodies under
//! `task:<id>` with TTL, an ordered queue scored by priority, claim leases
//! under `task:claim:<id>`, node leases under `node:<id>`, an active-node
//! set, and pub/sub channels. Implementations must make `submit` and
//! `claim_next` atomic: no two nodes may observe a successful claim for the
//! same task id while a lease is live.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::{ClaimRecord, NodeRecord, TaskEnvelope, TaskPriority};

/// Message published on the cluster pub/sub channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClusterMessage {
    TaskSubmitted { task_id: Uuid, node_id: String },
    TaskCompleted { task_id: Uuid, node_id: String },
    NodeFailover { failed_node_id: String },
    PriorityUpdate { task_id: Uuid, priority: TaskPriority },
    Rebalance { active_nodes: usize },
}

impl ClusterMessage {
    /// Pub/sub channel this message travels on.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::TaskSubmitted { .. } => "task:submitted",
            Self::TaskCompleted { .. } => "task:completed",
            Self::NodeFailover { .. } => "node:failover",
            Self::PriorityUpdate { .. } => "task:priority_update",
            Self::Rebalance { .. } => "cluster:rebalance",
        }
    }
}

/// Shared state operations used by the distributed coordinator.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Atomically write the task body, insert it into the queue with the
    /// given score, and publish `task:submitted`.
    async fn submit(
        &self,
        envelope: &TaskEnvelope,
        body_ttl_ms: u64,
        score: i64,
        node_id: &str,
    ) -> OrchestratorResult<()>;

    async fn get_envelope(&self, task_id: Uuid) -> OrchestratorResult<Option<TaskEnvelope>>;

    /// Update the body in place, preserving its TTL.
    async fn update_envelope(&self, envelope: &TaskEnvelope) -> OrchestratorResult<()>;

    /// Re-insert a task into the queue with a fresh score (re-queue path).
    async fn enqueue(&self, task_id: Uuid, score: i64) -> OrchestratorResult<()>;

    /// Drop a task from the queue without claiming it (cancellation path).
    /// Returns whether the task was queued.
    async fn remove_from_queue(&self, task_id: Uuid) -> OrchestratorResult<bool>;

    /// Re-score a queued entry in place. Returns false when the task is not
    /// currently queued.
    async fn rescore(&self, task_id: Uuid, score: i64) -> OrchestratorResult<bool>;

    async fn queue_len(&self) -> OrchestratorResult<usize>;

    /// Atomically pop the best-scored entry and write a claim lease for
    /// `node_id`. Returns `None` when the queue is empty.
    async fn claim_next(
        &self,
        node_id: &str,
        claim_ttl_ms: u64,
    ) -> OrchestratorResult<Option<Uuid>>;

    async fn release_claim(&self, task_id: Uuid) -> OrchestratorResult<()>;

    /// All claim records, live and expired; callers decide what is orphaned.
    async fn claims(&self) -> OrchestratorResult<Vec<ClaimRecord>>;

    /// Refresh this node's lease and load snapshot.
    async fn heartbeat(&self, node: &NodeRecord, ttl_ms: u64) -> OrchestratorResult<()>;

    /// Node record, or `None` once its lease has expired.
    async fn get_node(&self, node_id: &str) -> OrchestratorResult<Option<NodeRecord>>;

    /// Ids in the active set (whether or not their lease is still live).
    async fn active_nodes(&self) -> OrchestratorResult<Vec<String>>;

    /// Drop a node from the active set.
    async fn remove_node(&self, node_id: &str) -> OrchestratorResult<()>;

    async fn publish(&self, message: ClusterMessage) -> OrchestratorResult<()>;

    /// Subscribe to all cluster messages. Callers filter by
    /// [`ClusterMessage::channel`].
    fn subscribe(&self) -> broadcast::Receiver<ClusterMessage>;
}
