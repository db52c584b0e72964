//! Cluster node record.
//!
//! Each node leases `node:<id>` in the shared store; the lease TTL is about
//! six heartbeat intervals, so a handful of missed beats marks the node dead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default heartbeat interval.
pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;

/// Node lease TTL. ≈ 6× the heartbeat interval.
pub const NODE_TTL_MS: u64 = 60_000;

/// Lifecycle status of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Initializing,
    Active,
    Draining,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Failed => "failed",
        }
    }
}

/// Record a node publishes about itself on every heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub hostname: String,
    pub capabilities: Vec<String>,
    pub status: NodeStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub tasks_processed: u64,
    pub current_load: u32,
    pub max_concurrency: u32,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, hostname: impl Into<String>, max_concurrency: u32) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            capabilities: Vec::new(),
            status: NodeStatus::Initializing,
            last_heartbeat: Utc::now(),
            tasks_processed: 0,
            current_load: 0,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Whether this node can accept more work.
    pub fn has_capacity(&self) -> bool {
        self.status == NodeStatus::Active && self.current_load < self.max_concurrency
    }

    /// Stamp a fresh heartbeat with the current load snapshot.
    pub fn beat(&mut self, current_load: u32, tasks_processed: u64) {
        self.last_heartbeat = Utc::now();
        self.current_load = current_load;
        self.tasks_processed = tasks_processed;
    }
}
