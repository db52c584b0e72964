//! Task repository and result sink ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::{Task, TaskResult};

/// Node-local task storage driven by the execution engine.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, task: &Task) -> OrchestratorResult<()>;

    async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Task>>;

    /// Replace the stored task. Fails when the id is unknown.
    async fn update(&self, task: &Task) -> OrchestratorResult<()>;

    async fn list(&self) -> OrchestratorResult<Vec<Task>>;
}

/// Sink the execution engine persists results into.
///
/// `record` upserts by result id. A task may accumulate several results
/// (claim-expiry re-runs produce duplicates consumers must tolerate).
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, result: &TaskResult) -> OrchestratorResult<()>;

    async fn results_for(&self, task_id: Uuid) -> OrchestratorResult<Vec<TaskResult>>;
}
