//! In-memory task repository and result sink.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{Task, TaskResult};
use crate::domain::ports::{ResultSink, TaskRepository};

/// In-memory task store.
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: &Task) -> OrchestratorResult<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> OrchestratorResult<()> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&task.id) {
            return Err(OrchestratorError::TaskNotFound(task.id));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn list(&self) -> OrchestratorResult<Vec<Task>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }
}

/// In-memory result sink keeping the full per-task history.
///
/// Claim-expiry re-runs may record more than one result per task; the
/// history preserves them all, in insertion order.
pub struct InMemoryResultSink {
    by_task: RwLock<HashMap<Uuid, Vec<TaskResult>>>,
}

impl InMemoryResultSink {
    pub fn new() -> Self {
        Self {
            by_task: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of stored results across all tasks.
    pub async fn len(&self) -> usize {
        self.by_task.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryResultSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultSink for InMemoryResultSink {
    async fn record(&self, result: &TaskResult) -> OrchestratorResult<()> {
        let mut by_task = self.by_task.write().await;
        let history = by_task.entry(result.task_id).or_default();
        // Upsert by result id.
        match history.iter_mut().find(|r| r.id == result.id) {
            Some(existing) => *existing = result.clone(),
            None => history.push(result.clone()),
        }
        Ok(())
    }

    async fn results_for(&self, task_id: Uuid) -> OrchestratorResult<Vec<TaskResult>> {
        Ok(self
            .by_task
            .read()
            .await
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }
}
