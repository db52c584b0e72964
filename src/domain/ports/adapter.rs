//! Assistant adapter port: the contract each back-end assistant fulfils.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::{AdapterHealth, AdapterId, Task, TaskKind};

/// Raw output of one adapter invocation, before it is wrapped into a
/// [`TaskResult`](crate::domain::models::TaskResult).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterOutput {
    pub output: String,
    pub tokens_used: Option<u64>,
    pub model: Option<String>,
    pub retry_count: Option<u32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AdapterOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Trait every back-end assistant implements.
///
/// Invocation errors must be categorised
/// ([`OrchestratorError`](crate::domain::error::OrchestratorError) variants)
/// so the retry manager can classify them on code alone.
#[async_trait]
pub trait AssistantAdapter: Send + Sync {
    /// Adapter identifier. Closed set.
    fn id(&self) -> AdapterId;

    /// Declared capability tags.
    fn capabilities(&self) -> Vec<String>;

    /// Whether this adapter may execute tasks of the given kind.
    fn supports(&self, kind: TaskKind) -> bool;

    /// Run the task to completion and return the raw output.
    async fn invoke(&self, task: &Task) -> OrchestratorResult<AdapterOutput>;

    /// Probe backend health.
    async fn health(&self) -> AdapterHealth;

    /// Apply runtime options.
    async fn configure(
        &self,
        options: HashMap<String, serde_json::Value>,
    ) -> OrchestratorResult<()>;

    /// Current runtime options.
    async fn configuration(&self) -> HashMap<String, serde_json::Value>;
}
