//! Scriptable mock assistant for tests and demos.
//!
//! Impersonates any adapter id, answers with a configurable response,
//! supports per-task overrides and a queue of scripted failures, and can
//! simulate latency.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{AdapterHealth, AdapterId, Task, TaskKind};
use crate::domain::ports::{AdapterOutput, AssistantAdapter};

/// One scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub output: String,
    pub tokens_used: u64,
    pub model: String,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            output: "Mock task completed successfully.".to_string(),
            tokens_used: 128,
            model: "mock-1".to_string(),
        }
    }
}

impl MockResponse {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }
}

/// Mock assistant adapter.
pub struct MockAssistant {
    id: AdapterId,
    supported: BTreeSet<TaskKind>,
    capabilities: Vec<String>,
    default_response: RwLock<MockResponse>,
    /// Responses keyed by task id, served before the default.
    overrides: RwLock<HashMap<Uuid, MockResponse>>,
    /// Errors served (front first) before any successful response.
    failure_queue: Mutex<VecDeque<OrchestratorError>>,
    latency: RwLock<Duration>,
    invocations: Mutex<Vec<Uuid>>,
    options: RwLock<HashMap<String, serde_json::Value>>,
}

impl MockAssistant {
    /// Mock supporting every task kind under the given id.
    pub fn new(id: AdapterId) -> Self {
        Self {
            id,
            supported: TaskKind::ALL.iter().copied().collect(),
            capabilities: vec!["mock".to_string()],
            default_response: RwLock::new(MockResponse::default()),
            overrides: RwLock::new(HashMap::new()),
            failure_queue: Mutex::new(VecDeque::new()),
            latency: RwLock::new(Duration::ZERO),
            invocations: Mutex::new(Vec::new()),
            options: RwLock::new(HashMap::new()),
        }
    }

    /// Restrict the supported kinds (builder).
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = TaskKind>) -> Self {
        self.supported = kinds.into_iter().collect();
        self
    }

    /// Declare capability tags (builder).
    pub fn with_capabilities(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.capabilities = tags.into_iter().collect();
        self
    }

    /// Set the default response (builder).
    pub fn with_response(mut self, response: MockResponse) -> Self {
        self.default_response = RwLock::new(response);
        self
    }

    /// Set the default response from an async context.
    pub async fn set_response(&self, response: MockResponse) {
        *self.default_response.write().await = response;
    }

    /// Script a response for one specific task.
    pub async fn set_response_for_task(&self, task_id: Uuid, response: MockResponse) {
        self.overrides.write().await.insert(task_id, response);
    }

    /// Queue an error; each queued error is served once, in order, before
    /// any success.
    pub async fn push_failure(&self, error: OrchestratorError) {
        self.failure_queue.lock().await.push_back(error);
    }

    /// Queue the same error `n` times.
    pub async fn push_failures(&self, error: OrchestratorError, n: usize) {
        let mut queue = self.failure_queue.lock().await;
        for _ in 0..n {
            queue.push_back(error.clone());
        }
    }

    /// Simulated invocation latency.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Task ids this mock has been invoked with, in order.
    pub async fn invocations(&self) -> Vec<Uuid> {
        self.invocations.lock().await.clone()
    }

    pub async fn invocation_count(&self) -> usize {
        self.invocations.lock().await.len()
    }
}

#[async_trait]
impl AssistantAdapter for MockAssistant {
    fn id(&self) -> AdapterId {
        self.id
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    fn supports(&self, kind: TaskKind) -> bool {
        self.supported.contains(&kind)
    }

    async fn invoke(&self, task: &Task) -> OrchestratorResult<AdapterOutput> {
        self.invocations.lock().await.push(task.id);

        let latency = *self.latency.read().await;
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.failure_queue.lock().await.pop_front() {
            return Err(error);
        }

        let response = {
            let overrides = self.overrides.read().await;
            match overrides.get(&task.id) {
                Some(r) => r.clone(),
                None => self.default_response.read().await.clone(),
            }
        };

        Ok(AdapterOutput::text(response.output)
            .with_tokens(response.tokens_used)
            .with_model(response.model))
    }

    async fn health(&self) -> AdapterHealth {
        AdapterHealth::healthy(1)
    }

    async fn configure(
        &self,
        options: HashMap<String, serde_json::Value>,
    ) -> OrchestratorResult<()> {
        self.options.write().await.extend(options);
        Ok(())
    }

    async fn configuration(&self) -> HashMap<String, serde_json::Value> {
        self.options.read().await.clone()
    }
}
