//! Execution engine.
//!
//! Runs one adapter invocation for one task with a timeout race, optional
//! retry, a per-kind circuit breaker, optional validation, and learning
//! feedback. Task status transitions and lifecycle events bracket every
//! execution.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adapters::assistants::AdapterRegistry;
use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{
    AdapterId, CacheConfig, EngineConfig, FeedbackRecord, ResultMetadata, Task, TaskResult,
    TaskStatus,
};
use crate::domain::ports::{CacheWriteOptions, ResultCache, ResultSink, TaskRepository};

use super::circuit_breaker::CircuitBreakerService;
use super::event_bus::{EventBus, OrchestratorEvent};
use super::learning::LearningLoop;
use super::retry::RetryPolicy;
use super::router::TaskRouter;
use super::validator::ResultValidator;

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Skip routing and use this adapter.
    pub force_adapter: Option<AdapterId>,
    /// Additional timeout cap for this call.
    pub timeout_ms: Option<u64>,
    /// Run the retry manager on retryable errors.
    pub retry: bool,
    /// Run the validator on success.
    pub validate: bool,
}

impl ExecutionOptions {
    pub fn with_retry(mut self) -> Self {
        self.retry = true;
        self
    }

    pub fn with_validation(mut self) -> Self {
        self.validate = true;
        self
    }

    pub fn with_adapter(mut self, adapter: AdapterId) -> Self {
        self.force_adapter = Some(adapter);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// The execution engine. All collaborators are explicit handles wired at
/// startup; there are no global singletons.
pub struct ExecutionEngine {
    tasks: Arc<dyn TaskRepository>,
    results: Arc<dyn ResultSink>,
    registry: Arc<AdapterRegistry>,
    router: Arc<RwLock<TaskRouter>>,
    breakers: Arc<CircuitBreakerService>,
    retry_policy: RetryPolicy,
    validator: Arc<ResultValidator>,
    bus: Arc<EventBus>,
    learning: Arc<LearningLoop>,
    cache: Option<(Arc<dyn ResultCache>, CacheConfig)>,
    config: EngineConfig,
}

impl ExecutionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        results: Arc<dyn ResultSink>,
        registry: Arc<AdapterRegistry>,
        router: Arc<RwLock<TaskRouter>>,
        breakers: Arc<CircuitBreakerService>,
        retry_policy: RetryPolicy,
        validator: Arc<ResultValidator>,
        bus: Arc<EventBus>,
        learning: Arc<LearningLoop>,
        config: EngineConfig,
    ) -> Self {
        let retry_policy = retry_policy
            .with_attempts(config.retry_attempts)
            .with_code_lists(config.retryable_codes.clone(), config.non_retryable_codes.clone());
        Self {
            tasks,
            results,
            registry,
            router,
            breakers,
            retry_policy,
            validator,
            bus,
            learning,
            cache: None,
            config,
        }
    }

    /// Attach a cache populated with successful outputs (builder).
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>, cache_config: CacheConfig) -> Self {
        self.cache = Some((cache, cache_config));
        self
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn tasks(&self) -> &Arc<dyn TaskRepository> {
        &self.tasks
    }

    pub fn results(&self) -> &Arc<dyn ResultSink> {
        &self.results
    }

    /// Execute a task.
    ///
    /// On success the task ends Completed (or Validated when validation ran
    /// and passed) and the result is returned. On failure the task ends
    /// Failed, an error result is persisted, and the final error surfaces.
    pub async fn execute(
        &self,
        task_id: Uuid,
        options: ExecutionOptions,
    ) -> OrchestratorResult<TaskResult> {
        // 1. Load and move to InProgress.
        let mut task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(OrchestratorError::TaskNotFound(task_id))?;
        task.transition_to(TaskStatus::InProgress)?;
        self.tasks.update(&task).await?;
        self.bus.publish(OrchestratorEvent::TaskStarted {
            task_id,
            ts: Utc::now(),
        });

        // 2. Choose the adapter.
        let adapter_id = match options.force_adapter {
            Some(forced) => forced,
            None => {
                let hints = self.learning.strong_hints().await;
                let snapshot = self.registry.routing_snapshot(hints).await;
                let router = self.router.read().await;
                match router.route(&task, &snapshot) {
                    Ok(decision) => {
                        tracing::debug!(
                            task_id = %task_id,
                            adapter = %decision.adapter,
                            confidence = decision.confidence,
                            reason = %decision.reason,
                            "routed task"
                        );
                        decision.adapter
                    }
                    Err(err) => return self.fail(task, None, err).await,
                }
            }
        };
        let adapter = match self.registry.get(adapter_id).await {
            Ok(adapter) => adapter,
            Err(err) => return self.fail(task, Some(adapter_id), err).await,
        };

        // 3. Invoke under timeout, breaker, and (optionally) retry.
        let timeout_ms =
            task.effective_timeout_ms(options.timeout_ms, self.config.default_timeout_ms);
        let breaker_key = format!("task:{}", task.kind);
        let started = Instant::now();

        let (outcome, attempts_used) = {
            let attempt = || async {
                self.breakers.check(&breaker_key).await?;
                let invocation =
                    tokio::time::timeout(Duration::from_millis(timeout_ms), adapter.invoke(&task))
                        .await;
                let outcome = match invocation {
                    Ok(result) => result,
                    Err(_) => Err(OrchestratorError::ExecutionTimeout(timeout_ms)),
                };
                match outcome {
                    Ok(output) => {
                        self.breakers.record_success(&breaker_key).await;
                        Ok(output)
                    }
                    Err(err) => {
                        self.breakers.record_failure(&breaker_key).await;
                        Err(err)
                    }
                }
            };

            if options.retry {
                let mut used = 0u32;
                let result = self
                    .retry_policy
                    .execute(|| {
                        used += 1;
                        attempt()
                    })
                    .await;
                (result, used)
            } else {
                (attempt().await, 1u32)
            }
        };
        let execution_time_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                // 4. Wrap and persist.
                let mut result = TaskResult::success(task_id, adapter_id, output.output)
                    .with_metadata(ResultMetadata {
                        execution_time_ms,
                        tokens_used: output.tokens_used,
                        model: output.model,
                        retry_count: attempts_used.saturating_sub(1),
                        ..Default::default()
                    });
                self.results.record(&result).await?;

                // 5. Task → Completed.
                task.transition_to(TaskStatus::Completed)?;
                self.tasks.update(&task).await?;
                self.bus.publish(OrchestratorEvent::TaskCompleted {
                    task_id,
                    result_id: result.id,
                    adapter: adapter_id,
                    success: true,
                    ts: Utc::now(),
                });

                // 6. Optional validation. Sub-threshold is reported, never
                // fatal.
                if options.validate || self.config.validate_after_success {
                    let outcome = self.validator.validate(&result, &task);
                    result.metadata.validation_score = Some(outcome.score);
                    result.metadata.validated_by = Some(adapter_id);
                    self.results.record(&result).await?;
                    if outcome.is_valid {
                        task.transition_to(TaskStatus::Validated)?;
                        self.tasks.update(&task).await?;
                    } else {
                        tracing::warn!(
                            task_id = %task_id,
                            score = outcome.score,
                            recommendations = ?outcome.recommendations,
                            "result scored below validation threshold"
                        );
                    }
                }

                self.populate_cache(&task, &result).await;

                // 7. Learning feedback.
                self.learning
                    .record(FeedbackRecord::new(task.kind, adapter_id, true, execution_time_ms))
                    .await;

                Ok(result)
            }
            Err(err) => {
                self.learning
                    .record(FeedbackRecord::new(
                        task.kind,
                        adapter_id,
                        false,
                        execution_time_ms,
                    ))
                    .await;
                self.fail(task, Some(adapter_id), err).await
            }
        }
    }

    /// Mark the task failed, persist an error result when an adapter was
    /// chosen, emit `task:failed`, and surface the error.
    async fn fail(
        &self,
        mut task: Task,
        adapter_id: Option<AdapterId>,
        err: OrchestratorError,
    ) -> OrchestratorResult<TaskResult> {
        let report = err.report();
        if let Some(adapter_id) = adapter_id {
            let result = TaskResult::failure(task.id, adapter_id, report.to_string());
            self.results.record(&result).await?;
        }

        if task.can_transition_to(TaskStatus::Failed) {
            task.transition_to(TaskStatus::Failed)?;
            self.tasks.update(&task).await?;
        }
        self.bus.publish(OrchestratorEvent::TaskFailed {
            task_id: task.id,
            error: report.code.clone(),
            ts: Utc::now(),
        });
        Err(err)
    }

    async fn populate_cache(&self, task: &Task, result: &TaskResult) {
        let Some((cache, cache_config)) = &self.cache else {
            return;
        };
        let key = format!("result:{}:{}", task.kind, task.id);
        let options = CacheWriteOptions {
            ttl_ms: Some(cache_config.ttl_for(task.kind)),
            tags: vec![
                format!("kind:{}", task.kind),
                format!("adapter:{}", result.adapter),
            ],
            compress: true,
        };
        if let Err(err) = cache.set(&key, result.output.clone(), options).await {
            tracing::warn!(task_id = %task.id, error = %err, "failed to cache result");
        }
    }
}
