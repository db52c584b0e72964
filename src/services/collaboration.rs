//! Collaboration engine.
//!
//! Runs several adapters against one task (sequentially, in parallel, as a
//! primary/reviewer pair, or iteratively) and merges their outputs. Every
//! step is an independent execution-engine call on a derived task, so the
//! per-task state machine stays clean.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::error::{ErrorReport, OrchestratorError, OrchestratorResult};
use crate::domain::models::{AdapterId, Task, TaskKind, TaskResult, TaskStatus};

use super::event_bus::{EventBus, OrchestratorEvent};
use super::execution_engine::{ExecutionEngine, ExecutionOptions};
use super::merger::{MergeOptions, MergeStrategy, MergedResult, ResultMerger};
use super::text;
use super::validator::ResultValidator;

/// Word-overlap level at which two consecutive iterations count as
/// converged.
const CONSENSUS_SIMILARITY: f64 = 0.9;

/// Collaboration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationMode {
    /// Each adapter continues from the previous step's output.
    Sequential,
    /// All adapters run concurrently; outputs are merged.
    Parallel,
    /// A primary executes; a reviewer critiques (exactly 2 adapters).
    Review,
    /// Adapters round-robin over iterations, each refining the last output.
    Iterative,
}

impl CollaborationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Review => "review",
            Self::Iterative => "iterative",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "review" => Some(Self::Review),
            "iterative" => Some(Self::Iterative),
            _ => None,
        }
    }
}

/// Options for one collaboration call.
#[derive(Debug, Clone)]
pub struct CollaborationOptions {
    pub mode: CollaborationMode,
    pub adapters: Vec<AdapterId>,
    /// Merge strategy for parallel mode.
    pub merge_strategy: MergeStrategy,
    /// Iteration cap for iterative mode.
    pub max_iterations: u32,
    /// Stop iterating once consecutive outputs agree.
    pub stop_on_consensus: bool,
}

impl CollaborationOptions {
    pub fn new(mode: CollaborationMode, adapters: Vec<AdapterId>) -> Self {
        Self {
            mode,
            adapters,
            merge_strategy: MergeStrategy::Combine,
            max_iterations: 3,
            stop_on_consensus: false,
        }
    }

    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_stop_on_consensus(mut self) -> Self {
        self.stop_on_consensus = true;
        self
    }
}

/// Record of one step inside a collaboration.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: u32,
    pub adapter: AdapterId,
    /// The derived task executed for this step.
    pub task_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

/// Outcome of a collaboration call.
#[derive(Debug, Clone, Serialize)]
pub struct CollaborationOutcome {
    pub task_id: Uuid,
    pub mode: CollaborationMode,
    pub final_output: String,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<MergedResult>,
    /// Iterations actually run (iterative mode).
    pub iterations: u32,
}

/// Multi-adapter collaboration engine.
pub struct CollaborationEngine {
    engine: Arc<ExecutionEngine>,
    merger: ResultMerger,
    validator: Arc<ResultValidator>,
    bus: Arc<EventBus>,
}

impl CollaborationEngine {
    pub fn new(
        engine: Arc<ExecutionEngine>,
        validator: Arc<ResultValidator>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            engine,
            merger: ResultMerger::new(),
            validator,
            bus,
        }
    }

    /// Run a collaboration over an existing pending task.
    pub async fn collaborate(
        &self,
        task_id: Uuid,
        options: CollaborationOptions,
    ) -> OrchestratorResult<CollaborationOutcome> {
        if options.adapters.len() < 2 {
            return Err(OrchestratorError::Validation(
                "collaboration requires at least 2 adapters".into(),
            ));
        }
        if options.mode == CollaborationMode::Review && options.adapters.len() != 2 {
            return Err(OrchestratorError::Validation(format!(
                "review mode requires exactly 2 adapters, got {}",
                options.adapters.len()
            )));
        }

        let mut task = self
            .engine
            .tasks()
            .get(task_id)
            .await?
            .ok_or(OrchestratorError::TaskNotFound(task_id))?;
        task.transition_to(TaskStatus::InProgress)?;
        self.engine.tasks().update(&task).await?;

        self.bus.publish(OrchestratorEvent::CollaborationStarted {
            task_id,
            mode: options.mode.as_str().to_string(),
            adapters: options.adapters.clone(),
            ts: Utc::now(),
        });

        let outcome = match options.mode {
            CollaborationMode::Sequential => self.run_sequential(&task, &options).await,
            CollaborationMode::Parallel => self.run_parallel(&task, &options).await,
            CollaborationMode::Review => self.run_review(&task, &options).await,
            CollaborationMode::Iterative => self.run_iterative(&task, &options).await,
        };

        match outcome {
            Ok(outcome) => {
                task.transition_to(TaskStatus::Completed)?;
                self.engine.tasks().update(&task).await?;
                self.bus.publish(OrchestratorEvent::CollaborationCompleted {
                    task_id,
                    mode: options.mode.as_str().to_string(),
                    adapters: options.adapters,
                    ts: Utc::now(),
                });
                Ok(outcome)
            }
            Err(err) => {
                if task.can_transition_to(TaskStatus::Failed) {
                    task.transition_to(TaskStatus::Failed)?;
                    self.engine.tasks().update(&task).await?;
                }
                Err(err)
            }
        }
    }

    /// Run one step on a derived task forced to one adapter.
    async fn run_step(
        &self,
        parent: &Task,
        kind: TaskKind,
        prompt: String,
        adapter: AdapterId,
        step: u32,
    ) -> (StepRecord, Option<TaskResult>) {
        let derived = match Task::new(kind, prompt) {
            Ok(t) => t.with_priority(parent.priority),
            Err(err) => {
                return (
                    StepRecord {
                        step,
                        adapter,
                        task_id: Uuid::nil(),
                        result_id: None,
                        error: Some(err.report()),
                    },
                    None,
                )
            }
        };
        let derived_id = derived.id;
        if let Err(err) = self.engine.tasks().insert(&derived).await {
            return (
                StepRecord {
                    step,
                    adapter,
                    task_id: derived_id,
                    result_id: None,
                    error: Some(err.report()),
                },
                None,
            );
        }

        match self
            .engine
            .execute(
                derived_id,
                ExecutionOptions::default().with_adapter(adapter).with_retry(),
            )
            .await
        {
            Ok(result) => (
                StepRecord {
                    step,
                    adapter,
                    task_id: derived_id,
                    result_id: Some(result.id),
                    error: None,
                },
                Some(result),
            ),
            Err(err) => (
                StepRecord {
                    step,
                    adapter,
                    task_id: derived_id,
                    result_id: None,
                    error: Some(err.report()),
                },
                None,
            ),
        }
    }

    async fn run_sequential(
        &self,
        task: &Task,
        options: &CollaborationOptions,
    ) -> OrchestratorResult<CollaborationOutcome> {
        let mut steps = Vec::new();
        let mut previous_output: Option<String> = None;

        for (idx, adapter) in options.adapters.iter().enumerate() {
            let step_no = idx as u32 + 1;
            let prompt = match &previous_output {
                None => task.prompt.clone(),
                Some(previous) => format!(
                    "Based on the previous analysis:\n{previous}\n\nPlease continue with step {step_no}:\n{}",
                    task.prompt
                ),
            };
            let (record, result) = self
                .run_step(task, task.kind, prompt, *adapter, step_no)
                .await;
            // A required step failing fails the whole sequence.
            let failed = record.error.clone();
            steps.push(record);
            match (result, failed) {
                (Some(result), _) => previous_output = Some(result.output),
                (None, Some(report)) => {
                    tracing::warn!(step = step_no, adapter = %adapter, code = %report.code, "sequential step failed");
                    return Err(OrchestratorError::Validation(format!(
                        "sequential step {step_no} on {adapter} failed: {report}"
                    )));
                }
                (None, None) => unreachable!("step without result must carry an error"),
            }
        }

        Ok(CollaborationOutcome {
            task_id: task.id,
            mode: CollaborationMode::Sequential,
            final_output: previous_output.unwrap_or_default(),
            steps,
            merged: None,
            iterations: options.adapters.len() as u32,
        })
    }

    async fn run_parallel(
        &self,
        task: &Task,
        options: &CollaborationOptions,
    ) -> OrchestratorResult<CollaborationOutcome> {
        let futures = options.adapters.iter().enumerate().map(|(idx, adapter)| {
            self.run_step(task, task.kind, task.prompt.clone(), *adapter, idx as u32 + 1)
        });
        let outcomes = join_all(futures).await;

        let mut steps = Vec::new();
        let mut successes = Vec::new();
        for (record, result) in outcomes {
            steps.push(record);
            if let Some(result) = result {
                successes.push(result);
            }
        }

        // The whole call fails only when every adapter failed.
        if successes.is_empty() {
            return Err(OrchestratorError::Validation(
                "all parallel collaboration steps failed".into(),
            ));
        }

        // Cross-validate the first two successes for the comparison event.
        if successes.len() >= 2 {
            if let Ok(cross) = self
                .validator
                .cross_validate(&successes[0], &successes[1], task)
            {
                self.bus.publish(OrchestratorEvent::ResultsCompared {
                    task_id: task.id,
                    result_count: successes.len(),
                    consensus: cross.consensus,
                    ts: Utc::now(),
                });
            }
        }

        let merged = self.merger.merge(
            &successes,
            task,
            &MergeOptions::new(options.merge_strategy),
        )?;

        Ok(CollaborationOutcome {
            task_id: task.id,
            mode: CollaborationMode::Parallel,
            final_output: merged.output.clone(),
            steps,
            merged: Some(merged),
            iterations: 1,
        })
    }

    async fn run_review(
        &self,
        task: &Task,
        options: &CollaborationOptions,
    ) -> OrchestratorResult<CollaborationOutcome> {
        let primary_adapter = options.adapters[0];
        let reviewer_adapter = options.adapters[1];

        let (primary_record, primary_result) = self
            .run_step(task, task.kind, task.prompt.clone(), primary_adapter, 1)
            .await;
        let Some(primary) = primary_result else {
            let report = primary_record
                .error
                .clone()
                .unwrap_or_else(|| OrchestratorError::Validation("primary step failed".into()).report());
            return Err(OrchestratorError::Validation(format!(
                "review primary on {primary_adapter} failed: {report}"
            )));
        };

        let review_prompt = format!(
            "Please review the following work.\n\nOriginal request:\n{}\n\nProposed answer:\n{}\n\nPoint out mistakes, omissions, and improvements.",
            task.prompt, primary.output
        );
        let (review_record, review_result) = self
            .run_step(task, TaskKind::Validation, review_prompt, reviewer_adapter, 2)
            .await;
        let Some(review) = review_result else {
            let report = review_record
                .error
                .clone()
                .unwrap_or_else(|| OrchestratorError::Validation("review step failed".into()).report());
            return Err(OrchestratorError::Validation(format!(
                "reviewer on {reviewer_adapter} failed: {report}"
            )));
        };

        let merged = self.merger.merge(
            &[primary, review],
            task,
            &MergeOptions::new(MergeStrategy::Validate),
        )?;

        Ok(CollaborationOutcome {
            task_id: task.id,
            mode: CollaborationMode::Review,
            final_output: merged.output.clone(),
            steps: vec![primary_record, review_record],
            merged: Some(merged),
            iterations: 2,
        })
    }

    async fn run_iterative(
        &self,
        task: &Task,
        options: &CollaborationOptions,
    ) -> OrchestratorResult<CollaborationOutcome> {
        let mut steps = Vec::new();
        let mut previous_output: Option<String> = None;
        let mut last_two: (Option<String>, Option<String>) = (None, None);
        let mut iterations = 0;

        for iteration in 1..=options.max_iterations {
            let adapter = options.adapters[(iteration as usize - 1) % options.adapters.len()];
            let prompt = match &previous_output {
                None => task.prompt.clone(),
                Some(previous) => format!(
                    "Previous attempt:\n{previous}\n\nRefine it further. Original request:\n{}",
                    task.prompt
                ),
            };
            let (record, result) = self
                .run_step(task, task.kind, prompt, adapter, iteration)
                .await;
            steps.push(record);
            iterations = iteration;

            match result {
                Some(result) => {
                    last_two = (last_two.1.clone(), Some(result.output.clone()));
                    previous_output = Some(result.output);
                }
                None => {
                    // A failed iteration keeps the last good output; the
                    // call only fails when nothing ever succeeded.
                    continue;
                }
            }

            if options.stop_on_consensus && iteration >= 2 {
                if let (Some(prev), Some(curr)) = (&last_two.0, &last_two.1) {
                    let similarity = text::text_overlap_min(prev, curr);
                    if similarity >= CONSENSUS_SIMILARITY {
                        tracing::debug!(iteration, similarity, "iterative consensus reached");
                        break;
                    }
                }
            }
        }

        let Some(final_output) = previous_output else {
            return Err(OrchestratorError::Validation(
                "all iterative collaboration steps failed".into(),
            ));
        };

        Ok(CollaborationOutcome {
            task_id: task.id,
            mode: CollaborationMode::Iterative,
            final_output,
            steps,
            merged: None,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::assistants::{AdapterRegistry, MockAssistant, MockResponse};
    use crate::adapters::memory::{InMemoryResultSink, InMemoryTaskRepository};
    use crate::domain::models::{
        BreakerConfig, EngineConfig, RetryConfig, RouterConfig,
    };
    use crate::domain::ports::TaskRepository;
    use crate::services::circuit_breaker::CircuitBreakerService;
    use crate::services::learning::LearningLoop;
    use crate::services::retry::RetryPolicy;
    use crate::services::router::TaskRouter;
    use tokio::sync::RwLock;

    struct Harness {
        collab: CollaborationEngine,
        repo: Arc<InMemoryTaskRepository>,
        claude: Arc<MockAssistant>,
        gemini: Arc<MockAssistant>,
        bus: Arc<EventBus>,
    }

    async fn harness() -> Harness {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let sink = Arc::new(InMemoryResultSink::new());
        let registry = Arc::new(AdapterRegistry::new());
        let claude = Arc::new(MockAssistant::new(AdapterId::Claude));
        let gemini = Arc::new(MockAssistant::new(AdapterId::Gemini));
        registry.register(claude.clone()).await;
        registry.register(gemini.clone()).await;

        let bus = Arc::new(EventBus::with_defaults());
        let validator = Arc::new(ResultValidator::new());
        let engine = Arc::new(ExecutionEngine::new(
            repo.clone(),
            sink,
            registry,
            Arc::new(RwLock::new(TaskRouter::new(&RouterConfig::default()))),
            Arc::new(CircuitBreakerService::new(BreakerConfig::default())),
            RetryPolicy::new(RetryConfig {
                attempts: 2,
                initial_delay_ms: 1,
                multiplier: 2.0,
                max_delay_ms: 5,
                jitter: 0.2,
            }),
            validator.clone(),
            bus.clone(),
            Arc::new(LearningLoop::with_defaults()),
            EngineConfig::default(),
        ));
        Harness {
            collab: CollaborationEngine::new(engine, validator, bus.clone()),
            repo,
            claude,
            gemini,
            bus,
        }
    }

    async fn pending_task(h: &Harness, prompt: &str) -> Uuid {
        let task = Task::new(TaskKind::CodeGeneration, prompt).unwrap();
        let id = task.id;
        h.repo.insert(&task).await.unwrap();
        id
    }

    fn both(mode: CollaborationMode) -> CollaborationOptions {
        CollaborationOptions::new(mode, vec![AdapterId::Claude, AdapterId::Gemini])
    }

    #[tokio::test]
    async fn test_requires_two_adapters() {
        let h = harness().await;
        let id = pending_task(&h, "sum of array").await;
        let err = h
            .collab
            .collaborate(
                id,
                CollaborationOptions::new(CollaborationMode::Parallel, vec![AdapterId::Claude]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_review_requires_exactly_two() {
        let h = harness().await;
        let id = pending_task(&h, "sum of array").await;
        let err = h
            .collab
            .collaborate(
                id,
                CollaborationOptions::new(
                    CollaborationMode::Review,
                    vec![AdapterId::Claude, AdapterId::Gemini, AdapterId::Mock],
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_sequential_feeds_previous_output() {
        let h = harness().await;
        h.claude.set_response(MockResponse::text("claude analysis")).await;
        h.gemini.set_response(MockResponse::text("gemini continuation")).await;
        let id = pending_task(&h, "sum of array").await;

        let outcome = h
            .collab
            .collaborate(id, both(CollaborationMode::Sequential))
            .await
            .unwrap();
        assert_eq!(outcome.final_output, "gemini continuation");
        assert_eq!(outcome.steps.len(), 2);

        // The parent task completed; derived tasks exist per step.
        let parent = h.repo.get(id).await.unwrap().unwrap();
        assert_eq!(parent.status, TaskStatus::Completed);
        let step_task = h.repo.get(outcome.steps[1].task_id).await.unwrap().unwrap();
        assert!(step_task.prompt.contains("Based on the previous analysis"));
        assert!(step_task.prompt.contains("claude analysis"));
    }

    #[tokio::test]
    async fn test_sequential_fails_on_required_step() {
        let h = harness().await;
        h.claude
            .push_failures(OrchestratorError::InvalidRequest("nope".into()), 1)
            .await;
        let id = pending_task(&h, "sum of array").await;

        let err = h
            .collab
            .collaborate(id, both(CollaborationMode::Sequential))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        let parent = h.repo.get(id).await.unwrap().unwrap();
        assert_eq!(parent.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_parallel_merges_and_emits_events() {
        // E2: both adapters answer with fenced code; combine keeps both.
        let h = harness().await;
        let mut events = h.bus.subscribe_filtered(
            crate::services::event_bus::EventFilter::wildcard("collaboration:*").unwrap(),
        );
        tokio::task::yield_now().await;

        h.claude
            .set_response(MockResponse::text(
                "Fold the array.\n\n```\narr.reduce((a, b) => a + b, 0)\n```",
            ))
            .await;
        h.gemini
            .set_response(MockResponse::text(
                "Loop and accumulate.\n\n```\nfor (const v of arr) sum += v;\n```",
            ))
            .await;
        let id = pending_task(&h, "sum of array").await;

        let outcome = h
            .collab
            .collaborate(id, both(CollaborationMode::Parallel))
            .await
            .unwrap();
        let merged = outcome.merged.unwrap();
        assert!(merged.output.contains("reduce"));
        assert!(merged.output.contains("sum += v"));
        let contribution_sum: f64 = merged.contributions.values().sum();
        assert!((contribution_sum - 100.0).abs() < 1e-6);
        assert!(merged.confidence > 0.0);

        assert_eq!(events.recv().await.unwrap().name(), "collaboration:started");
        assert_eq!(events.recv().await.unwrap().name(), "collaboration:completed");
    }

    #[tokio::test]
    async fn test_parallel_survives_single_failure() {
        let h = harness().await;
        h.claude
            .push_failures(OrchestratorError::InvalidRequest("broken".into()), 1)
            .await;
        h.gemini.set_response(MockResponse::text("gemini alone")).await;
        let id = pending_task(&h, "sum of array").await;

        let outcome = h
            .collab
            .collaborate(id, both(CollaborationMode::Parallel))
            .await
            .unwrap();
        assert_eq!(outcome.final_output, "gemini alone");
        let failed_steps: Vec<_> = outcome.steps.iter().filter(|s| s.error.is_some()).collect();
        assert_eq!(failed_steps.len(), 1);
        assert_eq!(failed_steps[0].adapter, AdapterId::Claude);
    }

    #[tokio::test]
    async fn test_parallel_fails_when_all_fail() {
        let h = harness().await;
        h.claude
            .push_failures(OrchestratorError::InvalidRequest("broken".into()), 1)
            .await;
        h.gemini
            .push_failures(OrchestratorError::InvalidRequest("broken".into()), 1)
            .await;
        let id = pending_task(&h, "sum of array").await;

        assert!(h
            .collab
            .collaborate(id, both(CollaborationMode::Parallel))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_parallel_emits_results_compared() {
        let h = harness().await;
        let mut events = h.bus.subscribe_filtered(
            crate::services::event_bus::EventFilter::Exact("results:compared".into()),
        );
        tokio::task::yield_now().await;

        let shared = "The sum is computed by folding the array with addition.";
        h.claude.set_response(MockResponse::text(shared)).await;
        h.gemini.set_response(MockResponse::text(shared)).await;
        let id = pending_task(&h, "sum of array").await;
        h.collab
            .collaborate(id, both(CollaborationMode::Parallel))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        match event {
            OrchestratorEvent::ResultsCompared {
                result_count,
                consensus,
                ..
            } => {
                assert_eq!(result_count, 2);
                assert!(consensus);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_review_builds_validation_task() {
        let h = harness().await;
        h.claude.set_response(MockResponse::text("primary answer")).await;
        h.gemini.set_response(MockResponse::text("looks correct overall")).await;
        let id = pending_task(&h, "sum of array").await;

        let outcome = h
            .collab
            .collaborate(id, both(CollaborationMode::Review))
            .await
            .unwrap();
        assert!(outcome.final_output.contains("## Primary"));
        assert!(outcome.final_output.contains("## Review"));

        let review_task = h.repo.get(outcome.steps[1].task_id).await.unwrap().unwrap();
        assert_eq!(review_task.kind, TaskKind::Validation);
        assert!(review_task.prompt.contains("primary answer"));
    }

    #[tokio::test]
    async fn test_iterative_round_robin_and_cap() {
        let h = harness().await;
        h.claude.set_response(MockResponse::text("claude draft")).await;
        h.gemini.set_response(MockResponse::text("gemini polish")).await;
        let id = pending_task(&h, "sum of array").await;

        let outcome = h
            .collab
            .collaborate(
                id,
                both(CollaborationMode::Iterative).with_max_iterations(3),
            )
            .await
            .unwrap();
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.steps[0].adapter, AdapterId::Claude);
        assert_eq!(outcome.steps[1].adapter, AdapterId::Gemini);
        assert_eq!(outcome.steps[2].adapter, AdapterId::Claude);
        assert_eq!(outcome.final_output, "claude draft");
    }

    #[tokio::test]
    async fn test_iterative_stops_on_consensus() {
        let h = harness().await;
        // Identical outputs from iteration 2 onward.
        let stable = "the final converged answer text";
        h.claude.set_response(MockResponse::text(stable)).await;
        h.gemini.set_response(MockResponse::text(stable)).await;
        let id = pending_task(&h, "sum of array").await;

        let outcome = h
            .collab
            .collaborate(
                id,
                both(CollaborationMode::Iterative)
                    .with_max_iterations(5)
                    .with_stop_on_consensus(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.iterations, 2);
    }
}
