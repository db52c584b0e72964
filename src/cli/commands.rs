//! CLI command handlers.
//!
//! Handlers wire the orchestration stack with the demo (mock) adapters.
//! Real deployments register their own [`AssistantAdapter`] implementations
//! instead; the pipeline is identical.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adapters::assistants::{AdapterRegistry, MockAssistant, MockResponse};
use crate::adapters::memory::{
    InMemoryCache, InMemoryCoordinationStore, InMemoryResultSink, InMemoryTaskRepository,
};
use crate::domain::models::{
    AdapterId, OrchestratorConfig, Task, TaskConstraints, TaskKind, TaskPriority,
};
use crate::domain::ports::coordination::CoordinationStore;
use crate::domain::ports::task_repository::TaskRepository;
use crate::domain::ports::AssistantAdapter;
use crate::services::{
    CircuitBreakerService, CollaborationEngine, CollaborationMode, CollaborationOptions,
    DistributedCoordinator, EventBus, ExecutionEngine, ExecutionOptions, LearningLoop,
    MergeStrategy, ResultValidator, RetryPolicy, TaskRouter,
};

use super::display;

/// One fully wired orchestration stack. Startup builds the singletons once
/// and passes handles everywhere.
pub struct Stack {
    pub engine: Arc<ExecutionEngine>,
    pub collaboration: CollaborationEngine,
    pub breakers: Arc<CircuitBreakerService>,
    pub bus: Arc<EventBus>,
    pub learning: Arc<LearningLoop>,
    pub repo: Arc<InMemoryTaskRepository>,
}

impl Stack {
    /// Build a stack with demo adapters for every known id.
    pub async fn demo(config: &OrchestratorConfig) -> Self {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let sink = Arc::new(InMemoryResultSink::new());
        let registry = Arc::new(AdapterRegistry::new());

        let claude: Arc<dyn AssistantAdapter> = Arc::new(
            MockAssistant::new(AdapterId::Claude)
                .with_capabilities(TaskKind::ALL.iter().map(|k| k.capability_tag().to_string()))
                .with_response(MockResponse::text(
                    "Here is the requested change.\n```rust\nfn answer() -> i32 { 42 }\n```",
                )),
        );
        let gemini: Arc<dyn AssistantAdapter> = Arc::new(
            MockAssistant::new(AdapterId::Gemini)
                .with_capabilities(["multimodal".to_string(), "search".to_string()])
                .with_response(MockResponse::text(
                    "A quick take: iterate, accumulate, return the total.",
                )),
        );
        registry.register(claude).await;
        registry.register(gemini).await;

        let bus = Arc::new(EventBus::with_defaults());
        let breakers = Arc::new(CircuitBreakerService::new(config.breaker.clone()));
        let learning = Arc::new(LearningLoop::with_defaults().with_bus(bus.clone()));
        let validator = Arc::new(ResultValidator::new());
        let cache = Arc::new(InMemoryCache::new(config.cache.clone()));

        let engine = Arc::new(
            ExecutionEngine::new(
                repo.clone(),
                sink,
                registry,
                Arc::new(RwLock::new(TaskRouter::new(&config.router))),
                breakers.clone(),
                RetryPolicy::new(config.retry.clone()),
                validator.clone(),
                bus.clone(),
                learning.clone(),
                config.engine.clone(),
            )
            .with_cache(cache, config.cache.clone()),
        );
        let collaboration = CollaborationEngine::new(engine.clone(), validator, bus.clone());

        Stack {
            engine,
            collaboration,
            breakers,
            bus,
            learning,
            repo,
        }
    }
}

fn parse_kind(kind: &str) -> Result<TaskKind> {
    TaskKind::from_str(kind).ok_or_else(|| anyhow!("unknown task kind: {kind}"))
}

fn parse_priority(priority: &str) -> Result<TaskPriority> {
    TaskPriority::from_str(priority).ok_or_else(|| anyhow!("unknown priority: {priority}"))
}

fn parse_adapter(adapter: &str) -> Result<AdapterId> {
    AdapterId::from_str(adapter).ok_or_else(|| anyhow!("unknown adapter: {adapter}"))
}

/// `ensemble run`
pub async fn handle_run(
    config: &OrchestratorConfig,
    kind: &str,
    prompt: &str,
    priority: &str,
    adapter: Option<&str>,
    validate: bool,
    json: bool,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let priority = parse_priority(priority)?;
    let forced = adapter.map(parse_adapter).transpose()?;

    let stack = Stack::demo(config).await;
    let task = Task::new(kind, prompt)
        .context("invalid task")?
        .with_priority(priority)
        .with_constraints(TaskConstraints::default())
        .context("invalid constraints")?;
    let task_id = task.id;
    stack.repo.insert(&task).await?;

    let mut options = ExecutionOptions::default().with_retry();
    if validate {
        options = options.with_validation();
    }
    if let Some(forced) = forced {
        options = options.with_adapter(forced);
    }

    let result = stack.engine.execute(task_id, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        display::heading("Result");
        println!("{}", display::result_table(&result));
        println!("\n{}", result.output);
        let breaker_stats = stack.breakers.stats().await;
        if !breaker_stats.is_empty() {
            display::heading("Circuits");
            println!("{}", display::breaker_table(&breaker_stats));
        }
    }
    Ok(())
}

/// `ensemble collab`
#[allow(clippy::too_many_arguments)]
pub async fn handle_collab(
    config: &OrchestratorConfig,
    mode: &str,
    adapters: &[String],
    kind: &str,
    prompt: &str,
    strategy: &str,
    max_iterations: u32,
    stop_on_consensus: bool,
    json: bool,
) -> Result<()> {
    let mode = CollaborationMode::from_str(mode)
        .ok_or_else(|| anyhow!("unknown collaboration mode: {mode}"))?;
    let strategy = MergeStrategy::from_str(strategy)
        .ok_or_else(|| anyhow!("unknown merge strategy: {strategy}"))?;
    let adapters: Vec<AdapterId> = adapters
        .iter()
        .map(|a| parse_adapter(a))
        .collect::<Result<_>>()?;
    let kind = parse_kind(kind)?;

    let stack = Stack::demo(config).await;
    let task = Task::new(kind, prompt).context("invalid task")?;
    let task_id = task.id;
    stack.repo.insert(&task).await?;

    let mut options = CollaborationOptions::new(mode, adapters)
        .with_merge_strategy(strategy)
        .with_max_iterations(max_iterations);
    if stop_on_consensus {
        options = options.with_stop_on_consensus();
    }

    let outcome = stack.collaboration.collaborate(task_id, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        display::heading(&format!("Collaboration ({})", outcome.mode.as_str()));
        println!("{}", display::collaboration_table(&outcome));
        if let Some(merged) = &outcome.merged {
            display::heading("Contributions");
            println!("{}", display::merged_table(merged));
            println!("confidence: {:.2}", merged.confidence);
        }
        println!("\n{}", outcome.final_output);
    }
    Ok(())
}

/// `ensemble cluster-demo`
pub async fn handle_cluster_demo(
    config: &OrchestratorConfig,
    nodes: usize,
    tasks: usize,
    kill_one: bool,
    json: bool,
) -> Result<()> {
    let nodes = nodes.clamp(1, 8);
    let store = Arc::new(InMemoryCoordinationStore::new());
    let bus = Arc::new(EventBus::with_defaults());

    // Short intervals so the demo finishes quickly.
    let mut cluster_config = config.cluster.clone();
    cluster_config.heartbeat_interval_ms = 200;
    cluster_config.claim_ttl_ms = 2_000;
    cluster_config.poll_interval_ms = 50;

    let mut coordinators = Vec::new();
    let mut handles = Vec::new();
    for i in 0..nodes {
        let stack = Stack::demo(config).await;
        let mut node_config = cluster_config.clone();
        node_config.node_id = Some(format!("node-{i}"));
        let coordinator = Arc::new(DistributedCoordinator::new(
            store.clone(),
            stack.engine.clone(),
            bus.clone(),
            node_config,
        ));
        handles.extend(coordinator.start());
        coordinators.push(coordinator);
    }

    // Submit through the first node.
    for i in 0..tasks {
        let priority = if i % 3 == 0 {
            TaskPriority::High
        } else {
            TaskPriority::Medium
        };
        let task = Task::new(TaskKind::CodeGeneration, format!("demo task {i}"))
            .context("invalid task")?
            .with_priority(priority);
        coordinators[0].submit(task).await?;
    }

    if kill_one && coordinators.len() > 1 {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        tracing::info!("killing node-0 to demonstrate failover");
        coordinators[0].shutdown();
    }

    // Wait for the queue to drain (bounded).
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        let depth = store.queue_len().await.map_err(|e| anyhow!(e))?;
        let busy: u32 = coordinators.iter().map(|c| c.current_load()).sum();
        if depth == 0 && busy == 0 {
            break;
        }
        if std::time::Instant::now() > deadline {
            tracing::warn!(depth, busy, "demo deadline reached before drain");
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    let stats = coordinators
        .last()
        .ok_or_else(|| anyhow!("no coordinator started"))?
        .cluster_stats()
        .await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        display::heading("Cluster");
        println!("{}", display::cluster_table(&stats));
        println!("queue depth: {}", stats.queue_depth);
    }

    for coordinator in &coordinators {
        coordinator.shutdown();
    }
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

/// `ensemble config show`
pub fn handle_config_show(config: &OrchestratorConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("{}", serde_yaml::to_string(config)?);
    }
    Ok(())
}
