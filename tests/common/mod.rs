//! Shared fixtures for integration tests.

use std::sync::Arc;
use tokio::sync::RwLock;

use ensemble::adapters::assistants::{AdapterRegistry, MockAssistant};
use ensemble::adapters::memory::{InMemoryResultSink, InMemoryTaskRepository};
use ensemble::domain::models::{
    AdapterId, BreakerConfig, EngineConfig, RetryConfig, RouterConfig,
};
use ensemble::services::{
    CircuitBreakerService, CollaborationEngine, EventBus, ExecutionEngine, LearningLoop,
    ResultValidator, RetryPolicy, TaskRouter,
};

/// A fully wired stack backed by scriptable mocks.
pub struct TestStack {
    pub engine: Arc<ExecutionEngine>,
    pub collaboration: CollaborationEngine,
    pub repo: Arc<InMemoryTaskRepository>,
    pub sink: Arc<InMemoryResultSink>,
    pub bus: Arc<EventBus>,
    pub breakers: Arc<CircuitBreakerService>,
    pub learning: Arc<LearningLoop>,
    pub claude: Arc<MockAssistant>,
    pub gemini: Arc<MockAssistant>,
}

/// Retry policy with millisecond delays so tests stay fast.
pub fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(RetryConfig {
        attempts,
        initial_delay_ms: 1,
        multiplier: 2.0,
        max_delay_ms: 10,
        jitter: 0.2,
    })
}

/// Build a stack with mock claude + gemini adapters.
pub async fn test_stack() -> TestStack {
    test_stack_with(BreakerConfig::default(), EngineConfig::default()).await
}

pub async fn test_stack_with(breaker: BreakerConfig, engine_config: EngineConfig) -> TestStack {
    let repo = Arc::new(InMemoryTaskRepository::new());
    let sink = Arc::new(InMemoryResultSink::new());
    let registry = Arc::new(AdapterRegistry::new());
    let claude = Arc::new(MockAssistant::new(AdapterId::Claude));
    let gemini = Arc::new(MockAssistant::new(AdapterId::Gemini));
    registry.register(claude.clone()).await;
    registry.register(gemini.clone()).await;

    let bus = Arc::new(EventBus::with_defaults());
    let breakers = Arc::new(CircuitBreakerService::new(breaker));
    let learning = Arc::new(LearningLoop::with_defaults());
    let validator = Arc::new(ResultValidator::new());

    let engine = Arc::new(ExecutionEngine::new(
        repo.clone(),
        sink.clone(),
        registry,
        Arc::new(RwLock::new(TaskRouter::new(&RouterConfig::default()))),
        breakers.clone(),
        fast_retry(engine_config.retry_attempts),
        validator.clone(),
        bus.clone(),
        learning.clone(),
        engine_config,
    ));
    let collaboration = CollaborationEngine::new(engine.clone(), validator, bus.clone());

    TestStack {
        engine,
        collaboration,
        repo,
        sink,
        bus,
        breakers,
        learning,
        claude,
        gemini,
    }
}

/// Poll a predicate until it holds or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_for<F, Fut>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        if predicate().await {
            return true;
        }
        if std::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
