//! Application services for the Ensemble orchestration core.

pub mod circuit_breaker;
pub mod collaboration;
pub mod coordinator;
pub mod event_bus;
pub mod execution_engine;
pub mod learning;
pub mod merger;
pub mod retry;
pub mod router;
pub mod text;
pub mod validator;

pub use circuit_breaker::{CircuitBreakerService, CircuitState, CircuitStats, CircuitTransition};
pub use collaboration::{
    CollaborationEngine, CollaborationMode, CollaborationOptions, CollaborationOutcome, StepRecord,
};
pub use coordinator::{ClusterStats, DistributedCoordinator};
pub use event_bus::{EventBus, EventBusConfig, EventFilter, OrchestratorEvent};
pub use execution_engine::{ExecutionEngine, ExecutionOptions};
pub use learning::{LearningConfig, LearningLoop, LearningState};
pub use merger::{MergeOptions, MergeStrategy, MergedResult, ResultMerger};
pub use retry::RetryPolicy;
pub use router::{
    ComplexityStrategy, PerformanceStrategy, RoutingDecision, RoutingSnapshot, RoutingStrategy,
    RuleBasedStrategy, TaskRouter,
};
pub use validator::{CrossValidation, ResultValidator, ValidationCriterion, ValidationOutcome};
