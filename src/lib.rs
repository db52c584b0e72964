//! Ensemble: AI-assistant orchestration core.
//!
//! Accepts typed tasks, routes each to the right back-end assistant,
//! executes with timeout/retry/circuit-breaker protection, optionally
//! validates and cross-validates outputs, runs multi-adapter collaborations
//! with result merging, and distributes work across nodes through a shared
//! claim queue with heartbeat failover. Routing preferences improve over
//! time from observed execution feedback.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export the types most callers start from.
pub use domain::error::{ErrorReport, OrchestratorError, OrchestratorResult};
pub use domain::models::{AdapterId, Task, TaskKind, TaskPriority, TaskResult, TaskStatus};
pub use services::{ExecutionEngine, ExecutionOptions};
