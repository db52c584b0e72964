//! Ports: the interfaces the orchestration core consumes.

pub mod adapter;
pub mod cache;
pub mod coordination;
pub mod task_repository;

pub use adapter::{AdapterOutput, AssistantAdapter};
pub use cache::{normalize_key, CacheStats, CacheWriteOptions, ResultCache};
pub use coordination::{ClusterMessage, CoordinationStore};
pub use task_repository::{ResultSink, TaskRepository};
