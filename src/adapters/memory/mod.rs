//! In-memory reference implementations of the storage-facing ports.

pub mod cache;
pub mod coordination;
pub mod task_repository;

pub use cache::InMemoryCache;
pub use coordination::InMemoryCoordinationStore;
pub use task_repository::{InMemoryResultSink, InMemoryTaskRepository};
