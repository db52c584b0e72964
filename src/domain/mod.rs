//! Domain layer: models, ports, and errors.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{ErrorReport, NetworkErrorKind, OrchestratorError, OrchestratorResult};
