//! Domain error types for the Ensemble orchestration core.
//!
//! Every failure carries a stable machine-readable code; retry decisions are
//! made on codes, never on message text. The one exception is the rate-limit
//! hint, which has its own variant.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Network failure classification used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Connection refused by the remote end.
    ConnectionRefused,
    /// Connection reset mid-flight.
    ConnectionReset,
    /// DNS resolution failed.
    DnsFailure,
    /// The network operation itself timed out (distinct from the task
    /// execution deadline, which is never retried).
    Timeout,
}

/// Errors surfaced by the orchestration core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrchestratorError {
    /// Missing or invalid input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid task status transition; the task is left untouched.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Task with the given id was not found.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// Template with the given id was not found.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The chosen adapter cannot execute tasks of this kind.
    #[error("Adapter {adapter} cannot execute {kind} tasks")]
    AdapterIncompatible { adapter: String, kind: String },

    /// No registered adapter can serve the request.
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Caller is not authenticated.
    #[error("Unauthorized")]
    Unauthorized,

    /// Caller is authenticated but not allowed.
    #[error("Forbidden")]
    Forbidden,

    /// Upstream rate limit hit.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Adapter rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Adapter rejected the request shape.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Adapter rejected the request payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Network-class failure talking to an adapter backend.
    #[error("Network error ({kind:?}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// Adapter invocation failed. `status` carries the HTTP status when the
    /// backend reported one.
    #[error("Adapter invocation failed (status {status:?}): {message}")]
    AdapterInvocation {
        status: Option<u16>,
        message: String,
    },

    /// Circuit breaker is open for the given key; fail fast, never retried.
    #[error("Circuit open for {key}, retry after {retry_after}")]
    CircuitOpen {
        key: String,
        retry_after: DateTime<Utc>,
    },

    /// The task execution deadline elapsed. Not retryable.
    #[error("Task execution timeout after {0} ms")]
    ExecutionTimeout(u64),

    /// Persistence or cache backend failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidStateTransition { .. } => "INVALID_STATE",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::AdapterIncompatible { .. } => "ADAPTER_INCOMPATIBLE",
            Self::AdapterUnavailable(_) => "ADAPTER_UNAVAILABLE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::AdapterInvocation { .. } => "ADAPTER_ERROR",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::ExecutionTimeout(_) => "TASK_EXECUTION_TIMEOUT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether the retry manager may re-attempt after this error.
    ///
    /// Retry on network-class errors, rate-limit hints, and HTTP status
    /// ≥ 500 or ∈ {408, 429}. Authentication, invalid request/payload, and
    /// task execution timeouts are never retried; an open circuit fails fast.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimitExceeded => true,
            Self::AdapterInvocation { status, .. } => match status {
                Some(s) => *s >= 500 || *s == 408 || *s == 429,
                // Uncategorised adapter failures are retryable by default.
                None => true,
            },
            Self::Storage(_) => true,
            _ => false,
        }
    }

    /// Convert into a user-visible report with code, message, and timestamp.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// User-visible failure envelope: stable code, human message, timestamp.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
