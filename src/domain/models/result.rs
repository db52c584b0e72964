//! Task result domain model.
//!
//! Exactly one of `output` / `error` is non-empty: success ⇔ `error` empty.
//! The derived quality score folds retries, validation, and execution time
//! into a single scalar used by the merger and the learning loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::adapter::AdapterId;

/// Execution time above which the quality score is penalised.
const SLOW_EXECUTION_MS: u64 = 10_000;

/// Metadata attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Wall-clock execution time of the adapter invocation.
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// In-process retries consumed before this result was produced.
    #[serde(default)]
    pub retry_count: u32,
    /// Adapter that validated this result, when validation ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<AdapterId>,
    /// Validator score in [0, 1], when validation ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<f64>,
}

/// Output of one adapter invocation for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: Uuid,
    pub task_id: Uuid,
    pub adapter: AdapterId,
    /// Opaque output text. Empty on failure.
    pub output: String,
    /// Error description. Empty on success.
    pub error: String,
    pub metadata: ResultMetadata,
    pub created_at: DateTime<Utc>,
}

impl TaskResult {
    /// Build a success result. The output must be non-empty.
    pub fn success(task_id: Uuid, adapter: AdapterId, output: impl Into<String>) -> Self {
        let output = output.into();
        debug_assert!(!output.is_empty(), "success result needs a non-empty output");
        Self {
            id: Uuid::new_v4(),
            task_id,
            adapter,
            output,
            error: String::new(),
            metadata: ResultMetadata::default(),
            created_at: Utc::now(),
        }
    }

    /// Build a failure result. The error must be non-empty.
    pub fn failure(task_id: Uuid, adapter: AdapterId, error: impl Into<String>) -> Self {
        let error = error.into();
        debug_assert!(!error.is_empty(), "failure result needs a non-empty error");
        Self {
            id: Uuid::new_v4(),
            task_id,
            adapter,
            output: String::new(),
            error,
            metadata: ResultMetadata::default(),
            created_at: Utc::now(),
        }
    }

    /// Set metadata (builder).
    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Derived quality score in [0, 1].
    ///
    /// clamp(1 − 0.1·retries + blend(validation) − penalty(slow)), where
    /// blend = 0.2·(validation_score − 0.5) and penalty = 0.2 when execution
    /// time exceeded 10 s.
    pub fn quality_score(&self) -> f64 {
        if !self.is_success() {
            return 0.0;
        }
        let mut score = 1.0 - 0.1 * f64::from(self.metadata.retry_count);
        if let Some(validation) = self.metadata.validation_score {
            score += 0.2 * (validation - 0.5);
        }
        if self.metadata.execution_time_ms > SLOW_EXECUTION_MS {
            score -= 0.2;
        }
        score.clamp(0.0, 1.0)
    }
}
