//! Task domain model.
//!
//! A task is a single unit of assistant work: a typed prompt with priority,
//! constraints, and a status state machine. Invariants (prompt length,
//! minimum timeout) are enforced at construction so no invalid task exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::domain::error::{OrchestratorError, OrchestratorResult};

use super::adapter::AdapterId;

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 10_000;

/// Minimum accepted per-task timeout.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// The closed set of typed intents a task can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CodeGeneration,
    CodeReview,
    Debugging,
    Refactoring,
    Documentation,
    Testing,
    Architecture,
    Search,
    Multimodal,
    Validation,
}

impl TaskKind {
    /// All kinds, in declaration order.
    pub const ALL: [TaskKind; 10] = [
        Self::CodeGeneration,
        Self::CodeReview,
        Self::Debugging,
        Self::Refactoring,
        Self::Documentation,
        Self::Testing,
        Self::Architecture,
        Self::Search,
        Self::Multimodal,
        Self::Validation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::CodeReview => "code_review",
            Self::Debugging => "debugging",
            Self::Refactoring => "refactoring",
            Self::Documentation => "documentation",
            Self::Testing => "testing",
            Self::Architecture => "architecture",
            Self::Search => "search",
            Self::Multimodal => "multimodal",
            Self::Validation => "validation",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "code_generation" | "code-generation" => Some(Self::CodeGeneration),
            "code_review" | "code-review" => Some(Self::CodeReview),
            "debugging" => Some(Self::Debugging),
            "refactoring" => Some(Self::Refactoring),
            "documentation" => Some(Self::Documentation),
            "testing" => Some(Self::Testing),
            "architecture" => Some(Self::Architecture),
            "search" => Some(Self::Search),
            "multimodal" => Some(Self::Multimodal),
            "validation" => Some(Self::Validation),
            _ => None,
        }
    }

    /// Capability tag an adapter declares to claim affinity with this kind.
    pub fn capability_tag(&self) -> &'static str {
        self.as_str()
    }

    /// Whether outputs for this kind are expected to contain code.
    pub fn is_code_kind(&self) -> bool {
        matches!(
            self,
            Self::CodeGeneration | Self::CodeReview | Self::Debugging | Self::Refactoring | Self::Testing
        )
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority level for tasks. Ordered: Low < Medium < High < Urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 0,
    Medium = 1,
    High = 2,
    Urgent = 3,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" | "critical" => Some(Self::Urgent),
            _ => None,
        }
    }

    /// Queue weight subtracted from the submission timestamp when scoring.
    /// Higher weight sorts ahead of everything submitted under a lower one.
    pub fn queue_weight(&self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 500_000_000,
            Self::High => 1_000_000_000,
            Self::Urgent => 1_500_000_000,
        }
    }
}

/// Status of a task in the orchestration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, not yet picked up.
    Pending,
    /// An adapter invocation is underway.
    InProgress,
    /// Finished with a success result.
    Completed,
    /// Finished with an error result; may return to Pending for retry.
    Failed,
    /// Cancelled by the caller. Terminal.
    Cancelled,
    /// Completed and confirmed by the validator. Terminal.
    Validated,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Validated => "validated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "validated" => Some(Self::Validated),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Validated)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed => &[Self::Validated],
            Self::Failed => &[Self::Pending],
            Self::Cancelled | Self::Validated => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Hard limits a caller attaches to a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConstraints {
    /// Execution deadline. Must be ≥ [`MIN_TIMEOUT_MS`] when set.
    pub timeout_ms: Option<u64>,
    /// Maximum in-process retry attempts.
    pub max_retries: Option<u32>,
    /// Adapter the caller wants, honoured when compatible.
    pub preferred_adapter: Option<AdapterId>,
}

impl TaskConstraints {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if let Some(timeout) = self.timeout_ms {
            if timeout < MIN_TIMEOUT_MS {
                return Err(OrchestratorError::Validation(format!(
                    "constraints.timeout_ms must be at least {MIN_TIMEOUT_MS} ms, got {timeout}"
                )));
            }
        }
        Ok(())
    }
}

/// Free-form metadata: tags, context map, and constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub constraints: TaskConstraints,
}

/// A single unit of assistant work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: Uuid,
    /// Typed intent.
    pub kind: TaskKind,
    /// The prompt. Non-empty, at most [`MAX_PROMPT_CHARS`] characters.
    pub prompt: String,
    /// Priority; editable while the task is non-terminal.
    pub priority: TaskPriority,
    /// Lifecycle state; mutated only through [`Task::transition_to`].
    pub status: TaskStatus,
    /// Tags, context, constraints.
    pub metadata: TaskMetadata,
    /// Owning tenant.
    pub owner_id: Option<String>,
    /// Originating template.
    pub template_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task. Fails when the prompt or constraints
    /// violate the construction invariants.
    pub fn new(kind: TaskKind, prompt: impl Into<String>) -> OrchestratorResult<Self> {
        let prompt = prompt.into();
        validate_prompt(&prompt)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            prompt,
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            metadata: TaskMetadata::default(),
            owner_id: None,
            template_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Set priority (builder).
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach constraints (builder). Fails on an out-of-range timeout.
    pub fn with_constraints(mut self, constraints: TaskConstraints) -> OrchestratorResult<Self> {
        constraints.validate()?;
        self.metadata.constraints = constraints;
        Ok(self)
    }

    /// Add a tag (builder).
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.insert(tag.into());
        self
    }

    /// Set owner (builder).
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_id = Some(owner.into());
        self
    }

    /// Set template id (builder).
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template_id = Some(template.into());
        self
    }

    /// Add a context entry (builder).
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.context.insert(key.into(), value);
        self
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Move to a new status. Any invalid transition fails and leaves the
    /// task untouched; `updated_at` moves only on success.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> OrchestratorResult<()> {
        if !self.can_transition_to(new_status) {
            return Err(OrchestratorError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the prompt. Allowed only while Pending.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> OrchestratorResult<()> {
        if self.status != TaskStatus::Pending {
            return Err(OrchestratorError::Validation(format!(
                "prompt may only be edited while pending (status is {})",
                self.status.as_str()
            )));
        }
        let prompt = prompt.into();
        validate_prompt(&prompt)?;
        self.prompt = prompt;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Update priority. Allowed in any non-terminal state.
    pub fn set_priority(&mut self, priority: TaskPriority) -> OrchestratorResult<()> {
        if self.status.is_terminal() {
            return Err(OrchestratorError::Validation(format!(
                "priority may not be updated in terminal state {}",
                self.status.as_str()
            )));
        }
        self.priority = priority;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Resolved execution timeout given engine options and defaults.
    pub fn effective_timeout_ms(&self, option_timeout: Option<u64>, default_timeout: u64) -> u64 {
        let mut timeout = default_timeout;
        if let Some(t) = self.metadata.constraints.timeout_ms {
            timeout = timeout.min(t);
        }
        if let Some(t) = option_timeout {
            timeout = timeout.min(t);
        }
        timeout
    }
}

fn validate_prompt(prompt: &str) -> OrchestratorResult<()> {
    if prompt.trim().is_empty() {
        return Err(OrchestratorError::Validation("prompt cannot be empty".into()));
    }
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(OrchestratorError::Validation(format!(
            "prompt exceeds {MAX_PROMPT_CHARS} characters ({chars})"
        )));
    }
    Ok(())
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
