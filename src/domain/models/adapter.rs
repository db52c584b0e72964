//! Adapter registration domain model.
//!
//! Adapters are the back-end assistants behind the orchestration layer.
//! The id set is closed; adapters are looked up by id, never by reference,
//! so re-registration is safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::task::TaskKind;

/// Identifier of a back-end assistant. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterId {
    /// Strong-reasoning assistant; default for code-centric work.
    Claude,
    /// Fast assistant with multimodal and search strengths.
    Gemini,
    /// Scriptable in-process assistant for tests and demos.
    Mock,
}

impl AdapterId {
    /// All known adapter ids, in deterministic order (used for tie-breaks).
    pub const ALL: [AdapterId; 3] = [Self::Claude, Self::Gemini, Self::Mock];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Mock => "mock",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "claude" => Some(Self::Claude),
            "gemini" => Some(Self::Gemini),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

impl std::fmt::Display for AdapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime health classification of an adapter backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Whether the adapter should still receive traffic.
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

/// Health probe result reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterHealth {
    pub status: HealthStatus,
    /// Latency sample from the most recent probe.
    pub latency_ms: Option<u64>,
    pub last_check: DateTime<Utc>,
    pub details: Option<String>,
}

impl AdapterHealth {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            last_check: Utc::now(),
            details: None,
        }
    }

    pub fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            last_check: Utc::now(),
            details: Some(details.into()),
        }
    }
}

/// Static declaration of what an adapter can do.
///
/// Capabilities are free-form tags; the compatibility set is the closed list
/// of task kinds the adapter may execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterProfile {
    pub id: AdapterId,
    pub capabilities: BTreeSet<String>,
    pub supported_kinds: BTreeSet<TaskKind>,
}

impl AdapterProfile {
    pub fn new(id: AdapterId) -> Self {
        Self {
            id,
            capabilities: BTreeSet::new(),
            supported_kinds: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.insert(tag.into());
        self
    }

    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.supported_kinds.insert(kind);
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = TaskKind>) -> Self {
        self.supported_kinds.extend(kinds);
        self
    }

    pub fn supports(&self, kind: TaskKind) -> bool {
        self.supported_kinds.contains(&kind)
    }
}
