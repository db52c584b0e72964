//! Event bus for orchestration lifecycle events.
//!
//! Events carry a wire name (`task:started`, `node:failover`, …) and a
//! JSON-compatible payload. Fan-out uses a tokio broadcast channel;
//! filtered subscriptions (exact name, `*` wildcard, regex) are forwarded
//! over dedicated mpsc channels. No delivery ordering is guaranteed across
//! subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::AdapterId;

/// Lifecycle event emitted by the core.
///
/// The `context:*` family (compression events) is consumed, not produced,
/// here: filters must be able to match those names, but no constructor for
/// them exists in the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    TaskCreated {
        task_id: Uuid,
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        ts: DateTime<Utc>,
    },
    TaskStarted {
        task_id: Uuid,
        ts: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: Uuid,
        result_id: Uuid,
        adapter: AdapterId,
        success: bool,
        ts: DateTime<Utc>,
    },
    TaskFailed {
        task_id: Uuid,
        error: String,
        ts: DateTime<Utc>,
    },
    TaskSubmitted {
        task_id: Uuid,
        node_id: String,
    },
    CollaborationStarted {
        task_id: Uuid,
        mode: String,
        adapters: Vec<AdapterId>,
        ts: DateTime<Utc>,
    },
    CollaborationCompleted {
        task_id: Uuid,
        mode: String,
        adapters: Vec<AdapterId>,
        ts: DateTime<Utc>,
    },
    ResultsCompared {
        task_id: Uuid,
        result_count: usize,
        consensus: bool,
        ts: DateTime<Utc>,
    },
    NodeFailover {
        failed_node_id: String,
    },
    PerformanceInsights {
        stats: serde_json::Value,
    },
}

impl OrchestratorEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task:created",
            Self::TaskStarted { .. } => "task:started",
            Self::TaskCompleted { .. } => "task:completed",
            Self::TaskFailed { .. } => "task:failed",
            Self::TaskSubmitted { .. } => "task:submitted",
            Self::CollaborationStarted { .. } => "collaboration:started",
            Self::CollaborationCompleted { .. } => "collaboration:completed",
            Self::ResultsCompared { .. } => "results:compared",
            Self::NodeFailover { .. } => "node:failover",
            Self::PerformanceInsights { .. } => "insights:performance",
        }
    }

    /// Task this event concerns, when any.
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::TaskStarted { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskSubmitted { task_id, .. }
            | Self::CollaborationStarted { task_id, .. }
            | Self::CollaborationCompleted { task_id, .. }
            | Self::ResultsCompared { task_id, .. } => Some(*task_id),
            Self::NodeFailover { .. } | Self::PerformanceInsights { .. } => None,
        }
    }
}

/// Subscription filter over event names.
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Match every event.
    All,
    /// Exact wire-name match.
    Exact(String),
    /// Glob-style pattern where `*` matches any run of characters,
    /// e.g. `task:*`.
    Wildcard(String),
    /// Full regex over the wire name.
    Regex(regex::Regex),
}

impl EventFilter {
    pub fn wildcard(pattern: &str) -> OrchestratorResult<Self> {
        if pattern.is_empty() {
            return Err(OrchestratorError::Validation(
                "wildcard pattern cannot be empty".into(),
            ));
        }
        Ok(Self::Wildcard(pattern.to_string()))
    }

    pub fn regex(pattern: &str) -> OrchestratorResult<Self> {
        let re = regex::Regex::new(pattern)
            .map_err(|e| OrchestratorError::Validation(format!("invalid event regex: {e}")))?;
        Ok(Self::Regex(re))
    }

    /// Whether this filter matches an event name.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(expected) => expected == name,
            Self::Wildcard(pattern) => wildcard_match(pattern, name),
            Self::Regex(re) => re.is_match(name),
        }
    }
}

/// Glob match where `*` spans any run of characters.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == name;
    }
    let mut rest = name;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Configuration for the event bus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Broadcast channel capacity.
    pub channel_capacity: usize,
    /// Capacity of each filtered forwarder channel.
    pub filtered_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            filtered_capacity: 256,
        }
    }
}

/// Central pub/sub bus for lifecycle events.
pub struct EventBus {
    sender: broadcast::Sender<OrchestratorEvent>,
    sequence: AtomicU64,
    config: EventBusConfig,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EventBusConfig::default())
    }

    /// Publish an event to all subscribers. Send errors (no subscribers)
    /// are ignored.
    pub fn publish(&self, event: OrchestratorEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(event = event.name(), task_id = ?event.task_id(), "event published");
        let _ = self.sender.send(event);
    }

    /// Subscribe to the raw stream of all events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter. A forwarder task copies matching events
    /// onto the returned channel until the bus or the receiver is dropped.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> mpsc::Receiver<OrchestratorEvent> {
        let (tx, rx) = mpsc::channel(self.config.filtered_capacity);
        let mut source = self.sender.subscribe();
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if filter.matches(event.name()) && tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "filtered subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }

    /// Number of events published so far.
    pub fn published_count(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Number of active raw subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_defaults()
    }
}
