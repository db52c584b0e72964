//! Learning feedback loop.
//!
//! Ingests post-execution feedback, keeps rolling per-(kind, adapter)
//! aggregates, emits periodic performance insights, and answers routing
//! hints. State is serde-serialisable so it can be persisted and reloaded
//! between runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{AdapterId, FeedbackRecord, RoutingAggregate, TaskKind};

use super::event_bus::{EventBus, OrchestratorEvent};

/// Configuration of the learning loop.
#[derive(Debug, Clone)]
pub struct LearningConfig {
    /// Emit `insights:performance` every this many feedback records.
    pub insight_interval: u64,
    /// Observations required before an adapter becomes a strong hint.
    pub strong_hint_min_count: u64,
    /// Success rate required for a strong hint.
    pub strong_hint_min_rate: f64,
    /// Fallback suggestion when nothing has been learned.
    pub default_adapter: AdapterId,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            insight_interval: 10,
            strong_hint_min_count: 5,
            strong_hint_min_rate: 0.8,
            default_adapter: AdapterId::Claude,
        }
    }
}

/// Serialisable learning state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    /// Aggregates nested kind → adapter → aggregate.
    pub aggregates: BTreeMap<TaskKind, BTreeMap<AdapterId, RoutingAggregate>>,
    /// Total feedback records absorbed.
    pub feedback_count: u64,
}

impl LearningState {
    fn aggregate_mut(&mut self, kind: TaskKind, adapter: AdapterId) -> &mut RoutingAggregate {
        self.aggregates
            .entry(kind)
            .or_default()
            .entry(adapter)
            .or_default()
    }

    /// Best-success-rate adapter for a kind, ties broken by adapter id.
    fn best_for(&self, kind: TaskKind) -> Option<(AdapterId, &RoutingAggregate)> {
        let per_adapter = self.aggregates.get(&kind)?;
        per_adapter
            .iter()
            .max_by(|(id_a, a), (id_b, b)| {
                a.success_rate()
                    .partial_cmp(&b.success_rate())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // BTreeMap iterates ascending; prefer the smaller id on
                    // ties by inverting the id comparison.
                    .then_with(|| id_b.cmp(id_a))
            })
            .map(|(id, agg)| (*id, agg))
    }
}

/// The learning loop service.
pub struct LearningLoop {
    config: LearningConfig,
    state: RwLock<LearningState>,
    bus: Option<Arc<EventBus>>,
}

impl LearningLoop {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            state: RwLock::new(LearningState::default()),
            bus: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(LearningConfig::default())
    }

    /// Attach an event bus for `insights:performance` emissions.
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Absorb one feedback record.
    pub async fn record(&self, feedback: FeedbackRecord) {
        let snapshot = {
            let mut state = self.state.write().await;
            state.aggregate_mut(feedback.kind, feedback.adapter).absorb(&feedback);
            state.feedback_count += 1;
            if state.feedback_count % self.config.insight_interval == 0 {
                Some(self.insights_payload(&state))
            } else {
                None
            }
        };

        if let (Some(stats), Some(bus)) = (snapshot, &self.bus) {
            bus.publish(OrchestratorEvent::PerformanceInsights { stats });
        }
    }

    /// Suggested adapter for a task kind.
    ///
    /// A strong learned hint wins; otherwise the adapter with the highest
    /// success rate for the kind; otherwise the static default.
    pub async fn suggest(&self, kind: TaskKind) -> AdapterId {
        let state = self.state.read().await;
        match state.best_for(kind) {
            Some((adapter, _)) => adapter,
            None => self.config.default_adapter,
        }
    }

    /// Strong hints per kind, for the routing snapshot. Only pairs with
    /// enough observations and a high success rate qualify.
    pub async fn strong_hints(&self) -> HashMap<TaskKind, AdapterId> {
        let state = self.state.read().await;
        let mut hints = HashMap::new();
        for kind in TaskKind::ALL {
            if let Some((adapter, aggregate)) = state.best_for(kind) {
                if aggregate.count >= self.config.strong_hint_min_count
                    && aggregate.success_rate() >= self.config.strong_hint_min_rate
                {
                    hints.insert(kind, adapter);
                }
            }
        }
        hints
    }

    /// Aggregate for one (kind, adapter) pair.
    pub async fn aggregate(&self, kind: TaskKind, adapter: AdapterId) -> Option<RoutingAggregate> {
        let state = self.state.read().await;
        state.aggregates.get(&kind)?.get(&adapter).cloned()
    }

    /// Export the full state for persistence.
    pub async fn export(&self) -> LearningState {
        self.state.read().await.clone()
    }

    /// Replace the state with a previously exported one.
    pub async fn import(&self, state: LearningState) {
        *self.state.write().await = state;
    }

    fn insights_payload(&self, state: &LearningState) -> serde_json::Value {
        let mut per_pair = Vec::new();
        for (kind, adapters) in &state.aggregates {
            for (adapter, aggregate) in adapters {
                per_pair.push(serde_json::json!({
                    "kind": kind.as_str(),
                    "adapter": adapter.as_str(),
                    "count": aggregate.count,
                    "success_rate": aggregate.success_rate(),
                    "mean_execution_time_ms": aggregate.mean_execution_time_ms(),
                    "mean_satisfaction": aggregate.mean_satisfaction(),
                }));
            }
        }
        serde_json::json!({
            "feedback_count": state.feedback_count,
            "pairs": per_pair,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(adapter: AdapterId, success: bool) -> FeedbackRecord {
        FeedbackRecord::new(TaskKind::CodeGeneration, adapter, success, 1_000)
    }

    #[tokio::test]
    async fn test_e6_learning_shift() {
        let loop_ = LearningLoop::with_defaults();
        for _ in 0..5 {
            loop_.record(feedback(AdapterId::Claude, true)).await;
            loop_.record(feedback(AdapterId::Gemini, false)).await;
        }

        assert_eq!(loop_.suggest(TaskKind::CodeGeneration).await, AdapterId::Claude);
        let claude = loop_
            .aggregate(TaskKind::CodeGeneration, AdapterId::Claude)
            .await
            .unwrap();
        assert!((claude.success_rate() - 1.0).abs() < f64::EPSILON);
        let gemini = loop_
            .aggregate(TaskKind::CodeGeneration, AdapterId::Gemini)
            .await
            .unwrap();
        assert!((gemini.success_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_suggest_falls_back_to_default() {
        let loop_ = LearningLoop::with_defaults();
        assert_eq!(loop_.suggest(TaskKind::Search).await, AdapterId::Claude);

        let custom = LearningLoop::new(LearningConfig {
            default_adapter: AdapterId::Gemini,
            ..Default::default()
        });
        assert_eq!(custom.suggest(TaskKind::Search).await, AdapterId::Gemini);
    }

    #[tokio::test]
    async fn test_strong_hints_require_volume_and_rate() {
        let loop_ = LearningLoop::with_defaults();
        // Three successes: high rate but below the count threshold.
        for _ in 0..3 {
            loop_.record(feedback(AdapterId::Gemini, true)).await;
        }
        assert!(loop_.strong_hints().await.is_empty());

        for _ in 0..2 {
            loop_.record(feedback(AdapterId::Gemini, true)).await;
        }
        let hints = loop_.strong_hints().await;
        assert_eq!(hints.get(&TaskKind::CodeGeneration), Some(&AdapterId::Gemini));
    }

    #[tokio::test]
    async fn test_insights_emitted_every_interval() {
        let bus = Arc::new(EventBus::with_defaults());
        let mut rx = bus.subscribe();
        let loop_ = LearningLoop::new(LearningConfig {
            insight_interval: 3,
            ..Default::default()
        })
        .with_bus(bus);

        for _ in 0..3 {
            loop_.record(feedback(AdapterId::Claude, true)).await;
        }
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "insights:performance");
        match event {
            OrchestratorEvent::PerformanceInsights { stats } => {
                assert_eq!(stats["feedback_count"], serde_json::json!(3));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_export_import_roundtrip() {
        let loop_ = LearningLoop::with_defaults();
        for _ in 0..4 {
            loop_.record(feedback(AdapterId::Claude, true)).await;
        }
        let exported = loop_.export().await;
        let json = serde_json::to_string(&exported).unwrap();
        let reloaded: LearningState = serde_json::from_str(&json).unwrap();

        let fresh = LearningLoop::with_defaults();
        fresh.import(reloaded).await;
        let aggregate = fresh
            .aggregate(TaskKind::CodeGeneration, AdapterId::Claude)
            .await
            .unwrap();
        assert_eq!(aggregate.count, 4);
    }
}
