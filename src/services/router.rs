//! Task router.
//!
//! Chooses an adapter for a task from a priority-ordered strategy chain and
//! a capability-scoring fallback. Routing is pure: it reads an immutable
//! [`RoutingSnapshot`] of registry state and learned hints and performs no
//! I/O, so the same task and snapshot always route identically.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{AdapterId, RouterConfig, Task, TaskKind, TaskPriority};

/// Immutable view of the adapter world at routing time.
#[derive(Debug, Clone, Default)]
pub struct RoutingSnapshot {
    /// Kinds each registered adapter may execute.
    pub supported: HashMap<AdapterId, BTreeSet<TaskKind>>,
    /// Declared capability tags per adapter.
    pub capabilities: HashMap<AdapterId, BTreeSet<String>>,
    /// Learned preferred adapter per kind (from the learning loop).
    pub learned_hints: HashMap<TaskKind, AdapterId>,
}

impl RoutingSnapshot {
    pub fn can_execute(&self, adapter: AdapterId, kind: TaskKind) -> bool {
        self.supported
            .get(&adapter)
            .is_some_and(|kinds| kinds.contains(&kind))
    }

    pub fn has_capability(&self, adapter: AdapterId, tag: &str) -> bool {
        self.capabilities
            .get(&adapter)
            .is_some_and(|tags| tags.contains(tag))
    }

    /// Registered adapters in deterministic id order.
    pub fn adapters(&self) -> Vec<AdapterId> {
        let mut ids: Vec<AdapterId> = self.supported.keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Routing decision: adapter, confidence, and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub adapter: AdapterId,
    pub confidence: f64,
    pub reason: String,
}

/// A router plug-in: a `can_handle` predicate paired with a selector.
pub trait RoutingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Strategies run in descending priority order.
    fn priority(&self) -> u32;

    fn can_handle(&self, task: &Task) -> bool;

    fn select(&self, task: &Task, snapshot: &RoutingSnapshot) -> Option<AdapterId>;
}

/// Static rule table: one designated adapter per task kind.
pub struct RuleBasedStrategy {
    table: HashMap<TaskKind, AdapterId>,
}

impl RuleBasedStrategy {
    pub fn new(table: HashMap<TaskKind, AdapterId>) -> Self {
        Self { table }
    }
}

impl RoutingStrategy for RuleBasedStrategy {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn priority(&self) -> u32 {
        100
    }

    fn can_handle(&self, task: &Task) -> bool {
        self.table.contains_key(&task.kind)
    }

    fn select(&self, task: &Task, snapshot: &RoutingSnapshot) -> Option<AdapterId> {
        let adapter = *self.table.get(&task.kind)?;
        snapshot.can_execute(adapter, task.kind).then_some(adapter)
    }
}

/// Long prompts go to the stronger-reasoning adapter.
pub struct ComplexityStrategy {
    long_prompt_chars: usize,
    reasoning_adapter: AdapterId,
}

impl ComplexityStrategy {
    pub fn new(long_prompt_chars: usize) -> Self {
        Self {
            long_prompt_chars,
            reasoning_adapter: AdapterId::Claude,
        }
    }
}

impl RoutingStrategy for ComplexityStrategy {
    fn name(&self) -> &'static str {
        "complexity_based"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn can_handle(&self, task: &Task) -> bool {
        task.prompt.chars().count() > self.long_prompt_chars
    }

    fn select(&self, task: &Task, snapshot: &RoutingSnapshot) -> Option<AdapterId> {
        snapshot
            .can_execute(self.reasoning_adapter, task.kind)
            .then_some(self.reasoning_adapter)
    }
}

/// High-priority tasks go to the faster adapter.
pub struct PerformanceStrategy {
    fast_adapter: AdapterId,
}

impl PerformanceStrategy {
    pub fn new() -> Self {
        Self {
            fast_adapter: AdapterId::Gemini,
        }
    }
}

impl Default for PerformanceStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingStrategy for PerformanceStrategy {
    fn name(&self) -> &'static str {
        "performance_based"
    }

    fn priority(&self) -> u32 {
        25
    }

    fn can_handle(&self, task: &Task) -> bool {
        task.priority >= TaskPriority::High
    }

    fn select(&self, task: &Task, snapshot: &RoutingSnapshot) -> Option<AdapterId> {
        snapshot
            .can_execute(self.fast_adapter, task.kind)
            .then_some(self.fast_adapter)
    }
}

/// The router: preferred-adapter override, strategy chain, capability
/// fallback.
pub struct TaskRouter {
    strategies: Vec<Arc<dyn RoutingStrategy>>,
}

impl TaskRouter {
    /// Build a router with the default strategies enabled by `config`.
    pub fn new(config: &RouterConfig) -> Self {
        let mut router = Self {
            strategies: Vec::new(),
        };
        for name in &config.strategies {
            match name.as_str() {
                "rule_based" => router.add_strategy(Arc::new(RuleBasedStrategy::new(
                    config.preferred_by_kind.clone(),
                ))),
                "complexity_based" => router.add_strategy(Arc::new(ComplexityStrategy::new(
                    config.long_prompt_chars,
                ))),
                "performance_based" => {
                    router.add_strategy(Arc::new(PerformanceStrategy::new()));
                }
                other => {
                    tracing::warn!(strategy = other, "unknown routing strategy ignored");
                }
            }
        }
        router
    }

    /// Router with no strategies: capability scoring only.
    pub fn bare() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Add a strategy, keeping the chain sorted by descending priority.
    pub fn add_strategy(&mut self, strategy: Arc<dyn RoutingStrategy>) {
        self.strategies.push(strategy);
        self.strategies.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Remove a strategy by name. Returns whether one was removed.
    pub fn remove_strategy(&mut self, name: &str) -> bool {
        let before = self.strategies.len();
        self.strategies.retain(|s| s.name() != name);
        self.strategies.len() != before
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Choose an adapter for the task.
    pub fn route(&self, task: &Task, snapshot: &RoutingSnapshot) -> OrchestratorResult<RoutingDecision> {
        // (a) A compatible preferred adapter always wins.
        if let Some(preferred) = task.metadata.constraints.preferred_adapter {
            if snapshot.can_execute(preferred, task.kind) {
                return Ok(RoutingDecision {
                    adapter: preferred,
                    confidence: 1.0,
                    reason: format!("preferred adapter {preferred} accepts {}", task.kind),
                });
            }
        }

        // (b) First matching strategy in descending priority order.
        for strategy in &self.strategies {
            if !strategy.can_handle(task) {
                continue;
            }
            if let Some(adapter) = strategy.select(task, snapshot) {
                return Ok(RoutingDecision {
                    adapter,
                    confidence: 0.8,
                    reason: format!("strategy {} selected {adapter}", strategy.name()),
                });
            }
        }

        // (c) Capability scorer fallback.
        self.score_by_capability(task, snapshot)
    }

    fn score_by_capability(
        &self,
        task: &Task,
        snapshot: &RoutingSnapshot,
    ) -> OrchestratorResult<RoutingDecision> {
        let mut best: Option<(AdapterId, f64)> = None;
        for adapter in snapshot.adapters() {
            let mut score = 0.0;
            if snapshot.can_execute(adapter, task.kind) {
                score += 0.5;
            }
            if snapshot.has_capability(adapter, task.kind.capability_tag()) {
                score += 0.3;
            }
            if snapshot.learned_hints.get(&task.kind) == Some(&adapter) {
                score += 0.2;
            }
            // Deterministic tie-break: adapters iterate in id order and only
            // a strictly better score displaces the incumbent.
            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((adapter, score));
            }
        }

        match best {
            Some((adapter, score)) => Ok(RoutingDecision {
                adapter,
                confidence: score,
                reason: format!("capability score {score:.2} for {adapter}"),
            }),
            None => Err(OrchestratorError::AdapterUnavailable(format!(
                "no adapter can execute {} tasks",
                task.kind
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskConstraints;

    fn snapshot() -> RoutingSnapshot {
        let mut supported = HashMap::new();
        supported.insert(
            AdapterId::Claude,
            TaskKind::ALL.iter().copied().collect::<BTreeSet<_>>(),
        );
        supported.insert(
            AdapterId::Gemini,
            [TaskKind::Multimodal, TaskKind::Search, TaskKind::CodeGeneration]
                .into_iter()
                .collect(),
        );
        let mut capabilities = HashMap::new();
        capabilities.insert(
            AdapterId::Gemini,
            ["multimodal".to_string(), "search".to_string()]
                .into_iter()
                .collect(),
        );
        capabilities.insert(AdapterId::Claude, BTreeSet::new());
        RoutingSnapshot {
            supported,
            capabilities,
            learned_hints: HashMap::new(),
        }
    }

    fn default_router() -> TaskRouter {
        TaskRouter::new(&RouterConfig::default())
    }

    #[test]
    fn test_preferred_adapter_wins_when_compatible() {
        let task = Task::new(TaskKind::CodeGeneration, "sum of array")
            .unwrap()
            .with_constraints(TaskConstraints {
                preferred_adapter: Some(AdapterId::Gemini),
                ..Default::default()
            })
            .unwrap();
        let decision = default_router().route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Gemini);
        assert!((decision.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_incompatible_preference_falls_through() {
        // Gemini does not support refactoring in this snapshot.
        let task = Task::new(TaskKind::Refactoring, "rename X to Y")
            .unwrap()
            .with_constraints(TaskConstraints {
                preferred_adapter: Some(AdapterId::Gemini),
                ..Default::default()
            })
            .unwrap();
        let decision = default_router().route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Claude);
    }

    #[test]
    fn test_rule_table_routes_refactoring_to_claude() {
        let task = Task::new(TaskKind::Refactoring, "rename X to Y").unwrap();
        let decision = default_router().route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Claude);
        assert!((decision.confidence - 0.8).abs() < f64::EPSILON);
        assert!(decision.reason.contains("rule_based"));
    }

    #[test]
    fn test_rule_table_routes_search_to_gemini() {
        let task = Task::new(TaskKind::Search, "find the relevant docs").unwrap();
        let decision = default_router().route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Gemini);
    }

    #[test]
    fn test_capability_fallback_scoring() {
        let mut router = default_router();
        router.remove_strategy("rule_based");
        router.remove_strategy("complexity_based");
        router.remove_strategy("performance_based");

        // Gemini: can execute (0.5) + capability tag (0.3) = 0.8.
        let task = Task::new(TaskKind::Multimodal, "describe this diagram").unwrap();
        let decision = router.route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Gemini);
        assert!((decision.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_learned_hint_adds_weight() {
        let router = TaskRouter::bare();
        let mut snap = snapshot();
        snap.learned_hints.insert(TaskKind::CodeGeneration, AdapterId::Gemini);

        let task = Task::new(TaskKind::CodeGeneration, "sum of array").unwrap();
        let decision = router.route(&task, &snap).unwrap();
        // Claude 0.5 vs Gemini 0.5 + 0.2 hint.
        assert_eq!(decision.adapter, AdapterId::Gemini);
        assert!((decision.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_tie_breaks_by_adapter_id_order() {
        let router = TaskRouter::bare();
        let task = Task::new(TaskKind::CodeGeneration, "sum of array").unwrap();
        // Claude and Gemini both score 0.5; Claude sorts first.
        let decision = router.route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Claude);
    }

    #[test]
    fn test_route_is_deterministic() {
        let router = default_router();
        let snap = snapshot();
        let task = Task::new(TaskKind::Debugging, "fix the panic in main").unwrap();
        let first = router.route(&task, &snap).unwrap();
        for _ in 0..10 {
            assert_eq!(router.route(&task, &snap).unwrap(), first);
        }
    }

    #[test]
    fn test_no_capable_adapter_errors() {
        let router = default_router();
        let task = Task::new(TaskKind::Validation, "check this output").unwrap();
        let empty = RoutingSnapshot::default();
        let err = router.route(&task, &empty).unwrap_err();
        assert_eq!(err.code(), "ADAPTER_UNAVAILABLE");
    }

    #[test]
    fn test_performance_strategy_prefers_fast_adapter() {
        let mut router = TaskRouter::bare();
        router.add_strategy(Arc::new(PerformanceStrategy::new()));
        let task = Task::new(TaskKind::CodeGeneration, "quick fix please")
            .unwrap()
            .with_priority(TaskPriority::High);
        let decision = router.route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Gemini);

        // Medium priority: strategy does not engage, falls to scoring.
        let task = Task::new(TaskKind::CodeGeneration, "quick fix please").unwrap();
        let decision = router.route(&task, &snapshot()).unwrap();
        assert_eq!(decision.adapter, AdapterId::Claude);
    }

    #[test]
    fn test_strategies_sorted_by_priority() {
        let router = default_router();
        assert_eq!(
            router.strategy_names(),
            vec!["rule_based", "complexity_based", "performance_based"]
        );
    }

    #[test]
    fn test_add_remove_strategy_at_runtime() {
        let mut router = default_router();
        assert!(router.remove_strategy("rule_based"));
        assert!(!router.remove_strategy("rule_based"));
        router.add_strategy(Arc::new(RuleBasedStrategy::new(
            RouterConfig::default().preferred_by_kind,
        )));
        assert_eq!(router.strategy_names()[0], "rule_based");
    }
}
