//! Adapter registry.
//!
//! Keyed by [`AdapterId`]; registration is idempotent (re-registering an id
//! replaces the previous instance) and deregistration cancels nothing in
//! flight. The registry also caches the latest health probe per adapter and
//! produces the immutable routing snapshot the router consumes.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{AdapterHealth, AdapterId, AdapterProfile, TaskKind};
use crate::domain::ports::AssistantAdapter;
use crate::services::router::RoutingSnapshot;

/// Registry of live adapter instances.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<AdapterId, Arc<dyn AssistantAdapter>>>,
    health: RwLock<HashMap<AdapterId, AdapterHealth>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
        }
    }

    /// Register an adapter under its own id. Idempotent.
    pub async fn register(&self, adapter: Arc<dyn AssistantAdapter>) {
        let id = adapter.id();
        let mut adapters = self.adapters.write().await;
        if adapters.insert(id, adapter).is_some() {
            tracing::debug!(adapter = %id, "adapter re-registered, previous instance replaced");
        }
    }

    /// Remove an adapter. In-flight invocations keep their own `Arc` and
    /// run to completion.
    pub async fn deregister(&self, id: AdapterId) -> bool {
        let removed = self.adapters.write().await.remove(&id).is_some();
        if removed {
            self.health.write().await.remove(&id);
        }
        removed
    }

    /// Look up an adapter, or fail with the adapter-unavailable error.
    pub async fn get(&self, id: AdapterId) -> OrchestratorResult<Arc<dyn AssistantAdapter>> {
        self.adapters
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| OrchestratorError::AdapterUnavailable(id.to_string()))
    }

    pub async fn contains(&self, id: AdapterId) -> bool {
        self.adapters.read().await.contains_key(&id)
    }

    /// Registered ids in deterministic order.
    pub async fn ids(&self) -> Vec<AdapterId> {
        let mut ids: Vec<AdapterId> = self.adapters.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Probe every adapter and cache the results.
    pub async fn refresh_health(&self) -> HashMap<AdapterId, AdapterHealth> {
        let adapters: Vec<(AdapterId, Arc<dyn AssistantAdapter>)> = {
            let map = self.adapters.read().await;
            map.iter().map(|(id, a)| (*id, a.clone())).collect()
        };
        let mut fresh = HashMap::new();
        for (id, adapter) in adapters {
            fresh.insert(id, adapter.health().await);
        }
        *self.health.write().await = fresh.clone();
        fresh
    }

    /// Last cached health snapshot.
    pub async fn health_snapshot(&self) -> HashMap<AdapterId, AdapterHealth> {
        self.health.read().await.clone()
    }

    /// Static registration profile of every live adapter: declared
    /// capability tags plus the compatibility set, in id order.
    pub async fn profiles(&self) -> Vec<AdapterProfile> {
        let adapters = self.adapters.read().await;
        let mut profiles: Vec<AdapterProfile> = adapters
            .values()
            .map(|adapter| {
                let mut profile = AdapterProfile::new(adapter.id())
                    .with_kinds(TaskKind::ALL.iter().copied().filter(|k| adapter.supports(*k)));
                for tag in adapter.capabilities() {
                    profile = profile.with_capability(tag);
                }
                profile
            })
            .collect();
        profiles.sort_by_key(|p| p.id);
        profiles
    }

    /// Immutable routing view: supported kinds and capabilities per
    /// adapter, plus the caller-provided learned hints.
    pub async fn routing_snapshot(
        &self,
        learned_hints: HashMap<TaskKind, AdapterId>,
    ) -> RoutingSnapshot {
        let mut supported = HashMap::new();
        let mut capabilities = HashMap::new();
        for profile in self.profiles().await {
            supported.insert(profile.id, profile.supported_kinds);
            capabilities.insert(profile.id, profile.capabilities);
        }
        RoutingSnapshot {
            supported,
            capabilities,
            learned_hints,
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
