//! In-memory reference implementation of the coordination store.
//!
//! All shared state lives behind one mutex, which makes `submit` and
//! `claim_next` genuinely atomic: a claim pops the best queue entry and
//! writes its lease in one critical section, so no two nodes can claim the
//! same task while a lease is live. TTLs are lazy: leases and bodies are
//! checked against the clock on read.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{ClaimRecord, NodeRecord, TaskEnvelope};
use crate::domain::ports::{ClusterMessage, CoordinationStore};

struct StoreInner {
    /// `task:<id>` bodies with expiry.
    bodies: HashMap<Uuid, (TaskEnvelope, DateTime<Utc>)>,
    /// `task:queue`: ordered set of (score, task id); iteration order is
    /// ascending, so the first element is the best claim.
    queue: BTreeSet<(i64, Uuid)>,
    /// Reverse index for rescore/removal.
    queue_index: HashMap<Uuid, i64>,
    /// `task:claim:<id>` leases.
    claims: HashMap<Uuid, ClaimRecord>,
    /// `node:<id>` leased records.
    nodes: HashMap<String, (NodeRecord, DateTime<Utc>)>,
    /// `nodes:active` membership set.
    active: BTreeSet<String>,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            queue: BTreeSet::new(),
            queue_index: HashMap::new(),
            claims: HashMap::new(),
            nodes: HashMap::new(),
            active: BTreeSet::new(),
        }
    }

    fn insert_queue(&mut self, task_id: Uuid, score: i64) {
        if let Some(old) = self.queue_index.insert(task_id, score) {
            self.queue.remove(&(old, task_id));
        }
        self.queue.insert((score, task_id));
    }

    fn remove_queue(&mut self, task_id: Uuid) -> bool {
        match self.queue_index.remove(&task_id) {
            Some(score) => self.queue.remove(&(score, task_id)),
            None => false,
        }
    }
}

/// Single-process coordination store.
pub struct InMemoryCoordinationStore {
    inner: Mutex<StoreInner>,
    publisher: broadcast::Sender<ClusterMessage>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        let (publisher, _) = broadcast::channel(1024);
        Self {
            inner: Mutex::new(StoreInner::new()),
            publisher,
        }
    }
}

impl Default for InMemoryCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn submit(
        &self,
        envelope: &TaskEnvelope,
        body_ttl_ms: u64,
        score: i64,
        node_id: &str,
    ) -> OrchestratorResult<()> {
        let task_id = envelope.task.id;
        {
            let mut inner = self.inner.lock().await;
            let expires = Utc::now() + Duration::milliseconds(body_ttl_ms as i64);
            inner.bodies.insert(task_id, (envelope.clone(), expires));
            inner.insert_queue(task_id, score);
        }
        let _ = self.publisher.send(ClusterMessage::TaskSubmitted {
            task_id,
            node_id: node_id.to_string(),
        });
        Ok(())
    }

    async fn get_envelope(&self, task_id: Uuid) -> OrchestratorResult<Option<TaskEnvelope>> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        if let Some((_, expires)) = inner.bodies.get(&task_id) {
            if *expires <= now {
                inner.bodies.remove(&task_id);
                return Ok(None);
            }
        }
        Ok(inner.bodies.get(&task_id).map(|(env, _)| env.clone()))
    }

    async fn update_envelope(&self, envelope: &TaskEnvelope) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        let task_id = envelope.task.id;
        match inner.bodies.get_mut(&task_id) {
            Some((stored, _expires)) => {
                *stored = envelope.clone();
                Ok(())
            }
            None => Err(OrchestratorError::Storage(format!(
                "no body stored for task {task_id}"
            ))),
        }
    }

    async fn enqueue(&self, task_id: Uuid, score: i64) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        inner.insert_queue(task_id, score);
        Ok(())
    }

    async fn remove_from_queue(&self, task_id: Uuid) -> OrchestratorResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.remove_queue(task_id))
    }

    async fn rescore(&self, task_id: Uuid, score: i64) -> OrchestratorResult<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.queue_index.contains_key(&task_id) {
            return Ok(false);
        }
        inner.insert_queue(task_id, score);
        Ok(true)
    }

    async fn queue_len(&self) -> OrchestratorResult<usize> {
        Ok(self.inner.lock().await.queue.len())
    }

    async fn claim_next(
        &self,
        node_id: &str,
        claim_ttl_ms: u64,
    ) -> OrchestratorResult<Option<Uuid>> {
        let mut inner = self.inner.lock().await;
        // Pop the minimal score: highest priority weight, oldest first.
        let Some(&(score, task_id)) = inner.queue.iter().next() else {
            return Ok(None);
        };
        inner.queue.remove(&(score, task_id));
        inner.queue_index.remove(&task_id);
        inner
            .claims
            .insert(task_id, ClaimRecord::new(task_id, node_id, claim_ttl_ms));
        Ok(Some(task_id))
    }

    async fn release_claim(&self, task_id: Uuid) -> OrchestratorResult<()> {
        self.inner.lock().await.claims.remove(&task_id);
        Ok(())
    }

    async fn claims(&self) -> OrchestratorResult<Vec<ClaimRecord>> {
        Ok(self.inner.lock().await.claims.values().cloned().collect())
    }

    async fn heartbeat(&self, node: &NodeRecord, ttl_ms: u64) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        let expires = Utc::now() + Duration::milliseconds(ttl_ms as i64);
        inner.nodes.insert(node.id.clone(), (node.clone(), expires));
        inner.active.insert(node.id.clone());
        Ok(())
    }

    async fn get_node(&self, node_id: &str) -> OrchestratorResult<Option<NodeRecord>> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        if let Some((_, expires)) = inner.nodes.get(node_id) {
            if *expires <= now {
                // Lease lapsed: the record is gone, membership stays until
                // a peer sweeps it.
                inner.nodes.remove(node_id);
                return Ok(None);
            }
        }
        Ok(inner.nodes.get(node_id).map(|(record, _)| record.clone()))
    }

    async fn active_nodes(&self) -> OrchestratorResult<Vec<String>> {
        Ok(self.inner.lock().await.active.iter().cloned().collect())
    }

    async fn remove_node(&self, node_id: &str) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        inner.active.remove(node_id);
        inner.nodes.remove(node_id);
        Ok(())
    }

    async fn publish(&self, message: ClusterMessage) -> OrchestratorResult<()> {
        let _ = self.publisher.send(message);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ClusterMessage> {
        self.publisher.subscribe()
    }
}
