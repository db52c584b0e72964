//! Distributed coordinator.
//!
//! Each node runs three loops against the shared coordination store: a poll
//! loop that claims queued tasks and executes them, a heartbeat loop that
//! leases `node:<id>` and watches peers, and a pub/sub listener handling
//! failover, priority updates, and rebalance announcements. Claims give
//! at-most-one-running per task id within a lease; an expired lease is an
//! orphan any node may re-queue.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{
    score_for, ClusterConfig, NodeRecord, NodeStatus, QueueStatus, Task, TaskEnvelope,
    TaskPriority, TaskStatus, MAX_QUEUE_RETRIES, TASK_BODY_TTL_MS,
};
use crate::domain::ports::{ClusterMessage, CoordinationStore};

use super::event_bus::{EventBus, OrchestratorEvent};
use super::execution_engine::{ExecutionEngine, ExecutionOptions};

/// Aggregate cluster view for stats surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStats {
    pub queue_depth: usize,
    pub active_nodes: Vec<NodeRecord>,
    pub live_claims: usize,
}

/// One node of the distributed coordinator.
pub struct DistributedCoordinator {
    node_id: String,
    store: Arc<dyn CoordinationStore>,
    engine: Arc<ExecutionEngine>,
    bus: Arc<EventBus>,
    config: ClusterConfig,
    record: RwLock<NodeRecord>,
    load: Arc<AtomicU32>,
    max_concurrency: Arc<AtomicU32>,
    initial_max_concurrency: u32,
    tasks_processed: Arc<AtomicU64>,
    shutdown: watch::Sender<bool>,
}

impl DistributedCoordinator {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        engine: Arc<ExecutionEngine>,
        bus: Arc<EventBus>,
        config: ClusterConfig,
    ) -> Self {
        let node_id = config
            .node_id
            .clone()
            .unwrap_or_else(|| format!("node-{}", Uuid::new_v4()));
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let mut record = NodeRecord::new(node_id.clone(), hostname, config.max_concurrency);
        record.status = NodeStatus::Active;
        let (shutdown, _) = watch::channel(false);
        Self {
            node_id,
            store,
            engine,
            bus,
            max_concurrency: Arc::new(AtomicU32::new(record.max_concurrency)),
            initial_max_concurrency: record.max_concurrency,
            record: RwLock::new(record),
            load: Arc::new(AtomicU32::new(0)),
            tasks_processed: Arc::new(AtomicU64::new(0)),
            config,
            shutdown,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn current_load(&self) -> u32 {
        self.load.load(Ordering::SeqCst)
    }

    pub fn max_concurrency(&self) -> u32 {
        self.max_concurrency.load(Ordering::SeqCst)
    }

    /// Submit a task to the shared queue: atomically write the body, insert
    /// into the queue, and publish `task:submitted`.
    pub async fn submit(&self, task: Task) -> OrchestratorResult<Uuid> {
        let envelope = TaskEnvelope::new(task);
        let task_id = envelope.task.id;
        let score = envelope.priority_score();
        self.store
            .submit(&envelope, TASK_BODY_TTL_MS, score, &self.node_id)
            .await?;
        self.bus.publish(OrchestratorEvent::TaskCreated {
            task_id,
            kind: envelope.task.kind.as_str().to_string(),
            user_id: envelope.task.owner_id.clone(),
            ts: Utc::now(),
        });
        self.bus.publish(OrchestratorEvent::TaskSubmitted {
            task_id,
            node_id: self.node_id.clone(),
        });
        tracing::info!(task_id = %task_id, score, "task submitted to queue");
        Ok(task_id)
    }

    /// Update a queued task's priority cluster-wide.
    pub async fn update_priority(
        &self,
        task_id: Uuid,
        priority: TaskPriority,
    ) -> OrchestratorResult<()> {
        let Some(mut envelope) = self.store.get_envelope(task_id).await? else {
            return Err(OrchestratorError::TaskNotFound(task_id));
        };
        envelope.priority = priority;
        envelope.task.set_priority(priority)?;
        self.store.update_envelope(&envelope).await?;
        self.store
            .publish(ClusterMessage::PriorityUpdate { task_id, priority })
            .await?;
        Ok(())
    }

    /// Cancel a task cluster-wide.
    ///
    /// A still-queued task moves to Cancelled. A task already claimed
    /// becomes Failed, not Pending: the running invocation is not
    /// preempted, but its envelope will never be re-queued.
    pub async fn cancel(&self, task_id: Uuid) -> OrchestratorResult<()> {
        let Some(mut envelope) = self.store.get_envelope(task_id).await? else {
            return Err(OrchestratorError::TaskNotFound(task_id));
        };

        let was_queued = self.store.remove_from_queue(task_id).await?;
        if was_queued {
            envelope.status = QueueStatus::Failed;
            if envelope.task.can_transition_to(TaskStatus::Cancelled) {
                envelope.task.transition_to(TaskStatus::Cancelled)?;
            }
            self.store.update_envelope(&envelope).await?;
            tracing::info!(task_id = %task_id, "queued task cancelled");
            return Ok(());
        }

        // Claimed or already processing: mark failed terminally.
        envelope.status = QueueStatus::Failed;
        envelope.retry_count = MAX_QUEUE_RETRIES + 1;
        if envelope.task.can_transition_to(TaskStatus::Failed) {
            envelope.task.transition_to(TaskStatus::Failed)?;
        }
        self.store.update_envelope(&envelope).await?;
        tracing::info!(task_id = %task_id, "claimed task cancelled, marked failed");
        Ok(())
    }

    /// Start the node loops. Returns join handles; call [`Self::shutdown`]
    /// to stop them.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        handles.push(tokio::spawn(Arc::clone(self).poll_loop()));
        handles.push(tokio::spawn(Arc::clone(self).heartbeat_loop()));
        handles.push(tokio::spawn(Arc::clone(self).listen_loop()));
        handles
    }

    /// Signal every loop to stop after its current step.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Claim-and-execute loop. Yields without claiming while at capacity.
    async fn poll_loop(self: Arc<Self>) {
        let mut stop = self.shutdown.subscribe();
        let poll_interval = std::time::Duration::from_millis(self.config.poll_interval_ms);
        loop {
            if *stop.borrow() {
                break;
            }
            if self.load.load(Ordering::SeqCst) >= self.max_concurrency.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = stop.changed() => {}
                }
                continue;
            }

            match self
                .store
                .claim_next(&self.node_id, self.config.claim_ttl_ms)
                .await
            {
                Ok(Some(task_id)) => {
                    self.load.fetch_add(1, Ordering::SeqCst);
                    let node = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = node.process_claim(task_id).await {
                            tracing::warn!(task_id = %task_id, error = %err, "claim processing failed");
                        }
                        node.load.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = stop.changed() => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "claim poll failed");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
        tracing::debug!(node = %self.node_id, "poll loop stopped");
    }

    /// Execute one claimed task end to end.
    async fn process_claim(&self, task_id: Uuid) -> OrchestratorResult<()> {
        let Some(mut envelope) = self.store.get_envelope(task_id).await? else {
            // Body expired under us; drop the claim.
            self.store.release_claim(task_id).await?;
            return Ok(());
        };

        envelope.start_processing(&self.node_id);
        self.store.update_envelope(&envelope).await?;

        // The engine needs the task locally. A task failed here earlier is
        // rewound so the retry can start again.
        match self.engine.tasks().get(task_id).await? {
            None => self.engine.tasks().insert(&envelope.task).await?,
            Some(mut local) => {
                if local.status == TaskStatus::Failed {
                    local.transition_to(TaskStatus::Pending)?;
                    self.engine.tasks().update(&local).await?;
                }
            }
        }

        let outcome = self
            .engine
            .execute(task_id, ExecutionOptions::default().with_retry())
            .await;

        match outcome {
            Ok(result) => {
                envelope.status = QueueStatus::Completed;
                envelope.result = Some(result);
                self.store.update_envelope(&envelope).await?;
                self.store
                    .publish(ClusterMessage::TaskCompleted {
                        task_id,
                        node_id: self.node_id.clone(),
                    })
                    .await?;
                self.tasks_processed.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                envelope.status = QueueStatus::Failed;
                self.store.update_envelope(&envelope).await?;
                if err.is_retryable() {
                    self.requeue(envelope).await?;
                } else {
                    tracing::warn!(task_id = %task_id, code = err.code(), "task failed terminally");
                }
            }
        }

        self.store.release_claim(task_id).await?;
        Ok(())
    }

    /// Queue-level retry. Independent of the engine's in-process retries.
    async fn requeue(&self, mut envelope: TaskEnvelope) -> OrchestratorResult<()> {
        envelope.retry_count += 1;
        if envelope.retry_count > MAX_QUEUE_RETRIES {
            envelope.status = QueueStatus::Failed;
            self.store.update_envelope(&envelope).await?;
            tracing::warn!(
                task_id = %envelope.task.id,
                retries = envelope.retry_count,
                "queue retry budget exhausted"
            );
            return Ok(());
        }

        // The engine left the local task Failed; rewind the envelope copy so
        // the next claimer starts from Pending.
        if envelope.task.can_transition_to(TaskStatus::Pending) {
            envelope.task.transition_to(TaskStatus::Pending)?;
        }
        envelope.status = QueueStatus::Queued;
        envelope.node_id = None;
        envelope.started_at = None;
        self.store.update_envelope(&envelope).await?;

        let score = score_for(Utc::now(), envelope.priority);
        self.store.enqueue(envelope.task.id, score).await?;
        tracing::info!(
            task_id = %envelope.task.id,
            retry = envelope.retry_count,
            "task re-queued"
        );
        Ok(())
    }

    /// Lease refresh plus peer liveness sweep.
    async fn heartbeat_loop(self: Arc<Self>) {
        let mut stop = self.shutdown.subscribe();
        let interval = std::time::Duration::from_millis(self.config.heartbeat_interval_ms);
        // Lease survives ~6 missed beats, matching the default 10s/60s pair.
        let node_ttl_ms = self.config.heartbeat_interval_ms.saturating_mul(6);
        let mut known_peer_count = 1usize;
        loop {
            if *stop.borrow() {
                break;
            }

            // Refresh our own lease with a load snapshot.
            {
                let mut record = self.record.write().await;
                record.max_concurrency = self.max_concurrency.load(Ordering::SeqCst);
                record.beat(
                    self.load.load(Ordering::SeqCst),
                    self.tasks_processed.load(Ordering::SeqCst),
                );
                if let Err(err) = self.store.heartbeat(&record, node_ttl_ms).await {
                    tracing::warn!(error = %err, "heartbeat write failed");
                }
            }

            // Sweep peers whose lease disappeared.
            if let Ok(members) = self.store.active_nodes().await {
                let mut live = 0usize;
                for peer in &members {
                    if peer == &self.node_id {
                        live += 1;
                        continue;
                    }
                    match self.store.get_node(peer).await {
                        Ok(Some(_)) => live += 1,
                        Ok(None) => {
                            tracing::warn!(peer = %peer, "peer heartbeat lost, declaring failover");
                            let _ = self.store.remove_node(peer).await;
                            let _ = self
                                .store
                                .publish(ClusterMessage::NodeFailover {
                                    failed_node_id: peer.clone(),
                                })
                                .await;
                        }
                        Err(err) => {
                            tracing::warn!(peer = %peer, error = %err, "peer probe failed");
                            live += 1;
                        }
                    }
                }

                if live != known_peer_count && live > 0 {
                    known_peer_count = live;
                    let _ = self
                        .store
                        .publish(ClusterMessage::Rebalance { active_nodes: live })
                        .await;
                    self.rebalance(live);
                }
            }

            // Re-queue orphans: claims whose TTL expired.
            if let Ok(claims) = self.store.claims().await {
                let now = Utc::now();
                for claim in claims {
                    if claim.is_expired(now) {
                        tracing::warn!(task_id = %claim.task_id, owner = %claim.node_id, "orphaned claim, re-queuing");
                        let _ = self.reclaim_orphan(claim.task_id).await;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop.changed() => {}
            }
        }
        tracing::debug!(node = %self.node_id, "heartbeat loop stopped");
    }

    /// Pub/sub listener: failover sweeps, priority updates, rebalances.
    async fn listen_loop(self: Arc<Self>) {
        let mut stop = self.shutdown.subscribe();
        let mut messages = self.store.subscribe();
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                msg = messages.recv() => match msg {
                    Ok(ClusterMessage::NodeFailover { failed_node_id }) => {
                        self.bus.publish(OrchestratorEvent::NodeFailover {
                            failed_node_id: failed_node_id.clone(),
                        });
                        if let Err(err) = self.recover_node_claims(&failed_node_id).await {
                            tracing::warn!(failed_node = %failed_node_id, error = %err, "failover recovery failed");
                        }
                    }
                    Ok(ClusterMessage::PriorityUpdate { task_id, priority }) => {
                        if let Ok(Some(envelope)) = self.store.get_envelope(task_id).await {
                            let score = envelope.rescored(priority);
                            match self.store.rescore(task_id, score).await {
                                Ok(true) => {
                                    tracing::debug!(task_id = %task_id, priority = %priority, "queue entry re-scored");
                                }
                                Ok(false) => {} // not queued right now
                                Err(err) => {
                                    tracing::warn!(task_id = %task_id, error = %err, "re-score failed");
                                }
                            }
                        }
                    }
                    Ok(ClusterMessage::Rebalance { active_nodes }) => {
                        self.rebalance(active_nodes);
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "cluster listener lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!(node = %self.node_id, "listener loop stopped");
    }

    /// Re-queue every claim owned by a failed node.
    async fn recover_node_claims(&self, failed_node_id: &str) -> OrchestratorResult<()> {
        let claims = self.store.claims().await?;
        for claim in claims {
            if claim.node_id == failed_node_id {
                tracing::info!(task_id = %claim.task_id, failed_node = %failed_node_id, "recovering claim from failed node");
                self.reclaim_orphan(claim.task_id).await?;
            }
        }
        Ok(())
    }

    /// Release a dead claim and push the task back into the queue.
    async fn reclaim_orphan(&self, task_id: Uuid) -> OrchestratorResult<()> {
        self.store.release_claim(task_id).await?;
        let Some(envelope) = self.store.get_envelope(task_id).await? else {
            return Ok(());
        };
        // Completed work stays completed; everything else goes around again.
        if envelope.status == QueueStatus::Completed {
            return Ok(());
        }
        self.requeue(envelope).await
    }

    /// Shrink or grow concurrency with cluster membership.
    fn rebalance(&self, active_nodes: usize) {
        let target = (self.initial_max_concurrency as usize / active_nodes.max(1)).max(1) as u32;
        let previous = self.max_concurrency.swap(target, Ordering::SeqCst);
        if previous != target {
            tracing::info!(
                node = %self.node_id,
                active_nodes,
                previous,
                target,
                "max concurrency rebalanced"
            );
        }
    }

    /// Cluster-wide stats snapshot.
    pub async fn cluster_stats(&self) -> OrchestratorResult<ClusterStats> {
        let queue_depth = self.store.queue_len().await?;
        let mut active = Vec::new();
        for id in self.store.active_nodes().await? {
            if let Some(record) = self.store.get_node(&id).await? {
                active.push(record);
            }
        }
        let now = Utc::now();
        let live_claims = self
            .store
            .claims()
            .await?
            .into_iter()
            .filter(|c| !c.is_expired(now))
            .count();
        Ok(ClusterStats {
            queue_depth,
            active_nodes: active,
            live_claims,
        })
    }
}
