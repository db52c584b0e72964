//! Per-key circuit breaker.
//!
//! Closed until the consecutive-failure count reaches the threshold, then
//! open for the reset timeout. Requests against an open circuit fail fast.
//! After the timeout a single half-open probe is admitted; enough
//! consecutive half-open successes close the circuit again, any half-open
//! failure reopens it. Transitions are serialised per key and observable
//! through an optional listener channel.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::BreakerConfig;

/// State of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Transition event delivered to the listener.
#[derive(Debug, Clone)]
pub struct CircuitTransition {
    pub key: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: DateTime<Utc>,
}

/// Observable statistics for one circuit.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    pub key: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Outcomes within the monitoring window: (failures, successes).
    pub window_failures: usize,
    pub window_successes: usize,
}

/// One circuit's bookkeeping.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    failure_count: u32,
    success_count: u32,
    half_open_successes: u32,
    last_failure_at: Option<DateTime<Utc>>,
    next_attempt_at: Option<DateTime<Utc>>,
    /// Sliding window of (timestamp, success) outcomes.
    window: VecDeque<(DateTime<Utc>, bool)>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            failure_count: 0,
            success_count: 0,
            half_open_successes: 0,
            last_failure_at: None,
            next_attempt_at: None,
            window: VecDeque::new(),
        }
    }

    fn prune_window(&mut self, config: &BreakerConfig, now: DateTime<Utc>) {
        let cutoff = now - Duration::milliseconds(config.monitoring_window_ms as i64);
        while let Some((ts, _)) = self.window.front() {
            if *ts < cutoff {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn open(&mut self, config: &BreakerConfig, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.next_attempt_at = Some(now + Duration::milliseconds(config.reset_timeout_ms as i64));
        self.half_open_successes = 0;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.half_open_successes = 0;
        self.next_attempt_at = None;
    }
}

/// Circuit breaker service managing one circuit per key.
pub struct CircuitBreakerService {
    config: BreakerConfig,
    circuits: Arc<RwLock<HashMap<String, Circuit>>>,
    listener: Option<tokio::sync::mpsc::Sender<CircuitTransition>>,
}

impl CircuitBreakerService {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            circuits: Arc::new(RwLock::new(HashMap::new())),
            listener: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BreakerConfig::default())
    }

    /// Attach a transition listener.
    pub fn with_listener(mut self, sender: tokio::sync::mpsc::Sender<CircuitTransition>) -> Self {
        self.listener = Some(sender);
        self
    }

    /// Check whether a request may proceed for this key.
    ///
    /// In the open state this fails fast with the circuit-open error unless
    /// the reset timeout has elapsed, in which case the circuit moves to
    /// half-open and this single probe is admitted.
    pub async fn check(&self, key: &str) -> OrchestratorResult<()> {
        let now = Utc::now();
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(key.to_string()).or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let next_attempt = circuit.next_attempt_at.unwrap_or(now);
                if now >= next_attempt {
                    let from = circuit.state;
                    circuit.state = CircuitState::HalfOpen;
                    circuit.half_open_successes = 0;
                    self.notify(key, from, CircuitState::HalfOpen, now);
                    Ok(())
                } else {
                    Err(OrchestratorError::CircuitOpen {
                        key: key.to_string(),
                        retry_after: next_attempt,
                    })
                }
            }
        }
    }

    /// Record a successful outcome for this key.
    pub async fn record_success(&self, key: &str) {
        let now = Utc::now();
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(key.to_string()).or_insert_with(Circuit::new);
        circuit.success_count += 1;
        circuit.window.push_back((now, true));
        circuit.prune_window(&self.config, now);

        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                if circuit.half_open_successes >= self.config.half_open_attempts {
                    circuit.close();
                    self.notify(key, CircuitState::HalfOpen, CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed outcome for this key.
    pub async fn record_failure(&self, key: &str) {
        let now = Utc::now();
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(key.to_string()).or_insert_with(Circuit::new);
        circuit.failure_count += 1;
        circuit.last_failure_at = Some(now);
        circuit.window.push_back((now, false));
        circuit.prune_window(&self.config, now);

        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    circuit.open(&self.config, now);
                    self.notify(key, CircuitState::Closed, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                circuit.open(&self.config, now);
                self.notify(key, CircuitState::HalfOpen, CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Current state of a key's circuit, if one exists.
    pub async fn state(&self, key: &str) -> Option<CircuitState> {
        let circuits = self.circuits.read().await;
        circuits.get(key).map(|c| c.state)
    }

    /// Statistics for every known circuit.
    pub async fn stats(&self) -> Vec<CircuitStats> {
        let circuits = self.circuits.read().await;
        circuits
            .iter()
            .map(|(key, c)| CircuitStats {
                key: key.clone(),
                state: c.state,
                failure_count: c.failure_count,
                success_count: c.success_count,
                last_failure_at: c.last_failure_at,
                next_attempt_at: c.next_attempt_at,
                window_failures: c.window.iter().filter(|(_, ok)| !ok).count(),
                window_successes: c.window.iter().filter(|(_, ok)| *ok).count(),
            })
            .collect()
    }

    /// Manually reset one circuit.
    pub async fn reset(&self, key: &str) {
        let mut circuits = self.circuits.write().await;
        if let Some(circuit) = circuits.get_mut(key) {
            circuit.close();
            circuit.window.clear();
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn notify(&self, key: &str, from: CircuitState, to: CircuitState, at: DateTime<Utc>) {
        if let Some(ref sender) = self.listener {
            let _ = sender.try_send(CircuitTransition {
                key: key.to_string(),
                from,
                to,
                at,
            });
        }
    }
}
