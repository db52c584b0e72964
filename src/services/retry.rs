//! Retry manager with exponential backoff and jitter.
//!
//! Delays follow `clamp(initial · multiplier^(n−1), 0, max)` with a ±20 %
//! jitter by default. Whether an error is retried at all is decided purely
//! on its stable code via [`OrchestratorError::is_retryable`], optionally
//! overridden by per-engine allow/deny code lists.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::RetryConfig;

/// Retry policy driving bounded re-attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    /// Codes retried even when the default classification says no.
    allow_codes: Vec<String>,
    /// Codes never retried; wins over everything else.
    deny_codes: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            allow_codes: Vec::new(),
            deny_codes: Vec::new(),
        }
    }

    /// Override the attempt budget (builder).
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.config.attempts = attempts;
        self
    }

    /// Install allow/deny code lists (builder).
    pub fn with_code_lists(mut self, allow: Vec<String>, deny: Vec<String>) -> Self {
        self.allow_codes = allow;
        self.deny_codes = deny;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.config.attempts.max(1)
    }

    /// Whether this error may be retried under this policy.
    pub fn should_retry(&self, error: &OrchestratorError) -> bool {
        let code = error.code();
        if self.deny_codes.iter().any(|c| c == code) {
            return false;
        }
        if self.allow_codes.iter().any(|c| c == code) {
            return true;
        }
        error.is_retryable()
    }

    /// Backoff before retry attempt `n` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let delay_ms = (self.config.initial_delay_ms as f64
            * self.config.multiplier.powi(exp as i32))
        .min(self.config.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Inclusive delay bounds for attempt `n` once jitter is applied.
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let base = self.base_delay(attempt).as_millis() as f64;
        let low = base * (1.0 - self.config.jitter);
        let high = base * (1.0 + self.config.jitter);
        (
            Duration::from_millis(low as u64),
            Duration::from_millis(high.ceil() as u64),
        )
    }

    /// Backoff with jitter for retry attempt `n` (1-based).
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        if base <= 0.0 || self.config.jitter <= 0.0 {
            return Duration::from_millis(base as u64);
        }
        let factor = rand::rng().random_range((1.0 - self.config.jitter)..=(1.0 + self.config.jitter));
        Duration::from_millis((base * factor) as u64)
    }

    /// Run an operation with retries.
    ///
    /// Retryable failures are swallowed until the attempt budget is spent,
    /// then the last error surfaces. Non-retryable failures surface
    /// immediately after a single attempt.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> OrchestratorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OrchestratorResult<T>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= attempts || !self.should_retry(&err) {
                        return Err(err);
                    }
                    let delay = self.jittered_delay(attempt);
                    tracing::debug!(
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        code = err.code(),
                        "retrying after backoff"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
