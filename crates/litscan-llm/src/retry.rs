//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use litscan_config::RetryConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::LlmError;

/// `max_attempts` tries, sleeping `base * 2^attempt` (optionally capped)
/// between them. There is no sleep after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }

    /// Retries immediately; used where waiting would only slow tests down.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay: Duration::ZERO, max_delay: None }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Runs `op` until it succeeds or attempts are exhausted.
    /// Exhaustion yields `None`; callers substitute their own fallback value.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        self.run_until(label, &CancellationToken::new(), op).await
    }

    /// Like `run`, but gives up once `cancel` fires. The token is checked
    /// before every attempt and interrupts the backoff sleep; an attempt
    /// already in flight runs to completion.
    pub async fn run_until<T, F, Fut>(&self, label: &str, cancel: &CancellationToken, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        for attempt in 0..self.max_attempts {
            if cancel.is_cancelled() {
                debug!(call = label, attempt = attempt + 1, "LLM call abandoned after cancellation");
                return None;
            }
            match op().await {
                Ok(value) => return Some(value),
                Err(e) => {
                    warn!(
                        call = label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "LLM call failed"
                    );
                    if attempt + 1 < self.max_attempts {
                        let delay = self.delay_for(attempt);
                        if !delay.is_zero() {
                            tokio::select! {
                                _ = cancel.cancelled() => return None,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                }
            }
        }
        None
    }
}
