//! Generic "run with backoff" engine.
//!
//! Executes an async action up to `max_attempts` times, consulting the
//! provider's circuit breaker before every attempt. Delays grow
//! exponentially to a cap, optionally jittered by ±25%; a rate-limit
//! error carrying a server-supplied retry-after hint overrides the
//! computed delay verbatim. When attempts are exhausted the last error
//! is returned unchanged so callers can inspect its concrete kind.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lodestone_core::config::RetryConfig;
use lodestone_core::errors::{EmbedResult, EmbeddingError};
use rand::Rng;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;

/// Custom retryability override, consulted before the error's own
/// recoverability flag.
pub type RetryPredicate = Arc<dyn Fn(&EmbeddingError) -> bool + Send + Sync>;

/// Runtime retry policy, one instance per call-site or per provider.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    /// Hard bound on a single attempt. Expiry cancels the in-flight call
    /// and counts as a consumed, recoverable attempt.
    pub attempt_timeout: Duration,
    pub retry_if: Option<RetryPredicate>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("retry_if", &self.retry_if.as_ref().map(|_| "<predicate>"))
            .finish()
    }
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
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            retry_if: None,
        }
    }

    /// Attach a custom retryability predicate.
    pub fn with_retry_if(mut self, predicate: RetryPredicate) -> Self {
        self.retry_if = Some(predicate);
        self
    }

    /// Delay after the given failed attempt (1-based), before jitter:
    /// `min(initial * multiplier^(attempt-1), max)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * exp)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Whether the given error is worth another attempt: custom predicate
    /// first, else the taxonomy's recoverability flag.
    fn should_retry(&self, error: &EmbeddingError) -> bool {
        match &self.retry_if {
            Some(predicate) => predicate(error),
            None => error.is_recoverable(),
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
    }
}

/// Run `op` under the policy, gated by the provider's circuit breaker.
///
/// The breaker is consulted before every attempt, not only the first: a
/// loop that keeps failing can trip the breaker mid-loop, after which
/// the remaining attempts short-circuit with `CircuitOpen` instead of
/// calling the provider again. The breaker lock is never held across an
/// await.
///
/// Caller-level cancellation is dropping the returned future; no further
/// attempts are started.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    breaker: &Mutex<CircuitBreaker>,
    mut op: F,
) -> EmbedResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EmbedResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;

        breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_call_permitted()?;

        let error = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => {
                breaker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record_success();
                return Ok(value);
            }
            Ok(Err(error)) => error,
            // The in-flight call is dropped here, it cannot complete later
            // and corrupt a subsequent attempt's state.
            Err(_elapsed) => EmbeddingError::Timeout {
                seconds: policy.attempt_timeout.as_secs(),
            },
        };

        // Only provider-health failures feed the breaker; a validation
        // error is the caller's fault, not the backend's.
        if error.is_recoverable() {
            breaker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_failure();
        }

        if !policy.should_retry(&error) {
            return Err(error);
        }
        if attempt >= policy.max_attempts {
            debug!(attempts = attempt, error = %error, "retry attempts exhausted");
            return Err(error);
        }

        let delay = match error.retry_after_secs() {
            // Server told us when to come back; use that verbatim.
            Some(secs) => Duration::from_secs(secs),
            None => policy.jittered(policy.backoff_delay(attempt)),
        };
        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "attempt failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
