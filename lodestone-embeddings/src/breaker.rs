//! Per-provider circuit breaker.
//!
//! Three states: `Closed` (normal), `Open` (reject without calling),
//! `HalfOpen` (bounded probing). The `Open → HalfOpen` transition is
//! lazy: it happens inside the state-read path once the reset timeout
//! has elapsed, not via a background timer.

use std::time::Duration;

use lodestone_core::config::BreakerConfig;
use lodestone_core::errors::{EmbedResult, EmbeddingError};
use lodestone_core::models::CircuitState;
use tokio::time::Instant;
use tracing::{info, warn};

/// Failure-tracking state machine for one provider.
///
/// Mutated only by the retry/breaker integration, never by provider
/// code. Callers hold it behind a `Mutex` that is never kept across an
/// await point.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider_id: String,
    config: BreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    /// Meaningful only in `HalfOpen`.
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(provider_id: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            provider_id: provider_id.into(),
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
        }
    }

    /// Current state, applying the lazy `Open → HalfOpen` transition if
    /// the reset timeout has elapsed since the last failure.
    pub fn current_state(&mut self) -> CircuitState {
        if self.state == CircuitState::Open {
            let reset_timeout = Duration::from_secs(self.config.reset_timeout_secs);
            let elapsed = self
                .last_failure_at
                .map(|at| at.elapsed() >= reset_timeout)
                .unwrap_or(true);
            if elapsed {
                info!(provider = %self.provider_id, "circuit breaker half-open, probing");
                self.state = CircuitState::HalfOpen;
                self.consecutive_successes = 0;
            }
        }
        self.state
    }

    /// Gate consulted before every call attempt. Rejects with
    /// `CircuitOpen` while the breaker is open, without invoking the
    /// provider.
    pub fn check_call_permitted(&mut self) -> EmbedResult<()> {
        match self.current_state() {
            CircuitState::Open => Err(EmbeddingError::CircuitOpen {
                provider: self.provider_id.clone(),
            }),
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
        }
    }

    /// Record a successful call outcome.
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = self.consecutive_failures.saturating_sub(1);
            }
            CircuitState::HalfOpen => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.config.success_threshold {
                    info!(provider = %self.provider_id, "circuit breaker closed");
                    self.state = CircuitState::Closed;
                    self.consecutive_failures = 0;
                    self.consecutive_successes = 0;
                }
            }
            // A success cannot arrive while Open: the gate rejected the call.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call outcome.
    pub fn record_failure(&mut self) {
        self.last_failure_at = Some(Instant::now());
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        provider = %self.provider_id,
                        failures = self.consecutive_failures,
                        "circuit breaker opened"
                    );
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                // One failed probe reopens immediately, whatever the
                // success count was.
                warn!(provider = %self.provider_id, "probe failed, circuit breaker reopened");
                self.state = CircuitState::Open;
                self.consecutive_successes = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, reset_timeout_secs: u64, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test-provider",
            BreakerConfig {
                failure_threshold,
                reset_timeout_secs,
                success_threshold,
            },
        )
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let mut b = breaker(5, 60, 2);
        for _ in 0..4 {
            b.record_failure();
            assert_eq!(b.current_state(), CircuitState::Closed);
        }
        b.record_failure();
        assert_eq!(b.current_state(), CircuitState::Open);
        assert!(matches!(
            b.check_call_permitted(),
            Err(EmbeddingError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn success_decrements_failure_count_with_floor() {
        let mut b = breaker(3, 60, 1);
        b.record_success(); // floor at zero
        b.record_failure();
        b.record_failure();
        b.record_success(); // back to 1
        b.record_failure(); // 2, still closed
        assert_eq!(b.current_state(), CircuitState::Closed);
        b.record_failure(); // 3, opens
        assert_eq!(b.current_state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_after_reset_timeout() {
        let mut b = breaker(1, 60, 2);
        b.record_failure();
        assert_eq!(b.current_state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(b.current_state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(b.current_state(), CircuitState::HalfOpen);
        assert!(b.check_call_permitted().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_closes_after_success_threshold() {
        let mut b = breaker(1, 1, 2);
        b.record_failure();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(b.current_state(), CircuitState::HalfOpen);

        b.record_success();
        assert_eq!(b.current_state(), CircuitState::HalfOpen);
        b.record_success();
        assert_eq!(b.current_state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let mut b = breaker(1, 1, 3);
        b.record_failure();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(b.current_state(), CircuitState::HalfOpen);

        b.record_success();
        b.record_success();
        b.record_failure(); // discards accrued successes
        assert_eq!(b.current_state(), CircuitState::Open);

        // Needs a fresh full reset window before probing again.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(b.current_state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(b.current_state(), CircuitState::HalfOpen);
    }
}
