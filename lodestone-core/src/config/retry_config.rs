use serde::{Deserialize, Serialize};

use super::defaults;

/// Retry engine configuration.
///
/// The computed delay before attempt `n` (1-based) is
/// `min(initial_delay_ms * backoff_multiplier^(n-1), max_delay_ms)`,
/// optionally jittered by ±25%.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Upper bound on any computed delay (milliseconds).
    pub max_delay_ms: u64,
    /// Exponential growth factor between attempts.
    pub backoff_multiplier: f64,
    /// Randomize each delay by ±25% to avoid synchronized retry storms.
    pub jitter: bool,
    /// Hard bound on a single attempt (seconds). A timeout counts as a
    /// consumed, recoverable attempt.
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: defaults::DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: defaults::DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: defaults::DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
            attempt_timeout_secs: defaults::DEFAULT_ATTEMPT_TIMEOUT_SECS,
        }
    }
}

/// Circuit breaker thresholds, one instance per registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures in `Closed` before the breaker opens.
    pub failure_threshold: u32,
    /// How long an `Open` breaker waits before allowing a probe (seconds).
    pub reset_timeout_secs: u64,
    /// Consecutive `HalfOpen` successes required to close again.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_secs: defaults::DEFAULT_RESET_TIMEOUT_SECS,
            success_threshold: defaults::DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}
