//! Per-provider running counters.
//!
//! Counters record terminal call outcomes only: a call that succeeded
//! after two internal retries is one request and one success, so
//! operators see "N calls, M failed" rather than "N×attempts calls".
//! Incremented atomically; safe for concurrent embed paths and the
//! health-check loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use lodestone_core::errors::EmbeddingError;
use lodestone_core::models::ProviderStatsSnapshot;

/// Running counters for one registered provider. Owned by the registry.
#[derive(Debug, Default)]
pub struct ProviderStats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    tokens_processed: AtomicU64,
    latency_total_ms: AtomicU64,
    latency_samples: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Rough token estimate for cost/throughput accounting when the backend
/// does not report usage: ~4 characters per token.
pub fn estimate_tokens(texts: &[String]) -> u64 {
    let chars: usize = texts.iter().map(|t| t.chars().count()).sum();
    (chars / 4).max(1) as u64
}

impl ProviderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal success with the tokens processed and the
    /// observed wall-clock latency (including internal retries).
    pub fn record_success(&self, tokens: u64, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.tokens_processed.fetch_add(tokens, Ordering::Relaxed);
        self.latency_total_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a terminal failure.
    pub fn record_failure(&self, error: &EmbeddingError) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }

    /// Read-only snapshot. `cost_per_million_tokens` comes from the
    /// provider's descriptor.
    pub fn snapshot(&self, cost_per_million_tokens: f64) -> ProviderStatsSnapshot {
        let tokens = self.tokens_processed.load(Ordering::Relaxed);
        let samples = self.latency_samples.load(Ordering::Relaxed);
        let avg_latency_ms = if samples == 0 {
            0.0
        } else {
            self.latency_total_ms.load(Ordering::Relaxed) as f64 / samples as f64
        };
        ProviderStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            tokens_processed: tokens,
            estimated_cost_usd: tokens as f64 / 1_000_000.0 * cost_per_million_tokens,
            avg_latency_ms,
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_terminal_outcomes() {
        let stats = ProviderStats::new();
        stats.record_success(1_000, Duration::from_millis(40));
        stats.record_success(3_000, Duration::from_millis(60));
        stats.record_failure(&EmbeddingError::Network {
            reason: "refused".into(),
        });

        let snap = stats.snapshot(0.02);
        assert_eq!(snap.requests, 3);
        assert_eq!(snap.successes, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.tokens_processed, 4_000);
        assert!((snap.avg_latency_ms - 50.0).abs() < f64::EPSILON);
        assert!((snap.estimated_cost_usd - 0.00008).abs() < 1e-12);
        assert!(snap.last_error.unwrap().contains("refused"));
    }

    #[test]
    fn token_estimate_floors_at_one() {
        assert_eq!(estimate_tokens(&["hi".to_string()]), 1);
        let long = vec!["a".repeat(400)];
        assert_eq!(estimate_tokens(&long), 100);
    }
}
