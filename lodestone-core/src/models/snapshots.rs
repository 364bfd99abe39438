use serde::{Deserialize, Serialize};

use super::circuit_state::CircuitState;
use super::provider_descriptor::ProviderDescriptor;

/// Read-only copy of one provider's running counters.
///
/// Counters record terminal call outcomes: a call that succeeded after
/// two internal retries is one request and one success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderStatsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub tokens_processed: u64,
    pub estimated_cost_usd: f64,
    pub avg_latency_ms: f64,
    pub last_error: Option<String>,
}

/// Everything an operator needs to see about one registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub descriptor: ProviderDescriptor,
    pub circuit_state: CircuitState,
    pub stats: ProviderStatsSnapshot,
}

/// Full registry introspection: active pointer plus every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub active_provider: Option<String>,
    pub fallback_order: Vec<String>,
    pub providers: Vec<ProviderSnapshot>,
}
