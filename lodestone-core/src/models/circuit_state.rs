use serde::{Deserialize, Serialize};

/// Circuit breaker state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls proceed.
    Closed,
    /// Provider believed broken, calls are rejected without being made.
    Open,
    /// Probing: a bounded number of calls allowed through to test recovery.
    HalfOpen,
}
