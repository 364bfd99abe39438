//! Subsystem configuration types.
//!
//! The host owns config loading and persistence; these types only define
//! the shape of the values handed to the subsystem at construction and
//! registration time.

pub mod defaults;

mod provider_config;
mod resource_config;
mod retry_config;

use serde::{Deserialize, Serialize};

pub use provider_config::ProviderConfig;
pub use resource_config::ResourceThresholds;
pub use retry_config::{BreakerConfig, RetryConfig};

/// Top-level embedding subsystem configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Providers to register at startup, first entry becomes active.
    pub providers: Vec<ProviderConfig>,
    /// Provider ids tried in order when the active one is unavailable.
    pub fallback_order: Vec<String>,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
    pub resources: ResourceThresholds,
    /// Interval between background synthetic health probes (seconds).
    pub health_check_interval_secs: Option<u64>,
}

impl EmbeddingConfig {
    /// Health-check interval, falling back to the default (five minutes).
    pub fn health_check_interval_secs(&self) -> u64 {
        self.health_check_interval_secs
            .unwrap_or(defaults::DEFAULT_HEALTH_CHECK_INTERVAL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.health_check_interval_secs(), 300);
        assert!(config.retry.jitter);
    }

    #[test]
    fn provider_config_deserializes_with_defaults() {
        let json = r#"{
            "id": "openai-primary",
            "name": "OpenAI",
            "kind": "remote",
            "model": "text-embedding-3-small",
            "api_key": "sk-test"
        }"#;
        let config: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.dimensions, defaults::DEFAULT_DIMENSIONS);
        assert_eq!(config.max_batch_size, defaults::DEFAULT_MAX_BATCH_SIZE);
        assert!(config.requires_credentials());
    }
}
