use serde::{Deserialize, Serialize};

use super::defaults;

/// Host resource thresholds for local-model admission control.
///
/// Below a `min_*` value initialization fails outright; between `min_*`
/// and `warn_*` it proceeds with a `Warning` status for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceThresholds {
    pub min_disk_gb: f64,
    pub min_memory_mb: u64,
    pub warn_disk_gb: f64,
    pub warn_memory_mb: u64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            min_disk_gb: defaults::DEFAULT_MIN_DISK_GB,
            min_memory_mb: defaults::DEFAULT_MIN_MEMORY_MB,
            warn_disk_gb: defaults::DEFAULT_WARN_DISK_GB,
            warn_memory_mb: defaults::DEFAULT_WARN_MEMORY_MB,
        }
    }
}
