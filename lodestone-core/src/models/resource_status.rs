use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a resource reading relative to configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceLevel {
    Ok,
    Warning,
    Critical,
}

/// Point-in-time disk reading for the volume holding model weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskStatus {
    pub level: ResourceLevel,
    pub free_gb: f64,
    pub total_gb: f64,
    pub used_gb: f64,
}

/// Point-in-time memory reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStatus {
    pub level: ResourceLevel,
    pub free_mb: u64,
    pub total_mb: u64,
    pub used_mb: u64,
}

/// Snapshot of host resources, recomputed on demand or on a monitoring
/// interval. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub disk: DiskStatus,
    pub memory: MemoryStatus,
    pub checked_at: DateTime<Utc>,
}

impl ResourceStatus {
    /// Worst of the disk and memory levels.
    pub fn overall_level(&self) -> ResourceLevel {
        match (self.disk.level, self.memory.level) {
            (ResourceLevel::Critical, _) | (_, ResourceLevel::Critical) => ResourceLevel::Critical,
            (ResourceLevel::Warning, _) | (_, ResourceLevel::Warning) => ResourceLevel::Warning,
            _ => ResourceLevel::Ok,
        }
    }
}
