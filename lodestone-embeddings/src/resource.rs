//! Host resource admission control.
//!
//! Consulted once, when a local provider initializes — never per embed
//! call. Compares free disk and memory against configured thresholds:
//! below the minimum the model load is refused outright; between minimum
//! and warn level it proceeds flagged `Warning` for observability.
//!
//! Also supports a standalone periodic-monitoring mode with registered
//! listeners; a panicking listener is caught and logged, never allowed
//! to stop the loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use lodestone_core::config::ResourceThresholds;
use lodestone_core::errors::{EmbedResult, EmbeddingError};
use lodestone_core::models::{DiskStatus, MemoryStatus, ResourceLevel, ResourceStatus};
use sysinfo::{Disks, System};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Heuristic footprint for a model identifier.
///
/// Exact footprints aren't known until the weights are loaded, so tiers
/// are matched from the name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRequirements {
    pub disk_gb: f64,
    pub memory_mb: u64,
}

impl ModelRequirements {
    /// Estimate requirements from a model name: small/base/large tiers.
    pub fn estimate(model: &str) -> Self {
        let name = model.to_lowercase();
        if ["large", "xl", "xxl", "7b", "13b"].iter().any(|t| name.contains(t)) {
            Self {
                disk_gb: 5.0,
                memory_mb: 8192,
            }
        } else if ["small", "mini", "tiny", "quantized", "int8"]
            .iter()
            .any(|t| name.contains(t))
        {
            Self {
                disk_gb: 0.5,
                memory_mb: 1024,
            }
        } else {
            // base tier
            Self {
                disk_gb: 1.5,
                memory_mb: 2048,
            }
        }
    }
}

/// Callback invoked with each fresh status snapshot in monitoring mode.
pub type ResourceListener = Box<dyn Fn(&ResourceStatus) + Send + Sync>;

/// Queries host disk/memory and classifies readings against thresholds.
pub struct ResourceMonitor {
    thresholds: ResourceThresholds,
    listeners: Mutex<Vec<ResourceListener>>,
}

impl ResourceMonitor {
    pub fn new(thresholds: ResourceThresholds) -> Self {
        Self {
            thresholds,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Point-in-time snapshot for the volume containing `path`.
    pub fn status(&self, path: &Path) -> ResourceStatus {
        let (free_gb, total_gb) = disk_space_for(path);
        let disk_level = if free_gb < self.thresholds.min_disk_gb {
            ResourceLevel::Critical
        } else if free_gb < self.thresholds.warn_disk_gb {
            ResourceLevel::Warning
        } else {
            ResourceLevel::Ok
        };

        let mut system = System::new();
        system.refresh_memory();
        let free_mb = system.available_memory() / BYTES_PER_MB;
        let total_mb = system.total_memory() / BYTES_PER_MB;
        let memory_level = if free_mb < self.thresholds.min_memory_mb {
            ResourceLevel::Critical
        } else if free_mb < self.thresholds.warn_memory_mb {
            ResourceLevel::Warning
        } else {
            ResourceLevel::Ok
        };

        ResourceStatus {
            disk: DiskStatus {
                level: disk_level,
                free_gb,
                total_gb,
                used_gb: (total_gb - free_gb).max(0.0),
            },
            memory: MemoryStatus {
                level: memory_level,
                free_mb,
                total_mb,
                used_mb: total_mb.saturating_sub(free_mb),
            },
            checked_at: Utc::now(),
        }
    }

    /// Admission gate for loading a local model.
    ///
    /// The effective minimum for each resource is the larger of the
    /// configured floor and the model's estimated footprint. Failure
    /// names the threshold and the shortfall; no model load is attempted.
    pub fn admit(
        &self,
        requirements: &ModelRequirements,
        model_path: &Path,
    ) -> EmbedResult<ResourceStatus> {
        let status = self.status(model_path);

        let required_gb = self.thresholds.min_disk_gb.max(requirements.disk_gb);
        if status.disk.free_gb < required_gb {
            return Err(EmbeddingError::DiskSpace {
                available_gb: status.disk.free_gb,
                required_gb,
            });
        }

        let required_mb = self.thresholds.min_memory_mb.max(requirements.memory_mb);
        if status.memory.free_mb < required_mb {
            return Err(EmbeddingError::Memory {
                available_mb: status.memory.free_mb,
                required_mb,
            });
        }

        if status.overall_level() == ResourceLevel::Warning {
            warn!(
                free_disk_gb = status.disk.free_gb,
                free_memory_mb = status.memory.free_mb,
                "resources above minimum but below warn level, proceeding"
            );
        }
        Ok(status)
    }

    /// Register a listener for monitoring mode.
    pub fn register_listener(&self, listener: ResourceListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Spawn the periodic monitoring loop. Each tick takes a fresh
    /// snapshot and invokes every listener; a listener panic is caught
    /// and logged so one broken listener cannot stop monitoring.
    ///
    /// The caller owns the handle; abort it on shutdown.
    pub fn spawn_monitoring(self: &Arc<Self>, path: PathBuf, interval: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // first tick is immediate; skip it
            loop {
                ticker.tick().await;
                let status = monitor.status(&path);
                debug!(
                    disk = ?status.disk.level,
                    memory = ?status.memory.level,
                    "resource monitoring tick"
                );
                let listeners = monitor
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                for listener in listeners.iter() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(&status))) {
                        error!(?panic, "resource listener panicked");
                    }
                }
            }
        })
    }
}

/// Free/total space in GB for the disk whose mount point is the longest
/// prefix of `path`. Falls back to the largest disk when no mount
/// matches (e.g. relative paths).
fn disk_space_for(path: &Path) -> (f64, f64) {
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(usize, u64, u64)> = None;
    for disk in disks.iter() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let depth = mount.components().count();
            if best.map(|(d, _, _)| depth > d).unwrap_or(true) {
                best = Some((depth, disk.available_space(), disk.total_space()));
            }
        }
    }
    let (available, total) = match best {
        Some((_, available, total)) => (available, total),
        None => disks
            .iter()
            .max_by_key(|d| d.total_space())
            .map(|d| (d.available_space(), d.total_space()))
            .unwrap_or((0, 0)),
    };
    (
        available as f64 / BYTES_PER_GB,
        total as f64 / BYTES_PER_GB,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_estimates() {
        let large = ModelRequirements::estimate("bge-large-en-v1.5");
        let base = ModelRequirements::estimate("jina-embeddings-v2-base-code");
        let small = ModelRequirements::estimate("all-MiniLM-L6-v2");
        assert!(large.memory_mb > base.memory_mb);
        assert!(base.memory_mb > small.memory_mb);
        assert!(large.disk_gb > small.disk_gb);
    }

    #[test]
    fn unknown_model_gets_base_tier() {
        let req = ModelRequirements::estimate("mystery-model");
        assert_eq!(req.memory_mb, 2048);
    }

    #[test]
    fn status_reads_real_host() {
        let monitor = ResourceMonitor::new(ResourceThresholds::default());
        let status = monitor.status(&std::env::temp_dir());
        assert!(status.memory.total_mb > 0);
        assert!(status.disk.total_gb > 0.0);
        assert!(status.memory.used_mb <= status.memory.total_mb);
    }

    #[test]
    fn unreachable_memory_minimum_is_refused() {
        let monitor = ResourceMonitor::new(ResourceThresholds {
            min_memory_mb: 999_999_999,
            ..Default::default()
        });
        let req = ModelRequirements::estimate("small");
        let err = monitor.admit(&req, &std::env::temp_dir()).unwrap_err();
        match err {
            EmbeddingError::Memory { required_mb, .. } => {
                assert_eq!(required_mb, 999_999_999);
            }
            other => panic!("expected Memory error, got {other:?}"),
        }
    }

    #[test]
    fn reasonable_thresholds_admit() {
        let monitor = ResourceMonitor::new(ResourceThresholds {
            min_disk_gb: 0.0,
            min_memory_mb: 0,
            warn_disk_gb: 0.0,
            warn_memory_mb: 0,
        });
        let req = ModelRequirements {
            disk_gb: 0.0,
            memory_mb: 0,
        };
        assert!(monitor.admit(&req, &std::env::temp_dir()).is_ok());
    }

    #[tokio::test]
    async fn panicking_listener_does_not_stop_monitoring() {
        let monitor = Arc::new(ResourceMonitor::new(ResourceThresholds::default()));
        let ticks = Arc::new(std::sync::atomic::AtomicU32::new(0));

        monitor.register_listener(Box::new(|_| panic!("broken listener")));
        let counter = Arc::clone(&ticks);
        monitor.register_listener(Box::new(move |status| {
            assert!(status.memory.total_mb > 0);
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));

        let handle =
            monitor.spawn_monitoring(std::env::temp_dir(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        // The healthy listener kept firing after its sibling panicked.
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) >= 2);
    }
}
