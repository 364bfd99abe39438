//! Data models shared across the subsystem.

mod circuit_state;
mod provider_descriptor;
mod resource_status;
mod snapshots;

pub use circuit_state::CircuitState;
pub use provider_descriptor::{ProviderDescriptor, ProviderKind};
pub use resource_status::{DiskStatus, MemoryStatus, ResourceLevel, ResourceStatus};
pub use snapshots::{ProviderSnapshot, ProviderStatsSnapshot, RegistrySnapshot};
