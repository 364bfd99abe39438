use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a provider runs its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// In-process model loaded from disk.
    Local,
    /// Remote API over HTTP.
    Remote,
}

/// Identity and capability metadata for a provider instance.
///
/// Immutable once the provider is constructed, except `dimensions`,
/// which a provider may correct after its first successful call when the
/// true value differs from the declared default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    pub dimensions: usize,
    pub max_input_tokens: usize,
    pub max_batch_size: usize,
    pub requires_credentials: bool,
    /// Estimated cost per million tokens, zero for local kinds.
    pub cost_per_million_tokens: f64,
    /// On-disk model weights, local kinds only.
    pub model_path: Option<PathBuf>,
}
