use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::models::ProviderKind;

/// Static configuration for one embedding provider instance.
///
/// Supplied by the host's configuration loader at construction time and
/// never re-read mid-call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider id, used for registry lookup and fallback order.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Local in-process model or remote API.
    pub kind: ProviderKind,
    /// Model identifier (API model name, or used for resource estimation
    /// when local).
    pub model: String,
    /// API endpoint, remote kinds only.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// API credential, remote kinds only.
    #[serde(default)]
    pub api_key: Option<String>,
    /// On-disk model weights, local kinds only.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Declared embedding dimensionality. May be corrected empirically
    /// after the first successful call.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Largest batch the backend accepts in one call.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Largest input the backend accepts, in tokens.
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    /// Estimated cost per million tokens, zero for local kinds.
    #[serde(default)]
    pub cost_per_million_tokens: f64,
}

fn default_dimensions() -> usize {
    defaults::DEFAULT_DIMENSIONS
}

fn default_max_batch_size() -> usize {
    defaults::DEFAULT_MAX_BATCH_SIZE
}

fn default_max_input_tokens() -> usize {
    defaults::DEFAULT_MAX_INPUT_TOKENS
}

impl ProviderConfig {
    /// Whether this configuration requires a credential to be usable.
    pub fn requires_credentials(&self) -> bool {
        self.kind == ProviderKind::Remote
    }
}
