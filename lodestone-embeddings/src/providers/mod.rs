//! Provider implementations.
//!
//! One module per backend kind, all satisfying the
//! `EmbeddingProvider` contract from lodestone-core.

pub mod local;
pub mod remote;

use lodestone_core::config::{ProviderConfig, ResourceThresholds};
use lodestone_core::errors::{EmbedResult, EmbeddingError};
use lodestone_core::models::ProviderKind;
use lodestone_core::traits::EmbeddingProvider;

pub use local::LocalOnnxProvider;
pub use remote::RemoteProvider;

/// Construct an uninitialized provider from configuration.
///
/// The registry calls `initialize()` as part of registration; a provider
/// returned here has not yet touched the network or the filesystem.
pub fn create_provider(
    config: &ProviderConfig,
    resources: &ResourceThresholds,
) -> EmbedResult<Box<dyn EmbeddingProvider>> {
    match config.kind {
        ProviderKind::Remote => Ok(Box::new(RemoteProvider::from_config(config)?)),
        ProviderKind::Local => Ok(Box::new(LocalOnnxProvider::from_config(
            config,
            resources.clone(),
        )?)),
    }
}

/// Reject empty or whitespace-only input before it reaches a backend.
pub(crate) fn validate_text(text: &str) -> EmbedResult<()> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::Validation {
            reason: "empty or whitespace-only input".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_input_is_rejected() {
        assert!(validate_text("").is_err());
        assert!(validate_text("   \n\t").is_err());
        assert!(validate_text("fine").is_ok());
    }
}
