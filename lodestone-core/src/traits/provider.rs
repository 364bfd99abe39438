use async_trait::async_trait;

use crate::errors::EmbedResult;
use crate::models::ProviderDescriptor;

/// Capability contract every embedding backend satisfies, whether it
/// calls a network endpoint or runs a model in-process.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Validate configuration, run any admission checks, and perform one
    /// real embedding call to confirm the backend is reachable and learn
    /// the true output dimensionality.
    ///
    /// Never partially initializes: if the confirmation call fails the
    /// provider is left unusable and the dimensionality is not corrected.
    async fn initialize(&mut self) -> EmbedResult<()>;

    /// Embed one text into a dense vector of the declared (or corrected)
    /// dimensionality. Empty or whitespace-only input is a
    /// `Validation` error.
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;

    /// Embed many texts. Result length and order exactly match the input,
    /// downstream code pairs vectors with source chunks positionally.
    ///
    /// Backends with a native batch limit must split transparently into
    /// sequential sub-batches; a failure on any element fails the whole
    /// batch. No partial-success batches.
    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;

    /// Identity and capability metadata. Pure, side-effect-free.
    fn info(&self) -> ProviderDescriptor;

    /// Release in-process resources (model weights, open connections).
    /// Idempotent: calling it twice must not fail. Takes `&self` so a
    /// registered provider behind `Arc` can still be released; providers
    /// use interior mutability for the resources they drop.
    async fn cleanup(&self) -> EmbedResult<()>;
}
