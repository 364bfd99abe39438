//! # lodestone-core
//!
//! Foundation crate for the lodestone embedding subsystem.
//! Defines the error taxonomy, configuration types, data models, and the
//! provider capability trait. Every other crate in the workspace depends
//! on this.

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::EmbeddingConfig;
pub use errors::{EmbedResult, EmbeddingError};
pub use models::{CircuitState, ProviderDescriptor, ProviderKind};
pub use traits::EmbeddingProvider;
