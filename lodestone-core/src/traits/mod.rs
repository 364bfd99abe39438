//! Trait seams between the subsystem and its provider backends.

mod provider;

pub use provider::EmbeddingProvider;
