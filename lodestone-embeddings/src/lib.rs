//! # lodestone-embeddings
//!
//! Resilient pluggable embedding generation. Interchangeable backends
//! (remote API or local ONNX model) behind a single registry that wraps
//! every call in retry-with-backoff and a per-provider circuit breaker,
//! re-routes through a fallback order, gates local model loads on host
//! resources, and exposes per-provider statistics.

pub mod breaker;
pub mod providers;
pub mod registry;
pub mod resource;
pub mod retry;
pub mod stats;

pub use breaker::CircuitBreaker;
pub use registry::ProviderRegistry;
pub use resource::{ModelRequirements, ResourceMonitor};
pub use retry::RetryPolicy;
