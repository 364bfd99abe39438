//! Error taxonomy for the embedding subsystem.
//!
//! Every failure is classified as recoverable (worth retrying) or
//! non-recoverable (surface immediately). The retry engine consumes the
//! `is_recoverable` flag and never has to understand provider-specific
//! error shapes.

mod embedding_error;

pub use embedding_error::{EmbedResult, EmbeddingError};
