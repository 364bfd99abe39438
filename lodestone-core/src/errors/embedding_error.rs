/// Embedding subsystem errors.
///
/// Each variant carries a recoverability flag via [`EmbeddingError::is_recoverable`].
/// Recoverable means "the same call may succeed if repeated"; retrying a
/// non-recoverable error (bad credentials, missing model, full disk) is wasted work.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("rate limited by provider (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("model not found: {model}")]
    ModelNotFound { model: String },

    #[error("insufficient disk space: {available_gb:.1} GB free, {required_gb:.1} GB required")]
    DiskSpace { available_gb: f64, required_gb: f64 },

    #[error("insufficient memory: {available_mb} MB free, {required_mb} MB required")]
    Memory { available_mb: u64, required_mb: u64 },

    #[error("invalid input: {reason}")]
    Validation { reason: String },

    #[error("circuit breaker open for provider {provider}")]
    CircuitOpen { provider: String },

    #[error("provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },
}

/// Result alias used throughout the workspace.
pub type EmbedResult<T> = Result<T, EmbeddingError>;

impl EmbeddingError {
    /// Whether the retry engine should consider repeating the failed call.
    ///
    /// `CircuitOpen` is deliberately non-recoverable from the retry loop's
    /// perspective: it already means "do not call".
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Timeout { .. } => true,
            Self::RateLimited { .. } => true,
            Self::Provider { .. } => true,
            Self::Authentication { .. } => false,
            Self::ModelNotFound { .. } => false,
            Self::DiskSpace { .. } => false,
            Self::Memory { .. } => false,
            Self::Validation { .. } => false,
            Self::CircuitOpen { .. } => false,
        }
    }

    /// Retry-after hint in seconds, if the provider supplied one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    /// Normalize an HTTP status + body onto the taxonomy.
    ///
    /// `retry_after` is the parsed `Retry-After` header, when present.
    pub fn from_http_status(
        provider: &str,
        status: u16,
        body: &str,
        retry_after: Option<u64>,
    ) -> Self {
        match status {
            401 | 403 => Self::Authentication {
                reason: format!("status {status}: {body}"),
            },
            404 => Self::ModelNotFound {
                model: body.to_string(),
            },
            429 => Self::RateLimited {
                retry_after_secs: retry_after,
            },
            400 | 422 => Self::Validation {
                reason: format!("status {status}: {body}"),
            },
            500..=599 => Self::Provider {
                provider: provider.to_string(),
                reason: format!("server error {status}: {body}"),
            },
            _ => Self::Provider {
                provider: provider.to_string(),
                reason: format!("unexpected status {status}: {body}"),
            },
        }
    }

    /// Normalize reqwest transport errors (connection refused, DNS
    /// failure, client-side timeout) onto the taxonomy.
    ///
    /// `timeout_secs` is the HTTP client's configured request timeout,
    /// reported when the transport error is a timeout.
    pub fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                seconds: timeout_secs,
            };
        }
        if err.is_connect() {
            return Self::Network {
                reason: format!("connection failed: {err}"),
            };
        }
        Self::Network {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_flags_match_taxonomy() {
        assert!(EmbeddingError::Network {
            reason: "refused".into()
        }
        .is_recoverable());
        assert!(EmbeddingError::Timeout { seconds: 30 }.is_recoverable());
        assert!(EmbeddingError::RateLimited {
            retry_after_secs: None
        }
        .is_recoverable());
        assert!(EmbeddingError::Provider {
            provider: "p".into(),
            reason: "500".into()
        }
        .is_recoverable());

        assert!(!EmbeddingError::Authentication {
            reason: "bad key".into()
        }
        .is_recoverable());
        assert!(!EmbeddingError::ModelNotFound { model: "m".into() }.is_recoverable());
        assert!(!EmbeddingError::DiskSpace {
            available_gb: 1.0,
            required_gb: 5.0
        }
        .is_recoverable());
        assert!(!EmbeddingError::Memory {
            available_mb: 100,
            required_mb: 4096
        }
        .is_recoverable());
        assert!(!EmbeddingError::Validation {
            reason: "empty".into()
        }
        .is_recoverable());
        assert!(!EmbeddingError::CircuitOpen {
            provider: "p".into()
        }
        .is_recoverable());
    }

    #[test]
    fn http_status_normalization() {
        let auth = EmbeddingError::from_http_status("p", 401, "bad key", None);
        assert!(matches!(auth, EmbeddingError::Authentication { .. }));

        let missing = EmbeddingError::from_http_status("p", 404, "no-such-model", None);
        assert!(matches!(missing, EmbeddingError::ModelNotFound { .. }));

        let limited = EmbeddingError::from_http_status("p", 429, "slow down", Some(30));
        assert_eq!(limited.retry_after_secs(), Some(30));

        let server = EmbeddingError::from_http_status("p", 503, "unavailable", None);
        assert!(server.is_recoverable());

        let bad = EmbeddingError::from_http_status("p", 400, "bad request", None);
        assert!(!bad.is_recoverable());
    }

    #[test]
    fn display_names_threshold_and_shortfall() {
        let err = EmbeddingError::DiskSpace {
            available_gb: 2.5,
            required_gb: 10.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("2.5"));
        assert!(msg.contains("10.0"));
    }
}
