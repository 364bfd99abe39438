//! Remote HTTP embedding provider (OpenAI-compatible wire format).
//!
//! Does no retrying of its own: transport and status failures are
//! normalized onto the error taxonomy and surfaced, the retry engine
//! owns the retry decision.

use std::time::Duration;

use async_trait::async_trait;
use lodestone_core::config::ProviderConfig;
use lodestone_core::errors::{EmbedResult, EmbeddingError};
use lodestone_core::models::{ProviderDescriptor, ProviderKind};
use lodestone_core::traits::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::validate_text;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Embedding provider backed by an OpenAI-compatible `/embeddings`
/// endpoint.
pub struct RemoteProvider {
    client: reqwest::Client,
    descriptor: ProviderDescriptor,
    endpoint: String,
    api_key: Option<String>,
}

impl RemoteProvider {
    /// Build from configuration. Credential presence is validated in
    /// `initialize()`, not here, so a misconfigured provider can still be
    /// constructed and report a precise error at registration time.
    pub fn from_config(config: &ProviderConfig) -> EmbedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| EmbeddingError::from_transport(e, HTTP_TIMEOUT_SECS))?;

        let descriptor = ProviderDescriptor {
            id: config.id.clone(),
            name: config.name.clone(),
            kind: ProviderKind::Remote,
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_input_tokens: config.max_input_tokens,
            max_batch_size: config.max_batch_size,
            requires_credentials: true,
            cost_per_million_tokens: config.cost_per_million_tokens,
            model_path: None,
        };

        Ok(Self {
            client,
            descriptor,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn bearer(&self) -> EmbedResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| EmbeddingError::Authentication {
                reason: format!("provider {} has no API key configured", self.descriptor.id),
            })
    }

    /// One wire call for at most `max_batch_size` texts. Results are
    /// re-ordered by the server-reported index so output position always
    /// matches input position.
    async fn request_embeddings(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            input: texts.to_vec(),
            model: self.descriptor.model.clone(),
            encoding_format: "float",
        };

        debug!(
            provider = %self.descriptor.id,
            texts = texts.len(),
            "embeddings request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.bearer()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::from_transport(e, HTTP_TIMEOUT_SECS))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::from_http_status(
                &self.descriptor.id,
                status.as_u16(),
                &body,
                retry_after,
            ));
        }

        let parsed: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::Provider {
                    provider: self.descriptor.id.clone(),
                    reason: format!("malformed response body: {e}"),
                })?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::Provider {
                provider: self.descriptor.id.clone(),
                reason: format!(
                    "response length mismatch: sent {}, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn initialize(&mut self) -> EmbedResult<()> {
        self.bearer()?;

        // One real call: confirms reachability and credentials, and
        // teaches us the true output dimensionality.
        let probe = self
            .request_embeddings(&["embedding provider probe".to_string()])
            .await?;
        if let Some(vector) = probe.first() {
            if vector.len() != self.descriptor.dimensions {
                info!(
                    provider = %self.descriptor.id,
                    declared = self.descriptor.dimensions,
                    actual = vector.len(),
                    "correcting embedding dimensionality"
                );
                self.descriptor.dimensions = vector.len();
            }
        }
        info!(
            provider = %self.descriptor.id,
            model = %self.descriptor.model,
            dims = self.descriptor.dimensions,
            "remote provider initialized"
        );
        Ok(())
    }

    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        validate_text(text)?;
        let mut vectors = self.request_embeddings(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| EmbeddingError::Provider {
            provider: self.descriptor.id.clone(),
            reason: "empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        for text in texts {
            validate_text(text)?;
        }
        // Split at the backend's batch limit; sub-batches run
        // sequentially and any failure fails the whole batch.
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.descriptor.max_batch_size.max(1)) {
            vectors.extend(self.request_embeddings(chunk).await?);
        }
        Ok(vectors)
    }

    fn info(&self) -> ProviderDescriptor {
        self.descriptor.clone()
    }

    async fn cleanup(&self) -> EmbedResult<()> {
        // Connections are pooled inside reqwest and dropped with it.
        debug!(provider = %self.descriptor.id, "remote provider cleanup");
        Ok(())
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    input: Vec<String>,
    model: String,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use lodestone_core::config::defaults;

    use super::*;

    fn config(api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            id: "remote-test".to_string(),
            name: "Remote Test".to_string(),
            kind: ProviderKind::Remote,
            model: "text-embedding-3-small".to_string(),
            endpoint: None,
            api_key: api_key.map(str::to_string),
            model_path: None,
            dimensions: defaults::DEFAULT_DIMENSIONS,
            max_batch_size: defaults::DEFAULT_MAX_BATCH_SIZE,
            max_input_tokens: defaults::DEFAULT_MAX_INPUT_TOKENS,
            cost_per_million_tokens: 0.02,
        }
    }

    #[test]
    fn descriptor_reflects_config() {
        let provider = RemoteProvider::from_config(&config(Some("sk-test"))).unwrap();
        let info = provider.info();
        assert_eq!(info.id, "remote-test");
        assert_eq!(info.kind, ProviderKind::Remote);
        assert!(info.requires_credentials);
        assert!(info.model_path.is_none());
    }

    #[tokio::test]
    async fn missing_credential_fails_initialize() {
        let mut provider = RemoteProvider::from_config(&config(None)).unwrap();
        let err = provider.initialize().await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Authentication { .. }));
    }

    #[tokio::test]
    async fn empty_text_rejected_without_network() {
        let provider = RemoteProvider::from_config(&config(Some("sk-test"))).unwrap();
        let err = provider.embed("   ").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Validation { .. }));

        let err = provider
            .embed_batch(&["ok".to_string(), "".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Validation { .. }));
    }
}
