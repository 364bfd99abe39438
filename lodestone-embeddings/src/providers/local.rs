//! Locally-hosted ONNX embedding provider.
//!
//! Loads model weights via the `ort` crate (v2). Initialization runs the
//! resource admission gate before touching the weights, then a smoke
//! inference to confirm the model works and learn its true output
//! dimensionality.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use lodestone_core::config::{ProviderConfig, ResourceThresholds};
use lodestone_core::errors::{EmbedResult, EmbeddingError};
use lodestone_core::models::{ProviderDescriptor, ProviderKind};
use lodestone_core::traits::EmbeddingProvider;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::validate_text;
use crate::resource::{ModelRequirements, ResourceMonitor};

/// In-process embedding provider backed by an ONNX session.
///
/// `Session::run` needs `&mut`, so the session lives in a `Mutex`; the
/// slot is an `Option` so `cleanup()` can release the weights through
/// `&self` and stay idempotent.
#[derive(Debug)]
pub struct LocalOnnxProvider {
    descriptor: ProviderDescriptor,
    thresholds: ResourceThresholds,
    session: Mutex<Option<Session>>,
}

impl LocalOnnxProvider {
    pub fn from_config(
        config: &ProviderConfig,
        thresholds: ResourceThresholds,
    ) -> EmbedResult<Self> {
        let model_path = config
            .model_path
            .clone()
            .ok_or_else(|| EmbeddingError::Validation {
                reason: format!("local provider {} requires a model_path", config.id),
            })?;

        Ok(Self {
            descriptor: ProviderDescriptor {
                id: config.id.clone(),
                name: config.name.clone(),
                kind: ProviderKind::Local,
                model: config.model.clone(),
                dimensions: config.dimensions,
                max_input_tokens: config.max_input_tokens,
                max_batch_size: config.max_batch_size,
                requires_credentials: false,
                cost_per_million_tokens: 0.0,
                model_path: Some(model_path),
            },
            thresholds,
            session: Mutex::new(None),
        })
    }

    fn model_path(&self) -> &Path {
        // Always Some: from_config refuses a config without it.
        self.descriptor
            .model_path
            .as_deref()
            .unwrap_or_else(|| Path::new(""))
    }

    /// Run inference on one text. Returns the mean-pooled, L2-normalized
    /// vector at the model's natural dimensionality.
    fn infer(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let token_ids = hash_tokenize(text);
        let seq_len = token_ids.len();

        let input_ids: Vec<i64> = token_ids.iter().map(|&id| id as i64).collect();
        let attention_mask = vec![1i64; seq_len];

        let ids_tensor =
            Tensor::from_array((vec![1i64, seq_len as i64], input_ids)).map_err(|e| {
                EmbeddingError::Provider {
                    provider: self.descriptor.id.clone(),
                    reason: format!("tensor creation error: {e}"),
                }
            })?;
        let mask_tensor =
            Tensor::from_array((vec![1i64, seq_len as i64], attention_mask)).map_err(|e| {
                EmbeddingError::Provider {
                    provider: self.descriptor.id.clone(),
                    reason: format!("tensor creation error: {e}"),
                }
            })?;

        let mut guard = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let session = guard.as_mut().ok_or_else(|| EmbeddingError::ModelNotFound {
            model: format!("{} (weights not loaded)", self.descriptor.model),
        })?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor])
            .map_err(|e| EmbeddingError::Provider {
                provider: self.descriptor.id.clone(),
                reason: format!("inference failed: {e}"),
            })?;

        let (_name, output) =
            outputs
                .iter()
                .next()
                .ok_or_else(|| EmbeddingError::Provider {
                    provider: self.descriptor.id.clone(),
                    reason: "no output tensor".to_string(),
                })?;

        let (shape, data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| EmbeddingError::Provider {
                    provider: self.descriptor.id.clone(),
                    reason: format!("tensor extraction failed: {e}"),
                })?;

        // Mean pool across the sequence dimension, then L2 normalize.
        let mut pooled = match shape.len() {
            3 => {
                // [batch=1, seq, dims]
                let seq = shape[1] as usize;
                let dims = shape[2] as usize;
                let mut acc = vec![0.0f32; dims];
                for s in 0..seq {
                    for d in 0..dims {
                        acc[d] += data[s * dims + d];
                    }
                }
                for v in &mut acc {
                    *v /= seq as f32;
                }
                acc
            }
            2 => {
                // [batch=1, dims] — already pooled.
                let dims = shape[1] as usize;
                data[..dims].to_vec()
            }
            _ => {
                return Err(EmbeddingError::Provider {
                    provider: self.descriptor.id.clone(),
                    reason: format!("unexpected output shape: {shape:?}"),
                })
            }
        };

        let norm: f32 = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut pooled {
                *v /= norm;
            }
        }
        Ok(pooled)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalOnnxProvider {
    async fn initialize(&mut self) -> EmbedResult<()> {
        let path = self.model_path().to_path_buf();
        if !path.exists() {
            return Err(EmbeddingError::ModelNotFound {
                model: path.display().to_string(),
            });
        }

        // Admission gate before any weights are touched. Requirements are
        // estimated from the model name tier.
        let requirements = ModelRequirements::estimate(&self.descriptor.model);
        let monitor = ResourceMonitor::new(self.thresholds.clone());
        let status = monitor.admit(&requirements, &path)?;
        debug!(
            provider = %self.descriptor.id,
            disk = ?status.disk.level,
            memory = ?status.memory.level,
            "resource admission passed"
        );

        let session = Session::builder()
            .map_err(|e| load_error(&self.descriptor.model, e.into()))?
            .with_intra_threads(2)
            .map_err(|e| load_error(&self.descriptor.model, e.into()))?
            .commit_from_file(&path)
            .map_err(|e| load_error(&self.descriptor.model, e))?;

        *self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);

        // Smoke inference: confirm the model actually runs and learn the
        // true output dimensionality. On failure the session is dropped
        // again so the provider is never left half-initialized.
        match self.infer("embedding provider probe") {
            Ok(vector) => {
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
            Err(e) => {
                self.session
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                return Err(e);
            }
        }

        info!(
            provider = %self.descriptor.id,
            model = %self.descriptor.model,
            dims = self.descriptor.dimensions,
            "local provider initialized"
        );
        Ok(())
    }

    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        validate_text(text)?;
        self.infer(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        for text in texts {
            validate_text(text)?;
        }
        // No native batch support: sequential single inferences, order
        // preserved, first failure fails the whole batch.
        texts.iter().map(|t| self.infer(t)).collect()
    }

    fn info(&self) -> ProviderDescriptor {
        self.descriptor.clone()
    }

    async fn cleanup(&self) -> EmbedResult<()> {
        let released = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if released {
            info!(provider = %self.descriptor.id, "model weights released");
        }
        Ok(())
    }
}

fn load_error(model: &str, err: ort::Error) -> EmbeddingError {
    EmbeddingError::ModelNotFound {
        model: format!("{model}: {err}"),
    }
}

/// Hash tokenizer: split on non-alphanumeric, FNV-1a into a fixed vocab
/// range, with BERT-style CLS/SEP markers.
fn hash_tokenize(text: &str) -> Vec<u32> {
    const CLS: u32 = 101;
    const SEP: u32 = 102;
    if text.is_empty() {
        return vec![CLS, SEP];
    }
    let mut ids = vec![CLS];
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if word.is_empty() {
            continue;
        }
        let mut h: u32 = 0x811c9dc5;
        for b in word.to_lowercase().as_bytes() {
            h ^= *b as u32;
            h = h.wrapping_mul(0x0100_0193);
        }
        ids.push(1 + (h % 29_999));
    }
    ids.push(SEP);
    ids
}

#[cfg(test)]
mod tests {
    use lodestone_core::config::defaults;

    use super::*;

    fn config(model_path: Option<std::path::PathBuf>) -> ProviderConfig {
        ProviderConfig {
            id: "local-test".to_string(),
            name: "Local Test".to_string(),
            kind: ProviderKind::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            endpoint: None,
            api_key: None,
            model_path,
            dimensions: 384,
            max_batch_size: defaults::DEFAULT_MAX_BATCH_SIZE,
            max_input_tokens: defaults::DEFAULT_MAX_INPUT_TOKENS,
            cost_per_million_tokens: 0.0,
        }
    }

    #[test]
    fn missing_model_path_is_a_config_error() {
        let err = LocalOnnxProvider::from_config(&config(None), ResourceThresholds::default())
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Validation { .. }));
    }

    #[test]
    fn local_cost_is_zero() {
        let provider = LocalOnnxProvider::from_config(
            &config(Some("/models/minilm.onnx".into())),
            ResourceThresholds::default(),
        )
        .unwrap();
        let info = provider.info();
        assert_eq!(info.cost_per_million_tokens, 0.0);
        assert!(!info.requires_credentials);
        assert_eq!(info.kind, ProviderKind::Local);
    }

    #[tokio::test]
    async fn nonexistent_weights_fail_with_model_not_found() {
        let mut provider = LocalOnnxProvider::from_config(
            &config(Some("/definitely/not/here.onnx".into())),
            ResourceThresholds::default(),
        )
        .unwrap();
        let err = provider.initialize().await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn admission_gate_rejects_before_weights_load() {
        // Weights file exists (garbage content), but the memory floor is
        // unreachable: the admission gate must fire before any load
        // attempt, so the error is Memory, not a load failure.
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("model.onnx");
        std::fs::write(&weights, b"not a real model").unwrap();

        let mut provider = LocalOnnxProvider::from_config(
            &config(Some(weights)),
            ResourceThresholds {
                min_memory_mb: 999_999_999,
                ..Default::default()
            },
        )
        .unwrap();
        let err = provider.initialize().await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Memory { .. }));
    }

    #[tokio::test]
    async fn embed_before_initialize_reports_unloaded_model() {
        let provider = LocalOnnxProvider::from_config(
            &config(Some("/models/minilm.onnx".into())),
            ResourceThresholds::default(),
        )
        .unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let provider = LocalOnnxProvider::from_config(
            &config(Some("/models/minilm.onnx".into())),
            ResourceThresholds::default(),
        )
        .unwrap();
        assert!(provider.cleanup().await.is_ok());
        assert!(provider.cleanup().await.is_ok());
    }

    #[test]
    fn tokenizer_is_deterministic_with_markers() {
        let a = hash_tokenize("retry with backoff");
        let b = hash_tokenize("retry with backoff");
        assert_eq!(a, b);
        assert_eq!(a.first(), Some(&101));
        assert_eq!(a.last(), Some(&102));
        assert_eq!(a.len(), 5); // CLS + 3 words + SEP

        assert_eq!(hash_tokenize(""), vec![101, 102]);
    }
}
