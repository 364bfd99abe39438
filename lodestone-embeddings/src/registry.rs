//! Provider registry: ownership, routing, fallback, health checks.
//!
//! Owns every registered provider together with its circuit breaker and
//! statistics. Embed calls are wrapped through the retry engine and the
//! provider's breaker; on terminal failure the registry re-routes
//! through the configured fallback order. Routing is computed per call,
//! always starting at the active provider, so traffic returns to the
//! preferred backend automatically once its breaker closes.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use lodestone_core::config::{BreakerConfig, EmbeddingConfig};
use lodestone_core::errors::{EmbedResult, EmbeddingError};
use lodestone_core::models::{CircuitState, ProviderSnapshot, RegistrySnapshot};
use lodestone_core::traits::EmbeddingProvider;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::providers;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::stats::{estimate_tokens, ProviderStats};

/// Synthetic input for background health probes. Short and fixed so the
/// probe is cheap and cannot trip input validation.
const HEALTH_CHECK_TEXT: &str = "health check";

#[derive(Clone)]
struct ProviderEntry {
    provider: Arc<dyn EmbeddingProvider>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    stats: Arc<ProviderStats>,
}

impl ProviderEntry {
    fn circuit_state(&self) -> CircuitState {
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_state()
    }
}

/// Owns all registered providers, the active-provider pointer, the
/// fallback order, and per-provider breaker/statistics state.
///
/// Multiple independent registries can coexist in one process; nothing
/// here is a module-level singleton.
pub struct ProviderRegistry {
    providers: DashMap<String, ProviderEntry>,
    active: RwLock<Option<String>>,
    fallback_order: RwLock<Vec<String>>,
    retry_policy: RetryPolicy,
    breaker_config: BreakerConfig,
    health_interval: Duration,
}

impl ProviderRegistry {
    /// Empty registry with the given policies. Providers are added via
    /// [`register`](Self::register).
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            providers: DashMap::new(),
            active: RwLock::new(None),
            fallback_order: RwLock::new(config.fallback_order.clone()),
            retry_policy: RetryPolicy::from_config(&config.retry),
            breaker_config: config.breaker.clone(),
            health_interval: Duration::from_secs(config.health_check_interval_secs()),
        }
    }

    /// Build a registry and register every configured provider. The
    /// first configured provider becomes active.
    pub async fn from_config(config: &EmbeddingConfig) -> EmbedResult<Arc<Self>> {
        let registry = Arc::new(Self::new(config));
        for provider_config in &config.providers {
            let provider = providers::create_provider(provider_config, &config.resources)?;
            registry.register(provider).await?;
        }
        Ok(registry)
    }

    /// Initialize and add a provider. A provider that fails
    /// initialization is not added and the error propagates. The first
    /// successfully registered provider becomes active.
    pub async fn register(&self, mut provider: Box<dyn EmbeddingProvider>) -> EmbedResult<()> {
        let id = provider.info().id;
        if self.providers.contains_key(&id) {
            return Err(EmbeddingError::Validation {
                reason: format!("provider {id} is already registered"),
            });
        }

        provider.initialize().await?;

        let entry = ProviderEntry {
            provider: Arc::from(provider),
            breaker: Arc::new(Mutex::new(CircuitBreaker::new(
                id.clone(),
                self.breaker_config.clone(),
            ))),
            stats: Arc::new(ProviderStats::new()),
        };
        self.providers.insert(id.clone(), entry);

        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.is_none() {
            info!(provider = %id, "first registered provider becomes active");
            *active = Some(id.clone());
        }
        drop(active);

        info!(provider = %id, "provider registered");
        Ok(())
    }

    /// Remove a provider and release its resources. Clears the active
    /// pointer if it pointed here.
    pub async fn unregister(&self, id: &str) -> EmbedResult<()> {
        let (_, entry) = self
            .providers
            .remove(id)
            .ok_or_else(|| EmbeddingError::Validation {
                reason: format!("unknown provider: {id}"),
            })?;

        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.as_deref() == Some(id) {
            *active = None;
        }
        drop(active);

        entry.provider.cleanup().await?;
        info!(provider = %id, "provider unregistered");
        Ok(())
    }

    /// Switch the active pointer. The previous active provider stays
    /// registered and callable, enabling instant rollback and A/B
    /// comparisons; no cleanup happens here.
    pub fn set_active(&self, id: &str) -> EmbedResult<()> {
        if !self.providers.contains_key(id) {
            return Err(EmbeddingError::Validation {
                reason: format!("unknown provider: {id}"),
            });
        }
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let previous = active.replace(id.to_string());
        info!(provider = %id, previous = ?previous, "active provider switched");
        Ok(())
    }

    pub fn active_provider_id(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the fallback order (provider ids tried after the active
    /// one).
    pub fn set_fallback_order(&self, order: Vec<String>) {
        *self
            .fallback_order
            .write()
            .unwrap_or_else(PoisonError::into_inner) = order;
    }

    /// Embed one text against whatever the active provider currently is,
    /// with retry, circuit breaking, and fallback re-routing.
    pub async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        providers::validate_text(text)?;
        let tokens = estimate_tokens(std::slice::from_ref(&text.to_string()));
        self.route(tokens, |provider| {
            let text = text.to_string();
            async move { provider.embed(&text).await }
        })
        .await
    }

    /// Embed a batch against the active provider. Output order matches
    /// input order; sub-batch splitting happens inside the provider.
    pub async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        for text in texts {
            providers::validate_text(text)?;
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = estimate_tokens(texts);
        let texts = texts.to_vec();
        self.route(tokens, move |provider| {
            let texts = texts.clone();
            async move { provider.embed_batch(&texts).await }
        })
        .await
    }

    /// Walk the candidate order: active provider first, then the
    /// fallback order. Each candidate gets the full retry/breaker
    /// treatment; statistics record the terminal outcome per provider.
    async fn route<T, F, Fut>(&self, tokens: u64, op: F) -> EmbedResult<T>
    where
        F: Fn(Arc<dyn EmbeddingProvider>) -> Fut,
        Fut: std::future::Future<Output = EmbedResult<T>>,
    {
        let order = self.candidate_ids();
        if order.is_empty() {
            return Err(EmbeddingError::Validation {
                reason: "no active provider".to_string(),
            });
        }

        let mut last_error: Option<EmbeddingError> = None;
        for (position, id) in order.iter().enumerate() {
            let Some(entry) = self.providers.get(id).map(|e| e.value().clone()) else {
                warn!(provider = %id, "fallback order names an unknown provider");
                continue;
            };

            let started = Instant::now();
            let provider = Arc::clone(&entry.provider);
            let result = run_with_retry(&self.retry_policy, &entry.breaker, || {
                op(Arc::clone(&provider))
            })
            .await;

            match result {
                Ok(value) => {
                    entry.stats.record_success(tokens, started.elapsed());
                    if position > 0 {
                        warn!(
                            provider = %id,
                            preferred = %order[0],
                            "fallback provider served the call"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    entry.stats.record_failure(&error);
                    warn!(provider = %id, error = %error, "provider failed terminally");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EmbeddingError::Validation {
            reason: "no usable provider".to_string(),
        }))
    }

    fn candidate_ids(&self) -> Vec<String> {
        let mut order = Vec::new();
        if let Some(active) = self.active_provider_id() {
            order.push(active);
        }
        let fallback = self
            .fallback_order
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for id in fallback.iter() {
            if !order.contains(id) {
                order.push(id.clone());
            }
        }
        order
    }

    /// One synthetic probe against every registered provider whose
    /// breaker is not `Open`, recording outcomes into statistics and
    /// circuit state. Never touches the active pointer. Also the manual
    /// health-check trigger for the administrative layer.
    pub async fn run_health_check(&self) {
        let entries: Vec<(String, ProviderEntry)> = self
            .providers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for (id, entry) in entries {
            if entry.circuit_state() == CircuitState::Open {
                debug!(provider = %id, "health check skipped, breaker open");
                continue;
            }

            let started = Instant::now();
            let outcome = tokio::time::timeout(
                self.retry_policy.attempt_timeout,
                entry.provider.embed(HEALTH_CHECK_TEXT),
            )
            .await;

            let error = match outcome {
                Ok(Ok(_)) => {
                    entry
                        .breaker
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .record_success();
                    entry.stats.record_success(1, started.elapsed());
                    debug!(provider = %id, "health check ok");
                    continue;
                }
                Ok(Err(error)) => error,
                Err(_elapsed) => EmbeddingError::Timeout {
                    seconds: self.retry_policy.attempt_timeout.as_secs(),
                },
            };

            if error.is_recoverable() {
                entry
                    .breaker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record_failure();
            }
            entry.stats.record_failure(&error);
            warn!(provider = %id, error = %error, "health check failed");
        }
    }

    /// Spawn the periodic health-check loop (default interval five
    /// minutes). The caller owns the handle; abort it on shutdown.
    pub fn spawn_health_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(registry.health_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                registry.run_health_check().await;
            }
        })
    }

    /// Read-only snapshot of every provider's descriptor, circuit state,
    /// and statistics, sorted by id for stable output.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut providers: Vec<ProviderSnapshot> = self
            .providers
            .iter()
            .map(|e| {
                let entry = e.value();
                let descriptor = entry.provider.info();
                let stats = entry.stats.snapshot(descriptor.cost_per_million_tokens);
                ProviderSnapshot {
                    circuit_state: entry.circuit_state(),
                    descriptor,
                    stats,
                }
            })
            .collect();
        providers.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));

        RegistrySnapshot {
            active_provider: self.active_provider_id(),
            fallback_order: self
                .fallback_order
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            providers,
        }
    }

    /// Release every provider's resources. Used on shutdown.
    pub async fn shutdown(&self) {
        let entries: Vec<ProviderEntry> =
            self.providers.iter().map(|e| e.value().clone()).collect();
        for entry in entries {
            let id = entry.provider.info().id;
            if let Err(error) = entry.provider.cleanup().await {
                warn!(provider = %id, error = %error, "cleanup failed during shutdown");
            }
        }
    }
}
