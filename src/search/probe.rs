//! Semantic model availability probe
//!
//! Answers "can semantic ranking be used right now?" and caches the answer
//! for a TTL so that individual searches do not pay for a status call.

use crate::engine::{ModelDeployment, SearchEngine};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A cached probe answer
#[derive(Debug, Clone, Copy)]
pub struct ModelAvailability {
    pub available: bool,
    pub checked_at: Instant,
    pub checked_at_utc: DateTime<Utc>,
}

impl ModelAvailability {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.checked_at.elapsed() <= ttl
    }
}

/// Probe with an injected, explicitly owned cache.
///
/// Concurrent callers that miss the cache at the same moment may each issue
/// a status call; the lock only guards the cache slot, never the probe.
pub struct ModelAvailabilityProbe {
    engine: Arc<dyn SearchEngine>,
    model_id: String,
    ttl: Duration,
    cache: RwLock<Option<ModelAvailability>>,
}

impl ModelAvailabilityProbe {
    pub fn new(engine: Arc<dyn SearchEngine>, model_id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            engine,
            model_id: model_id.into(),
            ttl,
            cache: RwLock::new(None),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Whether the semantic model is deployed and started.
    ///
    /// Any probe error counts as "not available"; it is never propagated.
    pub async fn is_semantic_available(&self) -> bool {
        if let Some(cached) = self.cached().await {
            return cached.available;
        }

        let available = match self.engine.model_deployment(&self.model_id).await {
            Ok(ModelDeployment::Started) => true,
            Ok(ModelDeployment::NotStarted(state)) => {
                tracing::debug!("Semantic model {} is {}", self.model_id, state);
                false
            }
            Ok(ModelDeployment::Missing) => {
                tracing::debug!("Semantic model {} is not installed", self.model_id);
                false
            }
            Err(e) => {
                tracing::debug!("Semantic model status check failed: {}", e);
                false
            }
        };

        let previous = self.cache.write().await.replace(ModelAvailability {
            available,
            checked_at: Instant::now(),
            checked_at_utc: Utc::now(),
        });

        if previous.map(|p| p.available) != Some(available) {
            if available {
                tracing::info!("Semantic model {} available", self.model_id);
            } else {
                tracing::info!(
                    "Semantic model {} not available, using keyword-only search",
                    self.model_id
                );
            }
        }

        available
    }

    /// The cached answer if it is still within its TTL
    pub async fn cached(&self) -> Option<ModelAvailability> {
        self.cache
            .read()
            .await
            .filter(|cached| cached.is_fresh(self.ttl))
    }

    /// Drop the cached answer so the next call probes again
    pub async fn invalidate(&self) {
        self.cache.write().await.take();
    }
}
