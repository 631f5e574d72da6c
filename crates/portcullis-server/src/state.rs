//! Application state.

use std::sync::Arc;

use portcullis_core::cache::{CacheEntry, CacheStore, ResponseCache};
use portcullis_core::{RateLimitClassifier, SweeperHandle, TokenBucketRegistry};

use crate::handlers::items::ItemCatalog;
use crate::metrics::{CacheMetrics, rate_limit};
use crate::settings::{Settings, SettingsError};
use crate::store::{MokaStore, MokaStoreConfig};

/// Application state shared across all handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    registry: Arc<TokenBucketRegistry>,
    classifier: Arc<RateLimitClassifier>,
    /// `None` when caching is disabled.
    cache: Option<ResponseCache>,
    cache_metrics: CacheMetrics,
    catalog: Arc<ItemCatalog>,
}

impl AppState {
    /// Builds the state with the in-process Moka store.
    pub fn from_settings(settings: Settings) -> Result<Self, SettingsError> {
        let cache_metrics = CacheMetrics::new();
        let store = MokaStore::<CacheEntry>::new(
            MokaStoreConfig {
                max_capacity: settings.cache.max_capacity,
            },
            cache_metrics,
        );
        Self::with_store(settings, Arc::new(store))
    }

    /// Builds the state over the given store.
    pub fn with_store(
        settings: Settings,
        store: Arc<dyn CacheStore<CacheEntry>>,
    ) -> Result<Self, SettingsError> {
        let policies = settings.rate_limit.class_policies()?;
        let registry =
            TokenBucketRegistry::with_idle_timeout(policies, settings.rate_limit.idle_timeout());
        let classifier = RateLimitClassifier::new(&settings.rate_limit.sensitive_patterns);

        let cache = if settings.cache.enabled {
            Some(ResponseCache::new(
                store,
                settings.cache.response_cache_config()?,
            ))
        } else {
            None
        };

        Ok(Self {
            settings: Arc::new(settings),
            registry: Arc::new(registry),
            classifier: Arc::new(classifier),
            cache,
            cache_metrics: CacheMetrics::new(),
            catalog: Arc::new(ItemCatalog::with_samples()),
        })
    }

    /// Starts the idle-bucket sweeper; stop it through the returned handle.
    pub fn start_sweeper(&self) -> SweeperHandle {
        self.registry.start_sweeper_with(
            self.settings.rate_limit.sweep_interval(),
            rate_limit::record_sweep,
        )
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<TokenBucketRegistry> {
        &self.registry
    }

    pub fn classifier(&self) -> &Arc<RateLimitClassifier> {
        &self.classifier
    }

    /// Returns the response cache if enabled.
    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache_metrics
    }

    pub fn catalog(&self) -> &Arc<ItemCatalog> {
        &self.catalog
    }
}
