//! In-process store backed by Moka.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use glob::Pattern;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use portcullis_core::cache::{CacheStore, StoreError, StoreMetrics};
use tracing::debug;

use crate::metrics::CacheMetrics;

/// Configuracion del store.
#[derive(Debug, Clone)]
pub struct MokaStoreConfig {
    /// Maximo numero de entries (default: 10000)
    pub max_capacity: u64,
}

impl Default for MokaStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

#[derive(Debug)]
struct Stored<V> {
    value: V,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl<V> Expiry<String, Arc<Stored<V>>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<Stored<V>>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<Stored<V>>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Thread-safe store with per-entry TTL and glob invalidation.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use portcullis_core::cache::CacheStore;
/// use portcullis_server::metrics::CacheMetrics;
/// use portcullis_server::store::{MokaStore, MokaStoreConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let store: MokaStore<String> = MokaStore::new(MokaStoreConfig::default(), CacheMetrics::new());
/// store.set("http:GET:/items:abc", "cached".to_string(), Duration::from_secs(60)).await.unwrap();
///
/// let removed = store.invalidate_pattern("http:GET:/items:*").await.unwrap();
/// assert_eq!(removed, 1);
/// # }
/// ```
#[derive(Clone)]
pub struct MokaStore<V> {
    inner: Cache<String, Arc<Stored<V>>>,
    metrics: CacheMetrics,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V> MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Crea un nuevo store con la configuracion dada.
    pub fn new(config: MokaStoreConfig, metrics: CacheMetrics) -> Self {
        let eviction_metrics = metrics;
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .eviction_listener(move |_key, _value, cause| {
                let reason = match cause {
                    RemovalCause::Expired => "ttl",
                    RemovalCause::Size => "capacity",
                    RemovalCause::Explicit => "invalidated",
                    RemovalCause::Replaced => return,
                };
                eviction_metrics.record_eviction(reason);
            })
            .build();

        Self {
            inner,
            metrics,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Retorna el numero aproximado de entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Aplica evictions pendientes (expiradas, invalidadas).
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
        self.metrics.update_entry_count(self.inner.entry_count());
    }

    async fn invalidate_all(&self) -> usize {
        self.inner.run_pending_tasks().await;
        let count = self.inner.entry_count() as usize;
        self.inner.invalidate_all();
        count
    }
}

#[async_trait]
impl<V> CacheStore<V> for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let start = Instant::now();
        let value = self.inner.get(key).await.map(|stored| stored.value.clone());

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.metrics.record_operation_duration("get", start.elapsed());

        Ok(value)
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        let start = Instant::now();
        self.inner
            .insert(key.to_string(), Arc::new(Stored { value, ttl }))
            .await;

        self.metrics.record_operation_duration("set", start.elapsed());
        self.metrics.update_entry_count(self.inner.entry_count());
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, StoreError> {
        if pattern == "*" {
            return Ok(self.invalidate_all().await);
        }

        let glob = Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let start = Instant::now();

        // Recolectar primero: no invalidar mientras se itera.
        let matched: Vec<Arc<String>> = self
            .inner
            .iter()
            .filter(|(key, _)| glob.matches(key))
            .map(|(key, _)| key)
            .collect();

        let count = matched.len();
        for key in matched {
            self.inner.invalidate(key.as_str()).await;
        }

        debug!(pattern = %pattern, count = count, "Store keys invalidated");
        self.metrics
            .record_operation_duration("invalidate", start.elapsed());
        self.metrics.update_entry_count(self.inner.entry_count());

        Ok(count)
    }

    fn metrics(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.entry_count(),
        }
    }
}
