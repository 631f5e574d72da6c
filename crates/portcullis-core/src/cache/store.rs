//! Keyed store abstraction consumed by the response cache.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// Failure reported by a [`CacheStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// The invalidation pattern is not valid for this store.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A value could not be encoded for storage.
    #[error("failed to encode cache value: {0}")]
    Encode(String),

    /// The call did not complete before its deadline.
    #[error("cache store call exceeded {0:?}")]
    Timeout(Duration),
}

/// Counters exposed by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl StoreMetrics {
    /// Returns hits / (hits + misses), or 0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A typed keyed store with per-entry TTL and pattern invalidation.
///
/// The value type is part of the signature, so a store holding
/// `CacheEntry` values can never hand back something else. Stores share
/// themselves internally; callers do not add locking around them.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl CacheStore<CacheEntry> for MyStore {
///     async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> { ... }
///     async fn set(&self, key: &str, value: CacheEntry, ttl: Duration) -> Result<(), StoreError> { ... }
///     async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, StoreError> { ... }
///     fn metrics(&self) -> StoreMetrics { ... }
/// }
/// ```
#[async_trait]
pub trait CacheStore<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    /// Returns the live value for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    /// Stores `value`, replacing any previous value, for at most `ttl`.
    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError>;

    /// Removes every key matching the glob `pattern`; returns how many were removed.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, StoreError>;

    /// Returns the store counters.
    fn metrics(&self) -> StoreMetrics;
}

/// Adapts a byte store into a typed store using JSON.
///
/// Values that fail to decode (for example written by an unrelated user of
/// a shared store) are logged and reported as absent.
pub struct JsonCodecStore<S, V> {
    inner: S,
    _value: PhantomData<fn() -> V>,
}

impl<S, V> JsonCodecStore<S, V> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            _value: PhantomData,
        }
    }

    /// Returns the wrapped byte store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S, V> CacheStore<V> for JsonCodecStore<S, V>
where
    S: CacheStore<Bytes>,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let Some(raw) = self.inner.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Stored value has unexpected shape, treating as miss");
                Ok(None)
            },
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(&value).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.inner.set(key, Bytes::from(raw), ttl).await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, StoreError> {
        self.inner.invalidate_pattern(pattern).await
    }

    fn metrics(&self) -> StoreMetrics {
        self.inner.metrics()
    }
}
