//! Shared fixtures for portcullis-core integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use glob::Pattern;
use parking_lot::Mutex;
use portcullis_core::cache::{CacheEntry, CacheStore, StoreError, StoreMetrics};

/// In-process store honouring per-entry TTL and glob invalidation.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (CacheEntry, Instant)>>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl MemoryStore {
    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    /// Number of `get` calls served so far.
    pub fn lookups(&self) -> u64 {
        self.hits.load(Ordering::Relaxed) + self.misses.load(Ordering::Relaxed)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Replaces the stored entry for `key` without touching its expiry.
    pub fn overwrite(&self, key: &str, entry: CacheEntry) {
        let mut entries = self.entries.lock();
        let expires = entries
            .get(key)
            .map(|(_, at)| *at)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(60));
        entries.insert(key.to_string(), (entry, expires));
    }
}

#[async_trait]
impl CacheStore<CacheEntry> for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut entries = self.entries.lock();
        let live = match entries.get(key) {
            Some((_, expires)) if *expires <= Instant::now() => {
                entries.remove(key);
                None
            },
            Some((entry, _)) => Some(entry.clone()),
            None => None,
        };
        if live.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(live)
    }

    async fn set(&self, key: &str, value: CacheEntry, ttl: Duration) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, StoreError> {
        let glob = Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !glob.matches(key));
        Ok(before - entries.len())
    }

    fn metrics(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len() as u64,
        }
    }
}

/// Store whose every call fails.
pub struct DownStore;

#[async_trait]
impl CacheStore<CacheEntry> for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: CacheEntry, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn invalidate_pattern(&self, _pattern: &str) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn metrics(&self) -> StoreMetrics {
        StoreMetrics::default()
    }
}

/// Store whose calls never complete.
pub struct HangingStore;

#[async_trait]
impl CacheStore<CacheEntry> for HangingStore {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, StoreError> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: CacheEntry, _ttl: Duration) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn invalidate_pattern(&self, _pattern: &str) -> Result<usize, StoreError> {
        std::future::pending().await
    }

    fn metrics(&self) -> StoreMetrics {
        StoreMetrics::default()
    }
}
