//! Cache metrics recording.

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Registra las metricas de cache.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_cache_metrics() {
    metrics::describe_counter!("portcullis_cache_hits_total", "Responses replayed from cache");
    metrics::describe_counter!(
        "portcullis_cache_misses_total",
        "Cacheable requests forwarded to the handler"
    );
    metrics::describe_counter!(
        "portcullis_cache_stale_total",
        "Responses replayed past their TTL inside the stale window"
    );
    metrics::describe_counter!(
        "portcullis_cache_not_modified_total",
        "Conditional requests answered with 304"
    );
    metrics::describe_counter!("portcullis_cache_stores_total", "Responses written to the store");
    metrics::describe_counter!(
        "portcullis_cache_bypass_total",
        "Requests that skipped the cache"
    );
    metrics::describe_counter!(
        "portcullis_cache_evictions_total",
        "Entries removed from the store"
    );
    metrics::describe_gauge!("portcullis_cache_entries", "Current number of stored responses");
    metrics::describe_histogram!(
        "portcullis_cache_operation_seconds",
        "Time spent on store operations"
    );
}

/// Recorder de metricas de cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_hit(&self) {
        counter!("portcullis_cache_hits_total").increment(1);
    }

    pub fn record_miss(&self) {
        counter!("portcullis_cache_misses_total").increment(1);
    }

    pub fn record_stale(&self) {
        counter!("portcullis_cache_stale_total").increment(1);
    }

    pub fn record_not_modified(&self) {
        counter!("portcullis_cache_not_modified_total").increment(1);
    }

    pub fn record_store(&self) {
        counter!("portcullis_cache_stores_total").increment(1);
    }

    pub fn record_bypass(&self, reason: &'static str) {
        counter!("portcullis_cache_bypass_total", "reason" => reason).increment(1);
    }

    /// Registra una eviction
    pub fn record_eviction(&self, reason: &'static str) {
        counter!("portcullis_cache_evictions_total", "reason" => reason).increment(1);
    }

    /// Actualiza el gauge de entries
    pub fn update_entry_count(&self, count: u64) {
        gauge!("portcullis_cache_entries").set(count as f64);
    }

    /// Registra la duracion de una operacion
    pub fn record_operation_duration(&self, operation: &'static str, duration: Duration) {
        histogram!("portcullis_cache_operation_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    /// Mide el tiempo de una operacion asincrona
    pub async fn time_operation<T, F>(&self, operation: &'static str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record_operation_duration(operation, start.elapsed());
        result
    }
}
