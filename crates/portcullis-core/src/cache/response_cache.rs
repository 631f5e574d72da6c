//! Response cache orchestration: skip rules, lookup, conditional
//! validation, freshness and write-back.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use http::header::{CACHE_CONTROL, ETAG, LAST_MODIFIED, SET_COOKIE};
use http::{HeaderMap, Method, StatusCode, Uri};
use tracing::{debug, info, warn};

use super::directives::{RequestDirectives, Validators, has_directive};
use super::entry::{CacheEntry, Freshness, content_hash, truncate_to_secs};
use super::key::{CacheKey, CacheKeyBuilder, route_pattern};
use super::policy::{CachePolicy, CachePolicyTable};
use super::store::{CacheStore, StoreError, StoreMetrics};

/// Header tagging responses served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Headers the cache owns on stored responses.
const MANAGED_HEADERS: &[&str] = &["etag", "last-modified", "cache-control", CACHE_STATUS_HEADER];

/// Tunables for [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    pub policies: CachePolicyTable,
    pub default_vary_headers: Vec<String>,
    /// Path prefixes that never touch the cache.
    pub skip_patterns: Vec<String>,
    pub cacheable_statuses: Vec<u16>,
    /// Larger bodies are passed through without being stored.
    pub max_body_bytes: usize,
    /// Deadline for every store call; expiry is handled as a miss.
    pub store_timeout: Duration,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            policies: CachePolicyTable::default(),
            default_vary_headers: vec![
                "accept".to_string(),
                "accept-encoding".to_string(),
                "accept-language".to_string(),
            ],
            skip_patterns: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/cache".to_string(),
            ],
            cacheable_statuses: vec![200, 203, 300, 301, 404, 410],
            max_body_bytes: 1024 * 1024,
            store_timeout: Duration::from_millis(250),
        }
    }
}

/// Why a request went straight to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    Method,
    SkipPattern,
    NoCache,
    Credentials,
}

impl BypassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassReason::Method => "method",
            BypassReason::SkipPattern => "skip_pattern",
            BypassReason::NoCache => "no_cache",
            BypassReason::Credentials => "credentials",
        }
    }
}

/// Key and policy carried from a miss to the write-back.
#[derive(Debug, Clone)]
pub struct PendingStore {
    pub key: CacheKey,
    pub policy: Arc<CachePolicy>,
    /// Only GET responses are written back; HEAD misses are not.
    pub storable: bool,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheDecision {
    /// Not eligible for caching; call the handler and do not store.
    Bypass(BypassReason),
    /// Fresh entry, replay it.
    Hit(CacheEntry),
    /// Fresh entry the client already holds; answer 304.
    NotModified(CacheEntry),
    /// Entry past its TTL but inside the stale window, replay it.
    Stale(CacheEntry),
    /// Nothing usable; call the handler and maybe store.
    Miss(PendingStore),
}

/// Result of an invalidation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationResult {
    /// Number of entries removed, best effort.
    pub count: usize,
    /// Patterns applied.
    pub patterns: Vec<String>,
}

/// Caches handler responses in an external [`CacheStore`].
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore<CacheEntry>>,
    keys: CacheKeyBuilder,
    config: Arc<ResponseCacheConfig>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore<CacheEntry>>, config: ResponseCacheConfig) -> Self {
        Self {
            keys: CacheKeyBuilder::new(&config.default_vary_headers),
            store,
            config: Arc::new(config),
        }
    }

    /// Returns why a request must skip the cache, if it must.
    pub fn bypass_reason(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        policy: &CachePolicy,
    ) -> Option<BypassReason> {
        if method != Method::GET && method != Method::HEAD {
            return Some(BypassReason::Method);
        }
        if self
            .config
            .skip_patterns
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Some(BypassReason::SkipPattern);
        }
        let directives = RequestDirectives::from_headers(headers);
        if directives.no_cache {
            return Some(BypassReason::NoCache);
        }
        if directives.has_credentials && !policy.allow_authenticated {
            return Some(BypassReason::Credentials);
        }
        None
    }

    /// Looks the request up in the store.
    ///
    /// Store failures and timeouts are reported as misses.
    pub async fn lookup(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> CacheDecision {
        let path = uri.path();
        let policy = Arc::clone(self.config.policies.resolve(path));

        if let Some(reason) = self.bypass_reason(method, path, headers, &policy) {
            debug!(path = %path, reason = reason.as_str(), "Cache bypassed");
            return CacheDecision::Bypass(reason);
        }

        let key = self.keys.build(method, path, uri.query(), headers, &policy);
        let pending = PendingStore {
            storable: method == Method::GET,
            key,
            policy,
        };

        let entry = match self.fetch(&pending.key).await {
            Some(entry) if entry.key == pending.key.as_str() => entry,
            Some(_) => {
                warn!(key = %pending.key, "Stored entry key mismatch, treating as miss");
                return CacheDecision::Miss(pending);
            },
            None => return CacheDecision::Miss(pending),
        };

        match entry.freshness(SystemTime::now()) {
            Freshness::Fresh => {
                if pending.policy.conditional && Validators::from_headers(headers).not_modified(&entry) {
                    CacheDecision::NotModified(entry)
                } else {
                    CacheDecision::Hit(entry)
                }
            },
            Freshness::Stale => CacheDecision::Stale(entry),
            Freshness::Expired => CacheDecision::Miss(pending),
        }
    }

    async fn fetch(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.bounded(self.store.get(key.as_str())).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            },
        }
    }

    /// Returns true if a captured handler response may be stored.
    pub fn is_cacheable(
        &self,
        pending: &PendingStore,
        status: StatusCode,
        headers: &HeaderMap,
        body_len: usize,
    ) -> bool {
        if !pending.storable || body_len == 0 || body_len > self.config.max_body_bytes {
            return false;
        }
        if !self.config.cacheable_statuses.contains(&status.as_u16()) {
            return false;
        }
        if headers.contains_key(SET_COOKIE) {
            return false;
        }
        !headers.get_all(CACHE_CONTROL).iter().any(|value| {
            value
                .to_str()
                .is_ok_and(|v| has_directive(v, "no-store") || has_directive(v, "private"))
        })
    }

    /// Builds the entry for a captured response, adding validator and
    /// freshness headers.
    pub fn prepare_entry(
        &self,
        pending: &PendingStore,
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
    ) -> CacheEntry {
        let now = SystemTime::now();
        let hash = content_hash(&body);
        let last_modified = truncate_to_secs(now);

        let mut stored_headers: Vec<(String, String)> = headers
            .iter()
            .filter(|(name, _)| !MANAGED_HEADERS.contains(&name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        stored_headers.push((ETAG.as_str().to_string(), format!("\"{hash}\"")));
        stored_headers.push((
            LAST_MODIFIED.as_str().to_string(),
            httpdate::fmt_http_date(last_modified),
        ));
        stored_headers.push((
            CACHE_CONTROL.as_str().to_string(),
            pending.policy.cache_control(),
        ));

        CacheEntry {
            key: pending.key.as_str().to_string(),
            status: status.as_u16(),
            headers: stored_headers,
            body,
            stored_at: now,
            ttl: pending.policy.ttl,
            stale_window: pending.policy.stale_window,
            content_hash: hash,
            last_modified,
        }
    }

    /// Writes an entry to the store; failures are logged and dropped.
    pub async fn store(&self, entry: CacheEntry) -> bool {
        let key = entry.key.clone();
        let ttl = entry.ttl + entry.stale_window;

        match self.bounded(self.store.set(&key, entry, ttl)).await {
            Ok(()) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Response stored");
                true
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed, response not stored");
                false
            },
        }
    }

    /// Removes every stored key matching a glob pattern.
    pub async fn invalidate_pattern(&self, pattern: &str) -> InvalidationResult {
        let count = match self.bounded(self.store.invalidate_pattern(pattern)).await {
            Ok(count) => count,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Cache invalidation failed");
                0
            },
        };

        info!(pattern = %pattern, count = count, "Cache entries invalidated by pattern");

        InvalidationResult {
            count,
            patterns: vec![pattern.to_string()],
        }
    }

    /// Removes every variant stored for `method` + `path`.
    pub async fn invalidate_route(&self, method: &Method, path: &str) -> InvalidationResult {
        self.invalidate_pattern(&route_pattern(method, path)).await
    }

    /// Returns the store counters.
    pub fn metrics(&self) -> StoreMetrics {
        self.store.metrics()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ResponseCacheConfig {
        &self.config
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let deadline = self.config.store_timeout;
        tokio::time::timeout(deadline, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(deadline)))
    }
}
