//! HTTP response caching.
//!
//! - [`ResponseCache`]: lookup, freshness, conditional validation and write-back
//! - [`CacheStore`]: typed keyed store behind the cache
//! - [`CachePolicyTable`]: per-route TTL, vary headers and stale window
//! - [`CacheKeyBuilder`]: deterministic keys across processes

mod directives;
mod entry;
mod key;
mod policy;
mod response_cache;
mod store;

pub use directives::{RequestDirectives, Validators, has_directive};
pub use entry::{CacheEntry, Freshness, content_hash};
pub use key::{CacheKey, CacheKeyBuilder, KEY_PREFIX, route_pattern};
pub use policy::{CachePolicy, CachePolicyTable, CacheRoute};
pub use response_cache::{
    BypassReason, CACHE_STATUS_HEADER, CacheDecision, InvalidationResult, PendingStore,
    ResponseCache, ResponseCacheConfig,
};
pub use store::{CacheStore, JsonCodecStore, StoreError, StoreMetrics};
