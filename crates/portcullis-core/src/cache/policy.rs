//! Per-route cache policies resolved by longest path prefix.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{PortcullisError, Result};

/// Caching behaviour for a group of routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a stored response is fresh.
    pub ttl: Duration,
    /// Request headers that select between variants of the same URL.
    pub vary_headers: Vec<String>,
    /// Whether `If-None-Match` / `If-Modified-Since` can produce a 304.
    pub conditional: bool,
    /// Extra time past `ttl` during which the entry is served as stale.
    pub stale_window: Duration,
    /// Whether requests carrying `Authorization` may use the cache.
    pub allow_authenticated: bool,
}

impl CachePolicy {
    /// Creates a policy with the given TTL and no route-specific vary headers.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Returns the `Cache-Control` value advertised for stored responses.
    pub fn cache_control(&self) -> String {
        if self.stale_window.is_zero() {
            format!("public, max-age={}", self.ttl.as_secs())
        } else {
            format!(
                "public, max-age={}, stale-while-revalidate={}",
                self.ttl.as_secs(),
                self.stale_window.as_secs()
            )
        }
    }

    /// Returns how long the store must keep the entry.
    pub fn store_ttl(&self) -> Duration {
        self.ttl + self.stale_window
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            vary_headers: Vec::new(),
            conditional: true,
            stale_window: Duration::ZERO,
            allow_authenticated: false,
        }
    }
}

/// A policy bound to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoute {
    pub path_prefix: String,
    pub policy: CachePolicy,
}

impl CacheRoute {
    pub fn new(path_prefix: impl Into<String>, policy: CachePolicy) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            policy,
        }
    }
}

/// Resolves the policy for a path.
///
/// The route with the longest matching prefix wins; paths no route matches
/// get the default policy.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use portcullis_core::{CachePolicy, CachePolicyTable, CacheRoute};
///
/// let table = CachePolicyTable::new(
///     CachePolicy::with_ttl(Duration::from_secs(60)),
///     vec![
///         CacheRoute::new("/api", CachePolicy::with_ttl(Duration::from_secs(10))),
///         CacheRoute::new("/api/catalog", CachePolicy::with_ttl(Duration::from_secs(3600))),
///     ],
/// ).unwrap();
///
/// assert_eq!(table.resolve("/api/catalog/7").ttl, Duration::from_secs(3600));
/// assert_eq!(table.resolve("/api/users").ttl, Duration::from_secs(10));
/// assert_eq!(table.resolve("/other").ttl, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CachePolicyTable {
    default: Arc<CachePolicy>,
    /// Sorted by prefix length, longest first.
    routes: Vec<(String, Arc<CachePolicy>)>,
}

impl CachePolicyTable {
    /// Builds a table, rejecting prefixes that do not start with `/`.
    pub fn new(default: CachePolicy, routes: Vec<CacheRoute>) -> Result<Self> {
        let mut table = Vec::with_capacity(routes.len());
        for route in routes {
            if !route.path_prefix.starts_with('/') {
                return Err(PortcullisError::invalid_pattern(
                    route.path_prefix,
                    "route prefix must start with '/'",
                ));
            }
            table.push((route.path_prefix, Arc::new(route.policy)));
        }
        table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Self {
            default: Arc::new(default),
            routes: table,
        })
    }

    /// Returns the policy for `path`.
    pub fn resolve(&self, path: &str) -> &Arc<CachePolicy> {
        self.routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, policy)| policy)
            .unwrap_or(&self.default)
    }

    /// Returns the fallback policy.
    pub fn default_policy(&self) -> &CachePolicy {
        &self.default
    }
}

impl Default for CachePolicyTable {
    fn default() -> Self {
        Self {
            default: Arc::new(CachePolicy::default()),
            routes: Vec::new(),
        }
    }
}
