//! Cache key derivation.

use std::fmt;

use glob::Pattern;
use http::{HeaderMap, Method};

use super::policy::CachePolicy;

/// Prefix shared by every response cache key.
pub const KEY_PREFIX: &str = "http";

/// Hex characters kept from the digest.
const DIGEST_HEX_LEN: usize = 32;

/// Key under which a response variant is stored.
///
/// Format: `http:{METHOD}:{path}:{digest}`. The digest covers method, path,
/// query and the vary headers present on the request; the readable
/// `METHOD:path` part lets route invalidation match every variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds [`CacheKey`]s from request identity.
///
/// # Example
///
/// ```
/// use http::{HeaderMap, Method};
/// use portcullis_core::{CacheKeyBuilder, CachePolicy};
///
/// let builder = CacheKeyBuilder::new(["accept"]);
/// let mut headers = HeaderMap::new();
/// headers.insert("accept", "application/json".parse().unwrap());
///
/// let key = builder.build(&Method::GET, "/items", Some("page=2"), &headers, &CachePolicy::default());
/// assert!(key.as_str().starts_with("http:GET:/items:"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    default_vary: Vec<String>,
}

impl CacheKeyBuilder {
    /// Creates a builder with headers that always participate in the key.
    pub fn new<I, S>(default_vary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            default_vary: default_vary
                .into_iter()
                .map(|h| h.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Derives the key for a request.
    ///
    /// `HEAD` is keyed as `GET` so it can be answered from a stored GET.
    pub fn build(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        policy: &CachePolicy,
    ) -> CacheKey {
        let method = key_method(method);

        let mut hasher = blake3::Hasher::new();
        hasher.update(method.as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update(query.unwrap_or_default().as_bytes());

        for name in self.vary_headers(policy) {
            if let Some(value) = headers.get(name.as_str()) {
                hasher.update(b"\n");
                hasher.update(name.as_bytes());
                hasher.update(b":");
                hasher.update(value.as_bytes());
            }
        }

        let hex = hasher.finalize().to_hex();
        CacheKey(format!(
            "{KEY_PREFIX}:{method}:{path}:{}",
            &hex.as_str()[..DIGEST_HEX_LEN]
        ))
    }

    /// Route headers first, then defaults, without duplicates.
    fn vary_headers(&self, policy: &CachePolicy) -> Vec<String> {
        let mut names = Vec::with_capacity(policy.vary_headers.len() + self.default_vary.len());
        let route = policy.vary_headers.iter().map(|h| h.to_ascii_lowercase());
        for name in route.chain(self.default_vary.iter().cloned()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Returns the default vary headers.
    pub fn default_vary(&self) -> &[String] {
        &self.default_vary
    }
}

/// Returns the glob pattern matching every stored variant of `method` + `path`.
///
/// Glob metacharacters in the path are escaped.
///
/// # Example
///
/// ```
/// use http::Method;
/// use portcullis_core::cache::route_pattern;
///
/// assert_eq!(route_pattern(&Method::GET, "/items/7"), "http:GET:/items/7:*");
/// ```
pub fn route_pattern(method: &Method, path: &str) -> String {
    format!(
        "{KEY_PREFIX}:{}:{}:*",
        key_method(method),
        Pattern::escape(path)
    )
}

fn key_method(method: &Method) -> &str {
    if method == Method::HEAD {
        Method::GET.as_str()
    } else {
        method.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_key_is_deterministic() {
        let builder = CacheKeyBuilder::new(["accept"]);
        let h = headers(&[("accept", "application/json")]);
        let policy = CachePolicy::default();

        let a = builder.build(&Method::GET, "/items", Some("a=1"), &h, &policy);
        let b = builder.build(&Method::GET, "/items", Some("a=1"), &h, &policy);

        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_stable_across_processes() {
        let builder = CacheKeyBuilder::default();
        let key = builder.build(
            &Method::GET,
            "/items",
            None,
            &HeaderMap::new(),
            &CachePolicy::default(),
        );

        let expected = blake3::hash(b"GET\n/items\n").to_hex();
        assert_eq!(
            key.as_str(),
            format!("http:GET:/items:{}", &expected.as_str()[..32])
        );
    }

    #[test]
    fn test_query_and_vary_values_change_key() {
        let builder = CacheKeyBuilder::new(["accept"]);
        let policy = CachePolicy::default();
        let json = headers(&[("accept", "application/json")]);
        let xml = headers(&[("accept", "application/xml")]);

        let base = builder.build(&Method::GET, "/items", None, &json, &policy);
        let other_query = builder.build(&Method::GET, "/items", Some("p=2"), &json, &policy);
        let other_accept = builder.build(&Method::GET, "/items", None, &xml, &policy);

        assert_ne!(base, other_query);
        assert_ne!(base, other_accept);
    }

    #[test]
    fn test_headers_outside_vary_set_are_ignored() {
        let builder = CacheKeyBuilder::new(["accept"]);
        let policy = CachePolicy::default();

        let plain = builder.build(&Method::GET, "/items", None, &HeaderMap::new(), &policy);
        let with_agent = builder.build(
            &Method::GET,
            "/items",
            None,
            &headers(&[("user-agent", "curl/8")]),
            &policy,
        );

        assert_eq!(plain, with_agent);
    }

    #[test]
    fn test_route_vary_headers_participate() {
        let builder = CacheKeyBuilder::default();
        let policy = CachePolicy {
            vary_headers: vec!["X-Tenant".to_string()],
            ..CachePolicy::default()
        };

        let a = builder.build(&Method::GET, "/r", None, &headers(&[("x-tenant", "a")]), &policy);
        let b = builder.build(&Method::GET, "/r", None, &headers(&[("x-tenant", "b")]), &policy);

        assert_ne!(a, b);
    }

    #[test]
    fn test_head_shares_get_key() {
        let builder = CacheKeyBuilder::default();
        let policy = CachePolicy::default();
        let empty = HeaderMap::new();

        assert_eq!(
            builder.build(&Method::HEAD, "/items", None, &empty, &policy),
            builder.build(&Method::GET, "/items", None, &empty, &policy)
        );
    }

    #[test]
    fn test_route_pattern_matches_all_variants() {
        let builder = CacheKeyBuilder::new(["accept"]);
        let policy = CachePolicy::default();
        let pattern = Pattern::new(&route_pattern(&Method::GET, "/items/7")).unwrap();

        let a = builder.build(&Method::GET, "/items/7", Some("x=1"), &HeaderMap::new(), &policy);
        let b = builder.build(
            &Method::GET,
            "/items/7",
            None,
            &headers(&[("accept", "text/html")]),
            &policy,
        );
        let other = builder.build(&Method::GET, "/items/70", None, &HeaderMap::new(), &policy);

        assert!(pattern.matches(a.as_str()));
        assert!(pattern.matches(b.as_str()));
        assert!(!pattern.matches(other.as_str()));
    }

    #[test]
    fn test_route_pattern_escapes_metacharacters() {
        assert_eq!(route_pattern(&Method::GET, "/a*b"), "http:GET:/a[*]b:*");
    }
}
