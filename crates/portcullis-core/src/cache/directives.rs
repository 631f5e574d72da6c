//! Request-side cache directives and conditional validators.

use std::time::SystemTime;

use http::HeaderMap;
use http::header::{AUTHORIZATION, CACHE_CONTROL, IF_MODIFIED_SINCE, IF_NONE_MATCH, PRAGMA};

use super::entry::CacheEntry;

/// What the request says about cache use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestDirectives {
    /// `Cache-Control: no-cache` / `no-store` or `Pragma: no-cache`.
    pub no_cache: bool,
    /// An `Authorization` header is present.
    pub has_credentials: bool,
}

impl RequestDirectives {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let no_cache = headers.get_all(CACHE_CONTROL).iter().any(|value| {
            value.to_str().is_ok_and(|v| {
                has_directive(v, "no-cache") || has_directive(v, "no-store")
            })
        }) || headers
            .get_all(PRAGMA)
            .iter()
            .any(|value| value.to_str().is_ok_and(|v| has_directive(v, "no-cache")));

        Self {
            no_cache,
            has_credentials: headers.contains_key(AUTHORIZATION),
        }
    }
}

/// Returns true if a comma-separated directive list contains `name`.
///
/// Directive arguments (`max-age=0`) are ignored when matching.
pub fn has_directive(value: &str, name: &str) -> bool {
    value.split(',').any(|directive| {
        let token = directive.split('=').next().unwrap_or_default().trim();
        token.eq_ignore_ascii_case(name)
    })
}

/// Conditional request validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    if_none_match: Vec<String>,
    if_modified_since: Option<SystemTime>,
}

impl Validators {
    /// Reads `If-None-Match` and `If-Modified-Since`.
    ///
    /// Unparseable dates are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let if_none_match = headers
            .get_all(IF_NONE_MATCH)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(normalize_etag)
            .filter(|tag| !tag.is_empty())
            .collect();

        let if_modified_since = headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| httpdate::parse_http_date(v.trim()).ok());

        Self {
            if_none_match,
            if_modified_since,
        }
    }

    /// Returns true if the client's copy is still current.
    ///
    /// Either validator is enough: an entity tag equal to the stored
    /// content hash (or `*`), or a modified-since date not older than the
    /// stored last-modified time.
    pub fn not_modified(&self, entry: &CacheEntry) -> bool {
        let tag_matches = self
            .if_none_match
            .iter()
            .any(|tag| tag == "*" || *tag == entry.content_hash);

        let unmodified = self
            .if_modified_since
            .is_some_and(|since| since >= entry.last_modified);

        tag_matches || unmodified
    }
}

/// Strips whitespace, the weak prefix and surrounding quotes.
fn normalize_etag(raw: &str) -> String {
    let tag = raw.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"').to_string()
}
