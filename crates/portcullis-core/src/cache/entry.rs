//! Stored response representation and freshness evaluation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Hex characters kept from the body digest.
const CONTENT_HASH_LEN: usize = 32;

/// Lifecycle state of an entry at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within `ttl`.
    Fresh,
    /// Past `ttl` but inside the stale window.
    Stale,
    /// Past the stale window; treated as absent.
    Expired,
}

/// A captured handler response.
///
/// Entries are immutable once stored; a later miss for the same key
/// overwrites the whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub status: u16,
    /// Response headers in emission order, names lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: SystemTime,
    pub ttl: Duration,
    pub stale_window: Duration,
    /// Digest of `body`, served as the entity tag.
    pub content_hash: String,
    /// Second-precision timestamp served as `Last-Modified`.
    pub last_modified: SystemTime,
}

impl CacheEntry {
    /// Evaluates the entry against `now`.
    ///
    /// A `now` earlier than `stored_at` (clock step backwards) counts as fresh.
    pub fn freshness(&self, now: SystemTime) -> Freshness {
        let age = now.duration_since(self.stored_at).unwrap_or(Duration::ZERO);
        if age < self.ttl {
            Freshness::Fresh
        } else if age < self.ttl + self.stale_window {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Returns the quoted entity tag.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.content_hash)
    }

    /// Returns `Last-Modified` as an HTTP date.
    pub fn last_modified_http(&self) -> String {
        httpdate::fmt_http_date(self.last_modified)
    }

    /// Returns the first header value with the given lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Computes the content hash used as an entity tag.
pub fn content_hash(body: &[u8]) -> String {
    let hex = blake3::hash(body).to_hex();
    hex.as_str()[..CONTENT_HASH_LEN].to_string()
}

/// Truncates a timestamp to whole seconds, the precision of HTTP dates.
pub fn truncate_to_secs(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => UNIX_EPOCH + Duration::from_secs(since.as_secs()),
        Err(_) => time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl: u64, stale: u64) -> CacheEntry {
        let stored_at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        CacheEntry {
            key: "http:GET:/x:abc".to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::from_static(b"hello"),
            stored_at,
            ttl: Duration::from_secs(ttl),
            stale_window: Duration::from_secs(stale),
            content_hash: content_hash(b"hello"),
            last_modified: stored_at,
        }
    }

    #[test]
    fn test_freshness_without_stale_window() {
        let e = entry(60, 0);

        assert_eq!(e.freshness(e.stored_at), Freshness::Fresh);
        assert_eq!(
            e.freshness(e.stored_at + Duration::from_secs(59)),
            Freshness::Fresh
        );
        assert_eq!(
            e.freshness(e.stored_at + Duration::from_secs(60)),
            Freshness::Expired
        );
    }

    #[test]
    fn test_freshness_with_stale_window() {
        let e = entry(60, 30);

        assert_eq!(
            e.freshness(e.stored_at + Duration::from_secs(60)),
            Freshness::Stale
        );
        assert_eq!(
            e.freshness(e.stored_at + Duration::from_secs(89)),
            Freshness::Stale
        );
        assert_eq!(
            e.freshness(e.stored_at + Duration::from_secs(90)),
            Freshness::Expired
        );
    }

    #[test]
    fn test_clock_skew_counts_as_fresh() {
        let e = entry(60, 0);

        assert_eq!(
            e.freshness(e.stored_at - Duration::from_secs(5)),
            Freshness::Fresh
        );
    }

    #[test]
    fn test_etag_is_quoted_hash() {
        let e = entry(1, 0);

        assert_eq!(e.etag(), format!("\"{}\"", content_hash(b"hello")));
        assert_eq!(e.content_hash.len(), 32);
    }

    #[test]
    fn test_last_modified_format() {
        let e = entry(1, 0);

        assert_eq!(e.last_modified_http(), "Tue, 14 Nov 2023 22:13:20 GMT");
    }

    #[test]
    fn test_truncate_to_secs() {
        let t = UNIX_EPOCH + Duration::from_millis(1_500);

        assert_eq!(truncate_to_secs(t), UNIX_EPOCH + Duration::from_secs(1));
    }

    #[test]
    fn test_header_lookup() {
        let e = entry(1, 0);

        assert_eq!(e.header("content-type"), Some("text/plain"));
        assert_eq!(e.header("etag"), None);
    }
}
