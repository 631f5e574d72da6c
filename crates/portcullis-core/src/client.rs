//! Client identity derived from request metadata.

use std::fmt;
use std::net::IpAddr;

use http::HeaderMap;

/// Header carrying the proxy chain, leftmost entry is the original client.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Header set by a single reverse proxy with the client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Opaque identity used to key rate-limit buckets.
///
/// The value is never validated as an IP address; whatever the proxy
/// supplied is used verbatim as a map key.
///
/// # Example
///
/// ```
/// use http::HeaderMap;
/// use portcullis_core::ClientId;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
///
/// let id = ClientId::from_request(&headers, None);
/// assert_eq!(id.as_str(), "203.0.113.7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a client identity from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Resolves the identity for a request.
    ///
    /// Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`,
    /// then the transport peer address, then the literal `unknown`.
    pub fn from_request(headers: &HeaderMap, peer: Option<IpAddr>) -> Self {
        if let Some(forwarded) = header_str(headers, FORWARDED_FOR_HEADER)
            && let Some(first) = forwarded.split(',').next().map(str::trim)
            && !first.is_empty()
        {
            return Self::new(first);
        }

        if let Some(real_ip) = header_str(headers, REAL_IP_HEADER) {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return Self::new(real_ip);
            }
        }

        match peer {
            Some(addr) => Self::new(addr.to_string()),
            None => Self::new("unknown"),
        }
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
