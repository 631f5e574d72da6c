//! Middleware that serves and fills the response cache.

use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, ETAG, LAST_MODIFIED},
    },
    response::IntoResponse,
};
use portcullis_core::cache::{
    CACHE_STATUS_HEADER, CacheDecision, CacheEntry, PendingStore, ResponseCache,
};
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::capture::{Captured, capture};
use crate::error::AppError;
use crate::metrics::CacheMetrics;

/// `X-Cache` response header.
pub static X_CACHE: HeaderName = HeaderName::from_static(CACHE_STATUS_HEADER);

/// Layer that puts a [`ResponseCache`] in front of the inner service.
#[derive(Clone)]
pub struct ResponseCacheLayer {
    cache: ResponseCache,
    metrics: CacheMetrics,
}

impl ResponseCacheLayer {
    pub fn new(cache: ResponseCache, metrics: CacheMetrics) -> Self {
        Self { cache, metrics }
    }
}

impl<S> Layer<S> for ResponseCacheLayer {
    type Service = ResponseCacheMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseCacheMiddleware {
            inner,
            cache: self.cache.clone(),
            metrics: self.metrics,
        }
    }
}

/// Replays fresh and stale entries, answers conditional requests with
/// `304`, and stores cacheable handler responses on a miss.
#[derive(Clone)]
pub struct ResponseCacheMiddleware<S> {
    inner: S,
    cache: ResponseCache,
    metrics: CacheMetrics,
}

impl<S> Service<Request<Body>> for ResponseCacheMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let cache = self.cache.clone();
        let metrics = self.metrics;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let head_only = request.method() == Method::HEAD;
            let decision = metrics
                .time_operation(
                    "lookup",
                    cache.lookup(request.method(), request.uri(), request.headers()),
                )
                .await;

            match decision {
                CacheDecision::Bypass(reason) => {
                    metrics.record_bypass(reason.as_str());
                    inner.call(request).await
                },
                CacheDecision::Hit(entry) => {
                    metrics.record_hit();
                    debug!(key = %entry.key, "Cache hit");
                    Ok(replay(&entry, "HIT", head_only))
                },
                CacheDecision::Stale(entry) => {
                    metrics.record_stale();
                    debug!(key = %entry.key, "Serving stale entry");
                    Ok(replay(&entry, "STALE", head_only))
                },
                CacheDecision::NotModified(entry) => {
                    metrics.record_not_modified();
                    debug!(key = %entry.key, "Client copy is current");
                    Ok(not_modified(&entry))
                },
                CacheDecision::Miss(pending) => {
                    metrics.record_miss();
                    let response = inner.call(request).await?;
                    Ok(write_back(&cache, metrics, pending, response).await)
                },
            }
        })
    }
}

/// Captures a handler response and stores it if cacheable.
async fn write_back(
    cache: &ResponseCache,
    metrics: CacheMetrics,
    pending: PendingStore,
    response: Response<Body>,
) -> Response<Body> {
    if !pending.storable {
        return response;
    }

    let (mut parts, body) = match capture(response, cache.config().max_body_bytes).await {
        Ok(Captured::Buffered { parts, body }) => (parts, body),
        Ok(Captured::Passthrough(response)) => {
            debug!(key = %pending.key, "Response body not buffered, skipping store");
            return response;
        },
        Err(e) => {
            warn!(key = %pending.key, error = %e, "Failed to read handler response body");
            return AppError::Internal("failed to read response body".to_string())
                .into_response();
        },
    };

    if !cache.is_cacheable(&pending, parts.status, &parts.headers, body.len()) {
        return Response::from_parts(parts, Body::from(body));
    }

    let entry = cache.prepare_entry(&pending, parts.status, &parts.headers, body.clone());
    set_validators(&mut parts.headers, &entry);

    if cache.store(entry).await {
        metrics.record_store();
    }

    Response::from_parts(parts, Body::from(body))
}

/// Rebuilds a stored response, tagged with `X-Cache`.
fn replay(entry: &CacheEntry, tag: &'static str, head_only: bool) -> Response<Body> {
    let body = if head_only {
        Body::empty()
    } else {
        Body::from(entry.body.clone())
    };

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);

    let headers = response.headers_mut();
    for (name, value) in &entry.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            },
            _ => debug!(header = %name, "Skipping stored header that is not valid HTTP"),
        }
    }
    if head_only {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(entry.body.len()));
    }
    headers.insert(X_CACHE.clone(), HeaderValue::from_static(tag));

    response
}

/// `304 Not Modified` carrying the entry's validators.
fn not_modified(entry: &CacheEntry) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    set_validators(response.headers_mut(), entry);
    response
}

fn set_validators(headers: &mut HeaderMap, entry: &CacheEntry) {
    if let Ok(etag) = HeaderValue::from_str(&entry.etag()) {
        headers.insert(ETAG, etag);
    }
    if let Ok(last_modified) = HeaderValue::from_str(&entry.last_modified_http()) {
        headers.insert(LAST_MODIFIED, last_modified);
    }
    if let Some(Ok(cache_control)) = entry
        .header(CACHE_CONTROL.as_str())
        .map(HeaderValue::from_str)
    {
        headers.insert(CACHE_CONTROL, cache_control);
    }
}
