//! Middleware de logging estructurado.
//!
//! Runs outside the gateway layers, so the completion line sees the final
//! admission and cache outcome through the response headers.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, Request, Response, StatusCode},
};
use tower::{Layer, Service};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use super::rate_limit::{RATE_LIMIT_POLICY, RATE_LIMIT_REMAINING};
use super::request_id::REQUEST_ID_HEADER;
use super::response_cache::X_CACHE;

#[derive(Clone, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware { inner }
    }
}

/// Wraps each request in an `http_request` span and logs its outcome.
#[derive(Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for LoggingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let span = request_span(&request);
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let start = Instant::now();
                debug!("Request received");

                let response = inner.call(request).await?;
                log_outcome(response.status(), response.headers(), start);

                Ok(response)
            }
            .instrument(span),
        )
    }
}

fn request_span(request: &Request<Body>) -> Span {
    info_span!(
        "http_request",
        request_id = header_str(request.headers(), &REQUEST_ID_HEADER).unwrap_or("-"),
        method = %request.method(),
        path = %request.uri().path(),
    )
}

fn log_outcome(status: StatusCode, headers: &HeaderMap, start: Instant) {
    let duration_ms = start.elapsed().as_millis() as u64;
    let cache = header_str(headers, &X_CACHE).unwrap_or("-");
    let policy = header_str(headers, &RATE_LIMIT_POLICY).unwrap_or("-");
    let remaining = header_str(headers, &RATE_LIMIT_REMAINING).unwrap_or("-");

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            warn!(status = status.as_u16(), policy, duration_ms, "Request rejected")
        },
        s if s.is_server_error() => {
            error!(status = s.as_u16(), cache, policy, duration_ms, "Request failed")
        },
        s => info!(
            status = s.as_u16(),
            cache,
            policy,
            remaining,
            duration_ms,
            "Request completed"
        ),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
