//! Middleware de admision por token bucket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, HeaderValue, Request, Response},
    response::IntoResponse,
};
use portcullis_core::{Admission, ClientId, PolicyClass, RateLimitClassifier, TokenBucketRegistry};
use tower::{Layer, Service};
use tracing::warn;

use crate::error::AppError;
use crate::metrics::rate_limit::record_decision;

pub static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub static RATE_LIMIT_POLICY: HeaderName = HeaderName::from_static("x-ratelimit-policy");

/// Layer that admits or rejects requests per client and policy class.
#[derive(Clone)]
pub struct RateLimitLayer {
    registry: Arc<TokenBucketRegistry>,
    classifier: Arc<RateLimitClassifier>,
}

impl RateLimitLayer {
    pub fn new(registry: Arc<TokenBucketRegistry>, classifier: Arc<RateLimitClassifier>) -> Self {
        Self {
            registry,
            classifier,
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            registry: Arc::clone(&self.registry),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

/// Middleware that consumes one token per request.
///
/// Rejected requests get `429` without reaching the inner service. Every
/// response carries the `X-RateLimit-*` headers.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    registry: Arc<TokenBucketRegistry>,
    classifier: Arc<RateLimitClassifier>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
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
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let client = ClientId::from_request(request.headers(), peer);
        let class = self.classifier.classify(request.uri().path());
        let policy = *self.registry.policies().for_class(class);

        let admission = self.registry.acquire(&client, class);
        record_decision(class, admission.allowed);

        if !admission.allowed {
            warn!(
                client = %client,
                class = %class,
                path = %request.uri().path(),
                "Request throttled"
            );
            let mut response = AppError::Throttled {
                policy: class,
                retry_after: policy.window_secs(),
            }
            .into_response();
            apply_headers(
                response.headers_mut(),
                class,
                policy.requests,
                policy.window_secs(),
                admission,
            );
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            apply_headers(
                response.headers_mut(),
                class,
                policy.requests,
                policy.window_secs(),
                admission,
            );
            Ok(response)
        })
    }
}

fn apply_headers(
    headers: &mut HeaderMap,
    class: PolicyClass,
    limit: u32,
    window_secs: u64,
    admission: Admission,
) {
    headers.insert(RATE_LIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(
        RATE_LIMIT_REMAINING.clone(),
        HeaderValue::from(admission.remaining),
    );
    headers.insert(RATE_LIMIT_RESET.clone(), HeaderValue::from(window_secs));
    headers.insert(
        RATE_LIMIT_POLICY.clone(),
        HeaderValue::from_static(class.as_str()),
    );
}
