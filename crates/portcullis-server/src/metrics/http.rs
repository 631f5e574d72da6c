//! HTTP metrics middleware.

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};

use crate::middleware::X_CACHE;

/// Records one request counter and one latency sample per request.
///
/// Labels use the matched route template (`/api/items/{id}`), not the raw
/// path, plus how the gateway disposed of the request.
pub async fn http_metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_owned();
    let route = matched_path.map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());

    let response = next.run(request).await;
    let outcome = outcome(&response);
    let status = response.status().as_u16().to_string();

    counter!(
        "portcullis_http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        "portcullis_http_request_duration_seconds",
        "method" => method,
        "route" => route,
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// `throttled`, `hit`, `stale`, `not_modified` or `forwarded`.
fn outcome(response: &Response) -> &'static str {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return "throttled";
    }
    if response.status() == StatusCode::NOT_MODIFIED {
        return "not_modified";
    }
    match response.headers().get(&X_CACHE).map(|v| v.as_bytes()) {
        Some(b"HIT") => "hit",
        Some(b"STALE") => "stale",
        _ => "forwarded",
    }
}

pub fn register_http_metrics() {
    metrics::describe_counter!(
        "portcullis_http_requests_total",
        "Requests seen by the gateway, by route, status and outcome"
    );
    metrics::describe_histogram!(
        "portcullis_http_request_duration_seconds",
        "End-to-end request latency in seconds"
    );
}
