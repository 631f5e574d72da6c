//! Custom assertions para tests.

use serde_json::Value;

use super::TestResponse;

/// Verifica los headers X-RateLimit-* de una respuesta.
pub fn assert_rate_limit_headers(response: &TestResponse, limit: u32, remaining: u32, policy: &str) {
    response
        .assert_header("x-ratelimit-limit", &limit.to_string())
        .assert_header("x-ratelimit-remaining", &remaining.to_string())
        .assert_header("x-ratelimit-policy", policy)
        .assert_header_exists("x-ratelimit-reset");
}

/// Verifica que una respuesta sea un 429 que nombra la clase de politica.
pub fn assert_throttled(response: &TestResponse, policy: &str, retry_after: u64) {
    response
        .assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS)
        .assert_header("retry-after", &retry_after.to_string());

    let json: Value = response.json();
    assert_eq!(json["error"], "Too Many Requests");
    assert_eq!(json["policy"], policy);
    let message = json["message"].as_str().expect("'message' should be a string");
    assert!(
        message.contains(policy),
        "Expected message to name policy '{}', got '{}'",
        policy,
        message
    );
    assert_eq!(json["retry_after"], retry_after);
}
