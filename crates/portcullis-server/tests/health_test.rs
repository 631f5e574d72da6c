mod helpers;

use axum::http::StatusCode;
use helpers::client;

#[tokio::test]
async fn health_check_returns_200() {
    client().get("/health").await.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn health_check_returns_json() {
    let response = client().get("/health").await;

    let content_type = response.header("content-type").unwrap();
    assert!(content_type.contains("application/json"));
}

#[tokio::test]
async fn health_check_body_contains_status_up() {
    let response = client().get("/health").await;

    let health: serde_json::Value = response.json();
    assert_eq!(health["status"], "UP");
}

#[tokio::test]
async fn health_check_is_never_cached() {
    let client = client();

    client.get("/health").await;
    let second = client.get("/health").await;

    second.assert_header_absent("x-cache");
}

#[tokio::test]
async fn metrics_endpoint_returns_text() {
    let response = client().get("/metrics").await;

    response.assert_status(StatusCode::OK);
    let content_type = response.header("content-type").unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    client()
        .get("/does-not-exist")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_cache_counters() {
    let (client, _) = helpers::app_with(helpers::cache_only_settings());

    client.get("/api/items/1").await;
    client.get("/api/items/1").await;
    let health: serde_json::Value = client.get("/health").await.json();

    assert_eq!(health["cache"]["hits"], 1);
    assert_eq!(health["cache"]["misses"], 1);
    assert_eq!(health["cache"]["hit_rate"], 0.5);
}

#[tokio::test]
async fn health_omits_cache_when_disabled() {
    let mut settings = helpers::cache_only_settings();
    settings.cache.enabled = false;
    let (client, _) = helpers::app_with(settings);

    let health: serde_json::Value = client.get("/health").await.json();

    assert_eq!(health["status"], "UP");
    assert!(health.get("cache").is_none());
}
