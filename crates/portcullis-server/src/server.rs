use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tracing::{error, info};

use crate::handlers::{
    auth::login,
    health::health_check,
    invalidate::{invalidate_all, invalidate_by_pattern, invalidate_route},
    items::{get_item, list_items, update_item},
    metrics::metrics_handler,
};
use crate::metrics::http::http_metrics_middleware;
use crate::middleware::{LoggingLayer, RateLimitLayer, RequestIdLayer, ResponseCacheLayer};
use crate::state::AppState;

/// Creates a router with the given application state and metrics handle.
///
/// Layers, outermost first: request id, logging, HTTP metrics, rate limit,
/// response cache. Throttled requests therefore never reach the cache.
pub fn create_router_with_state(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(RequestIdLayer)
        .layer(LoggingLayer);

    // Router for metrics endpoint (different state)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    let app_router = Router::new()
        .route("/health", get(health_check))
        // Cache invalidation routes
        .route("/cache", delete(invalidate_all))
        .route("/cache/pattern", delete(invalidate_by_pattern))
        .route("/cache/route", delete(invalidate_route))
        // Sample business routes
        .route("/api/items", get(list_items))
        .route("/api/items/{id}", get(get_item).post(update_item))
        .route("/auth/login", post(login))
        .with_state(state.clone());

    let mut router = Router::new().merge(app_router).merge(metrics_router);

    if let Some(cache) = state.cache() {
        router = router.layer(ResponseCacheLayer::new(
            cache.clone(),
            state.cache_metrics(),
        ));
    }
    if state.settings().rate_limit.enabled {
        router = router.layer(RateLimitLayer::new(
            state.registry().clone(),
            state.classifier().clone(),
        ));
    }

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware_stack)
}

/// Runs the server until a shutdown signal arrives.
pub async fn run_server_with_state(
    addr: SocketAddr,
    state: AppState,
    prometheus_handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = create_router_with_state(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
