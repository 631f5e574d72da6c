//! Liveness endpoint.

use axum::{extract::State, response::Json};
use portcullis_core::StoreMetrics;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Store counters; absent when the response cache is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheHealth>,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    #[serde(flatten)]
    pub counters: StoreMetrics,
    pub hit_rate: f64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.cache().map(|cache| {
        let counters = cache.metrics();
        CacheHealth {
            hit_rate: counters.hit_rate(),
            counters,
        }
    });

    Json(HealthResponse {
        status: "UP",
        version: crate::version(),
        cache,
    })
}
