//! Cache invalidation endpoint handlers.

use axum::{
    extract::{Query, State},
    http::Method,
    response::Json,
};
use glob::Pattern;
use portcullis_core::cache::{InvalidationResult, ResponseCache};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Response para operaciones de invalidación.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    /// Número de entries invalidadas (best effort).
    pub invalidated: usize,
    /// Patrones aplicados.
    pub patterns: Vec<String>,
    /// Mensaje descriptivo.
    pub message: String,
}

impl InvalidateResponse {
    fn from_result(result: InvalidationResult, message: String) -> Self {
        Self {
            invalidated: result.count,
            patterns: result.patterns,
            message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PatternQuery {
    pub pattern: String,
}

/// Request body para invalidar una ruta.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub method: String,
    pub path: String,
}

fn cache(state: &AppState) -> Result<&ResponseCache, AppError> {
    state
        .cache()
        .ok_or_else(|| AppError::Internal("Cache is not enabled".to_string()))
}

/// DELETE /cache
/// Invalida toda la cache.
#[instrument(skip_all)]
pub async fn invalidate_all(
    State(state): State<AppState>,
) -> Result<Json<InvalidateResponse>, AppError> {
    let result = cache(&state)?.invalidate_pattern("*").await;
    let message = format!("Invalidated all {} cache entries", result.count);

    Ok(Json(InvalidateResponse::from_result(result, message)))
}

/// DELETE /cache/pattern?pattern=...
/// Invalida las entries cuya key coincide con un patron glob.
#[instrument(skip_all, fields(pattern = %query.pattern))]
pub async fn invalidate_by_pattern(
    State(state): State<AppState>,
    Query(query): Query<PatternQuery>,
) -> Result<Json<InvalidateResponse>, AppError> {
    let cache = cache(&state)?;

    if query.pattern.trim().is_empty() {
        return Err(AppError::BadRequest("pattern must not be empty".to_string()));
    }
    Pattern::new(&query.pattern).map_err(|e| {
        AppError::BadRequest(format!("invalid pattern '{}': {}", query.pattern, e))
    })?;

    let result = cache.invalidate_pattern(&query.pattern).await;
    let message = format!(
        "Invalidated {} cache entries matching '{}'",
        result.count, query.pattern
    );

    Ok(Json(InvalidateResponse::from_result(result, message)))
}

/// DELETE /cache/route
/// Invalida todas las variantes de method + path.
#[instrument(skip_all, fields(method = %body.method, path = %body.path))]
pub async fn invalidate_route(
    State(state): State<AppState>,
    Json(body): Json<RouteRequest>,
) -> Result<Json<InvalidateResponse>, AppError> {
    let cache = cache(&state)?;

    let method = Method::from_bytes(body.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| AppError::BadRequest(format!("invalid method '{}'", body.method)))?;
    if !body.path.starts_with('/') {
        return Err(AppError::BadRequest(format!(
            "path '{}' must start with '/'",
            body.path
        )));
    }

    let result = cache.invalidate_route(&method, &body.path).await;
    let message = format!(
        "Invalidated {} cache entries for {} {}",
        result.count, method, body.path
    );

    Ok(Json(InvalidateResponse::from_result(result, message)))
}
