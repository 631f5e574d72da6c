//! Error responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use portcullis_core::PolicyClass;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    /// Recurso no encontrado
    NotFound(String),

    /// Parametros invalidos
    BadRequest(String),

    /// Credenciales rechazadas
    Unauthorized(String),

    /// Cliente sobre su limite para `policy`; `retry_after` en segundos
    Throttled {
        policy: PolicyClass,
        retry_after: u64,
    },

    /// Error interno
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let mut policy_name = None;
        let (status, error, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized", msg),
            AppError::Throttled {
                policy,
                retry_after: secs,
            } => {
                retry_after = Some(secs);
                policy_name = Some(policy.as_str());
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too Many Requests",
                    format!(
                        "Too many requests for {} endpoints, retry in {secs} seconds",
                        policy.as_str()
                    ),
                )
            },
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                msg,
            ),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
            policy: policy_name,
            retry_after,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
