//! Sample login route; its path puts it in the sensitive rate-limit class.

use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
}

/// POST /auth/login
pub async fn login(Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>, AppError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    Ok(Json(LoginResponse {
        username: request.username,
        token: Uuid::new_v4().simple().to_string(),
    }))
}
