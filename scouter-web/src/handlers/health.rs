//! Health check handlers

use super::types::{HealthResponse, RootResponse};
use axum::response::Json;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    summary = "Health check",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Root banner
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "API is running!".to_string(),
    })
}
