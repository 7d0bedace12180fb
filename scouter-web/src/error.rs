//! HTTP error responses
//!
//! Every failure leaves the API as `{"detail": "..."}` with a matching status.

use crate::auth::jwt::AuthError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use scouter_applications::ApplicationError;
use scouter_core::ScouterError;
use serde_json::json;
use tracing::{error, warn};

/// Error returned by handlers and extractors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Too many requests: {detail}")]
    TooManyRequests {
        detail: String,
        reset_at: DateTime<Utc>,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized<S: Into<String>>(detail: S) -> Self {
        ApiError::Unauthorized(detail.into())
    }

    pub fn forbidden<S: Into<String>>(detail: S) -> Self {
        ApiError::Forbidden(detail.into())
    }

    pub fn not_found<S: Into<String>>(detail: S) -> Self {
        ApiError::NotFound(detail.into())
    }

    pub fn bad_request<S: Into<String>>(detail: S) -> Self {
        ApiError::BadRequest(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => e.status(),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Unauthorized { message } => ApiError::Unauthorized(message),
            ApplicationError::Forbidden { message } => ApiError::Forbidden(message),
            ApplicationError::NotFound { message } => ApiError::NotFound(message),
            ApplicationError::RateLimited { message, reset_at } => ApiError::TooManyRequests {
                detail: message,
                reset_at,
            },
            ApplicationError::Conflict { message } => ApiError::Conflict(message),
            ApplicationError::Validation { message } => ApiError::BadRequest(message),
            ApplicationError::Core(e) => e.into(),
        }
    }
}

impl From<ScouterError> for ApiError {
    fn from(err: ScouterError) -> Self {
        err.log();
        match err {
            ScouterError::Validation { message, .. } => ApiError::BadRequest(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(e) => e.into_response(),
            ApiError::TooManyRequests { detail, reset_at } => {
                let retry_after = (reset_at - Utc::now()).num_seconds().max(1);
                warn!(retry_after, "Request rate limited");

                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "detail": detail }))).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            ApiError::Internal(message) => {
                error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
            other => {
                let status = other.status();
                let detail = match other {
                    ApiError::Unauthorized(d)
                    | ApiError::Forbidden(d)
                    | ApiError::NotFound(d)
                    | ApiError::Conflict(d)
                    | ApiError::BadRequest(d) => d,
                    _ => status.canonical_reason().unwrap_or("Error").to_string(),
                };
                (status, Json(json!({ "detail": detail }))).into_response()
            }
        }
    }
}
