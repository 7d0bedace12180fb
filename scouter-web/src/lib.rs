//! Scouter Web Server
//!
//! HTTP surface of the Scouter recruiting backend: token authentication
//! (local HS256 or a remote key set), refresh-cookie sessions, the
//! access-code gate with per-identity rate limits, and company-scoped data
//! behind tenant and role guards.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use error::{ApiError, ApiResult};
pub use server::ScouterServer;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    Router,
};
use scouter_applications::ApplicationError;
use scouter_core::ScouterError;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    if state.config.server.dev_mode {
        // Any local frontend port
        cors = cors.allow_origin(AllowOrigin::mirror_request());
    } else {
        match HeaderValue::from_str(&state.config.server.frontend_url) {
            Ok(origin) => cors = cors.allow_origin(origin),
            Err(_) => warn!(
                frontend_url = %state.config.server.frontend_url,
                "Invalid frontend URL, no CORS origin allowed"
            ),
        }
    }

    if let Ok(header) = HeaderName::from_bytes(state.config.auth.onboarding_header.as_bytes()) {
        cors = cors.allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE, header]);
    }

    routes::all_routes(&state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Core error: {0}")]
    Core(#[from] ScouterError),

    #[error("Application error: {0}")]
    Application(#[from] ApplicationError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;
