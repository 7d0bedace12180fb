//! Route definitions for the Scouter API

use crate::{
    auth::handlers as auth,
    handlers,
    middleware::{rate_limit_by_subject, RouteRateLimit},
    openapi, AppState,
};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

/// Routes mounted under `/api`
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(openapi::openapi_json))
        .nest("/auth", auth_routes(state))
        .nest("/companies", company_routes())
}

/// Authentication routes
///
/// Password login, refresh and logout only exist when access tokens are
/// issued locally.
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let login_limit = RouteRateLimit::new(state.clone(), state.policies.login.clone());

    let mut router = Router::new()
        .route("/me", get(auth::get_me))
        .route(
            "/login",
            get(auth::login_status).route_layer(from_fn_with_state(login_limit, rate_limit_by_subject)),
        )
        .route("/access-gate/verify", post(auth::verify_access_code))
        .route("/access-gate/attempts", get(auth::access_attempts))
        .route("/onboarding/complete", post(auth::complete_onboarding));

    if state.local_sessions_enabled() {
        router = router
            .route("/login", post(auth::password_login))
            .route("/refresh", post(auth::refresh_session))
            .route("/logout", post(auth::logout));
    }

    router
}

/// Tenant-scoped company routes
pub fn company_routes() -> Router<AppState> {
    Router::new()
        .route("/{company_id}", get(handlers::get_company))
        .route("/{company_id}/employees", get(handlers::list_company_employees))
}

/// All routes combined
pub fn all_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes(state))
}
