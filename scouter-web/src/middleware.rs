//! Per-route rate limiting

use crate::{auth::bearer_token, ApiError, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use scouter_applications::RateLimitPolicy;
use std::sync::Arc;
use tracing::debug;

/// Body detail of a 429 from a route-level limit
pub const RATE_LIMIT_DETAIL: &str = "Rate limit exceeded. Try again later.";

/// Identity used when a request carries no verifiable token
pub const ANONYMOUS: &str = "anonymous";

/// State of one rate-limited route
#[derive(Clone)]
pub struct RouteRateLimit {
    app: AppState,
    policy: Arc<RateLimitPolicy>,
}

impl RouteRateLimit {
    pub fn new(app: AppState, policy: Arc<RateLimitPolicy>) -> Self {
        Self { app, policy }
    }
}

/// Caller identity for rate limiting: the verified token subject, else `anonymous`
pub async fn caller_identity(state: &AppState, request: &Request) -> String {
    let Ok(token) = bearer_token(request.headers()) else {
        return ANONYMOUS.to_string();
    };

    match state.verifier.verify(token).await {
        Ok(claims) => claims.sub,
        Err(e) => {
            debug!("Rate limiting unverified caller as anonymous: {}", e);
            ANONYMOUS.to_string()
        }
    }
}

/// Reject with 429 once the caller exhausts the route's policy
pub async fn rate_limit_by_subject(
    State(limit): State<RouteRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if limit.app.config.rate_limit.enabled {
        let identity = caller_identity(&limit.app, &request).await;
        limit
            .app
            .enforce_rate_limit(&limit.policy, &identity, RATE_LIMIT_DETAIL)
            .await?;
    }

    Ok(next.run(request).await)
}
