//! OpenAPI document for the Scouter API

use crate::{
    auth::{
        employees::{CompanyOut, EmployeeBase, EmployeeOut},
        handlers::{
            AccessGateRequest, AccessGateResponse, AttemptLimit, AttemptsResponse, LoginRequest,
            LoginStatus, MessageResponse, OnboardingRequest, OnboardingResponse, TokenResponse,
        },
    },
    handlers::HealthResponse,
};
use axum::Json;
use scouter_applications::Role;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scouter API",
        version = "0.1.0",
        description = "Multi-tenant recruiting backend: authentication, access gate and company data",
        license(name = "MIT OR Apache-2.0")
    ),
    paths(
        crate::handlers::health_check,
        crate::auth::handlers::get_me,
        crate::auth::handlers::login_status,
        crate::auth::handlers::password_login,
        crate::auth::handlers::refresh_session,
        crate::auth::handlers::logout,
        crate::auth::handlers::verify_access_code,
        crate::auth::handlers::access_attempts,
        crate::auth::handlers::complete_onboarding,
        crate::handlers::get_company,
        crate::handlers::list_company_employees,
    ),
    components(
        schemas(
            HealthResponse,
            Role,
            CompanyOut,
            EmployeeOut,
            EmployeeBase,
            LoginStatus,
            LoginRequest,
            TokenResponse,
            MessageResponse,
            AccessGateRequest,
            AccessGateResponse,
            AttemptLimit,
            AttemptsResponse,
            OnboardingRequest,
            OnboardingResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Login, session refresh and profile"),
        (name = "Access gate", description = "Access-code redemption for invited employees"),
        (name = "Onboarding", description = "Profile completion after the access gate"),
        (name = "Companies", description = "Tenant-scoped company data"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Bearer token security scheme
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Scouter API");
        assert!(openapi.paths.paths.contains_key("/api/auth/access-gate/verify"));
        assert!(openapi.paths.paths.contains_key("/api/companies/{company_id}/employees"));

        let json = openapi.to_pretty_json().unwrap();
        assert!(json.contains("bearer_auth"));
    }
}
