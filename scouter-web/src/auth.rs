//! Authentication and authorization extractors

#[cfg(feature = "sqlite")]
pub mod database;
pub mod employees;
pub mod handlers;
pub mod jwks;
pub mod jwt;
pub mod verifier;


use crate::{ApiError, AppState};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use employees::EmployeeData;
use jwt::{AuthError, Claims};
use scouter_applications::{require_purpose, require_role, Role, TokenPurpose};
use tracing::{debug, warn};

/// Roles allowed to manage company staff
pub const STAFF_MANAGERS: &[Role] = &[Role::Admin, Role::Recruiter];

/// Bearer token from the `Authorization` header, if well formed
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingAuthHeader),
    }
}

/// Verified access-token claims of the caller
#[derive(Debug, Clone)]
pub struct AccessClaims(pub Claims);

impl<S> FromRequestParts<S> for AccessClaims
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(&parts.headers)?;
        let claims = state.verifier.verify(token).await?;

        require_purpose(claims.purpose, TokenPurpose::Access).map_err(|e| {
            warn!(subject = %claims.sub, purpose = %claims.purpose, "Wrong token purpose on bearer");
            e
        })?;

        debug!(subject = %claims.sub, "Caller authenticated");
        Ok(AccessClaims(claims))
    }
}

/// Stored employee behind the caller's access token
#[derive(Debug, Clone)]
pub struct CurrentEmployee(pub EmployeeData);

impl<S> FromRequestParts<S> for CurrentEmployee
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AccessClaims(claims) = AccessClaims::from_request_parts(parts, state).await?;
        let state = AppState::from_ref(state);

        let employee = state
            .employees
            .find_by_subject(&claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(subject = %claims.sub, "Token subject has no employee record");
                ApiError::forbidden("Employee not found")
            })?;

        Ok(CurrentEmployee(employee))
    }
}

/// Current employee holding an admin or recruiter role
#[derive(Debug, Clone)]
pub struct RequireRecruiter(pub EmployeeData);

impl<S> FromRequestParts<S> for RequireRecruiter
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentEmployee(employee) = CurrentEmployee::from_request_parts(parts, state).await?;
        Ok(RequireRecruiter(require_role(employee, STAFF_MANAGERS)?))
    }
}
