//! Authentication endpoints: login, session refresh, access gate and onboarding

use super::{
    employees::{hash_password, EmployeeBase, EmployeeOut},
    jwt::AuthError,
    AccessClaims,
};
use crate::{middleware::RATE_LIMIT_DETAIL, ApiError, ApiResult, AppState};
use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use scouter_applications::{require_purpose, require_same_tenant, TokenPurpose};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

/// Path the refresh cookie is scoped to
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

const ACCESS_GATE_DETAIL: &str = "Too many access attempts.";

/// Result of the bearer login check
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LoginStatus {
    /// Subject already linked to an employee
    Employee(EmployeeOut),
    /// Matched by email only; the access gate has to be passed first
    NeedsOnboarding {
        employee: EmployeeBase,
        needs_onboarding: bool,
    },
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Access token issued by password login or refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub employee: EmployeeOut,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessGateRequest {
    pub access_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessGateResponse {
    pub success: bool,
    pub message: String,
    pub employee: EmployeeOut,
    /// Present as `X-Onboarding-Token` when completing the profile
    pub onboarding_token: String,
}

/// One rule's window as seen by the caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttemptLimit {
    /// Rule, e.g. `5 per 1 minute`
    pub limit: String,
    pub remaining: u64,
    /// RFC 3339 reset time
    pub reset: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttemptsResponse {
    pub employee: String,
    pub limits: Vec<AttemptLimit>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OnboardingRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OnboardingResponse {
    pub success: bool,
    pub employee: EmployeeOut,
}

fn refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((state.config.auth.refresh_cookie_name.clone(), token))
        .http_only(true)
        .secure(state.secure_cookies())
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(time::Duration::seconds(state.tokens.refresh_ttl().num_seconds()))
        .build()
}

fn validate_username(username: &str) -> ApiResult<()> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !(3..=32).contains(&username.len()) || !valid_chars {
        return Err(ApiError::bad_request(
            "Username must be 3-32 characters of letters, digits, '.', '_' or '-'",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

/// Profile of the caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current employee", body = EmployeeOut),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    AccessClaims(claims): AccessClaims,
) -> ApiResult<Json<EmployeeOut>> {
    let employee = state
        .employees
        .find_by_subject(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(EmployeeOut::from(&employee)))
}

/// Check whether the caller is onboarded
///
/// Rate limited per token subject by the route layer.
#[utoipa::path(
    get,
    path = "/api/auth/login",
    tag = "Auth",
    responses(
        (status = 200, description = "Employee, or onboarding hint", body = LoginStatus),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not onboarded"),
        (status = 429, description = "Rate limit exceeded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn login_status(
    State(state): State<AppState>,
    AccessClaims(claims): AccessClaims,
) -> ApiResult<Json<LoginStatus>> {
    if let Some(employee) = state.employees.find_by_subject(&claims.sub).await? {
        return Ok(Json(LoginStatus::Employee(EmployeeOut::from(&employee))));
    }

    if let Some(email) = claims.email.as_deref() {
        if let Some(employee) = state.employees.find_by_email(email).await? {
            info!(subject = %claims.sub, "Login matched by email, onboarding required");
            return Ok(Json(LoginStatus::NeedsOnboarding {
                employee: EmployeeBase::from(&employee),
                needs_onboarding: true,
            }));
        }
    }

    Err(ApiError::not_found("User not onboarded"))
}

/// Username/password login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token; refresh cookie set", body = TokenResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn password_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let username = request.username.trim().to_lowercase();
    state
        .enforce_rate_limit(&state.policies.password_login, &username, RATE_LIMIT_DETAIL)
        .await?;

    let employee = state
        .employees
        .find_by_username(&username)
        .await?
        .filter(|employee| employee.verify_password(&request.password))
        .ok_or_else(|| {
            warn!(username = %username, "Failed password login");
            ApiError::unauthorized("Invalid username or password")
        })?;

    let access_token = state.tokens.issue_access(
        &employee.public_id,
        Some(&employee.email),
        &[employee.role],
    )?;
    let refresh_token = state.tokens.issue_refresh(&employee.public_id)?;

    info!(employee = %employee.public_id, "Password login succeeded");
    Ok((
        jar.add(refresh_cookie(&state, refresh_token)),
        Json(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.tokens.access_ttl().num_seconds(),
            employee: EmployeeOut::from(&employee),
        }),
    ))
}

/// Exchange the refresh cookie for a new access token and rotate the cookie
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "New access token; cookie rotated", body = TokenResponse),
        (status = 401, description = "Missing, invalid or expired refresh token"),
        (status = 403, description = "Token is not a refresh token")
    )
)]
pub async fn refresh_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let token = jar
        .get(&state.config.auth.refresh_cookie_name)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token"))?;

    let claims = state.tokens.decode(&token)?;
    require_purpose(claims.purpose, TokenPurpose::Refresh)?;

    let employee = state
        .employees
        .find_by_subject(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::Auth(AuthError::InvalidToken))?;

    let access_token = state.tokens.issue_access(
        &employee.public_id,
        Some(&employee.email),
        &[employee.role],
    )?;
    let refresh_token = state.tokens.issue_refresh(&employee.public_id)?;

    info!(employee = %employee.public_id, "Session refreshed");
    Ok((
        jar.add(refresh_cookie(&state, refresh_token)),
        Json(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.tokens.access_ttl().num_seconds(),
            employee: EmployeeOut::from(&employee),
        }),
    ))
}

/// Clear the refresh cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    // Sent even when the request carried no cookie
    let expired = Cookie::build((state.config.auth.refresh_cookie_name.clone(), ""))
        .http_only(true)
        .secure(state.secure_cookies())
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(time::Duration::ZERO)
        .build();

    (
        jar.add(expired),
        Json(MessageResponse {
            success: true,
            message: "Logged out".to_string(),
        }),
    )
}

/// Redeem a company access code
///
/// Links the caller's token subject to the employee invited under the token
/// email and returns an onboarding token for profile completion.
#[utoipa::path(
    post,
    path = "/api/auth/access-gate/verify",
    tag = "Access gate",
    request_body = AccessGateRequest,
    responses(
        (status = 200, description = "Access verified", body = AccessGateResponse),
        (status = 400, description = "Invalid or expired access code"),
        (status = 403, description = "Access code belongs to another company"),
        (status = 404, description = "User not found"),
        (status = 429, description = "Too many access attempts")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_access_code(
    State(state): State<AppState>,
    AccessClaims(claims): AccessClaims,
    Json(request): Json<AccessGateRequest>,
) -> ApiResult<Json<AccessGateResponse>> {
    state
        .enforce_rate_limit(&state.policies.access_gate, &claims.sub, ACCESS_GATE_DETAIL)
        .await?;

    let email = claims
        .email
        .as_deref()
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    let employee = state
        .employees
        .find_by_email(email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    let code = state
        .employees
        .find_active_access_code(request.access_code.trim(), employee.role)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired access code."))?;

    require_same_tenant(&employee, &code)
        .map_err(|_| ApiError::forbidden("Access code does not match user's company."))?;

    let employee = state
        .employees
        .link_subject(&employee.public_id, &claims.sub)
        .await?;
    let onboarding_token = state.tokens.issue_onboarding(&employee.email)?;

    info!(employee = %employee.public_id, subject = %claims.sub, "Access code verified");
    Ok(Json(AccessGateResponse {
        success: true,
        message: "Access verified".to_string(),
        employee: EmployeeOut::from(&employee),
        onboarding_token,
    }))
}

/// Remaining access-code attempts for the caller, without counting one
#[utoipa::path(
    get,
    path = "/api/auth/access-gate/attempts",
    tag = "Access gate",
    responses(
        (status = 200, description = "Per-rule window state", body = AttemptsResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn access_attempts(
    State(state): State<AppState>,
    AccessClaims(claims): AccessClaims,
) -> ApiResult<Json<AttemptsResponse>> {
    let policy = &state.policies.access_gate;
    let mut limits = Vec::with_capacity(policy.rules.len());

    for rule in &policy.rules {
        let stats = state
            .rate_limiter
            .get_window_stats(rule, &policy.scope, &claims.sub)
            .await?;
        limits.push(AttemptLimit {
            limit: rule.to_string(),
            remaining: stats.remaining,
            reset: stats.reset_at.to_rfc3339(),
        });
    }

    Ok(Json(AttemptsResponse {
        employee: claims.sub,
        limits,
    }))
}

/// Set username and password for an employee who passed the access gate
#[utoipa::path(
    post,
    path = "/api/auth/onboarding/complete",
    tag = "Onboarding",
    request_body = OnboardingRequest,
    params(("X-Onboarding-Token" = String, Header, description = "Token from access-gate verify")),
    responses(
        (status = 200, description = "Profile completed", body = OnboardingResponse),
        (status = 400, description = "Invalid username or password"),
        (status = 401, description = "Missing or invalid onboarding token"),
        (status = 403, description = "Token does not match the signup email"),
        (status = 409, description = "Employee not awaiting onboarding, or username taken")
    )
)]
pub async fn complete_onboarding(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OnboardingRequest>,
) -> ApiResult<Json<OnboardingResponse>> {
    let token = headers
        .get(state.config.auth.onboarding_header.as_str())
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing onboarding token"))?;

    let claims = state.tokens.decode(token)?;
    require_purpose(claims.purpose, TokenPurpose::Onboarding)?;

    let email = request.email.trim();
    if !claims.sub.eq_ignore_ascii_case(email) {
        warn!(token_subject = %claims.sub, email = %email, "Onboarding email mismatch");
        return Err(ApiError::forbidden(
            "Onboarding token does not match signup email",
        ));
    }

    let username = request.username.trim();
    validate_username(username)?;
    validate_password(&request.password)?;

    let employee = state
        .employees
        .find_by_email(email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    if !employee.is_onboarding {
        return Err(ApiError::Conflict(
            "Employee is not awaiting onboarding".to_string(),
        ));
    }

    let password_hash = hash_password(&request.password)?;
    let employee = state
        .employees
        .complete_profile(&employee.public_id, username, &password_hash)
        .await?;

    info!(employee = %employee.public_id, "Onboarding completed");
    Ok(Json(OnboardingResponse {
        success: true,
        employee: EmployeeOut::from(&employee),
    }))
}
