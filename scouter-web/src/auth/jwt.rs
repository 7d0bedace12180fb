//! Token claims and local HS256 issuing

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use scouter_applications::{Role, RoleBearer, TokenPurpose};
use scouter_core::AuthConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

/// Decoded token payload
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: employee public id, signup email, or identity provider user id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role names; unknown names are ignored by role checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub purpose: TokenPurpose,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new<S: Into<String>>(subject: S, purpose: TokenPurpose, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.into(),
            email: None,
            roles: None,
            purpose,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_roles(mut self, roles: &[Role]) -> Self {
        self.roles = Some(roles.iter().map(|r| r.as_str().to_string()).collect());
        self
    }

    /// Expired once `now >= exp`
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

impl RoleBearer for Claims {
    fn roles(&self) -> Option<Vec<Role>> {
        self.roles
            .as_ref()
            .map(|roles| roles.iter().filter_map(|r| r.parse().ok()).collect())
    }

    fn principal(&self) -> &str {
        &self.sub
    }
}

/// Token authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Malformed token header")]
    MalformedHeader,
    #[error("Signing key not found")]
    KeyNotFound,
    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),
    #[error("Token creation failed")]
    TokenCreation,
    #[error("Signing secret is not configured")]
    MissingSigningKey,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::KeySetUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::TokenCreation | AuthError::MissingSigningKey => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn detail(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "Not authenticated",
            AuthError::InvalidToken => "Invalid token",
            AuthError::TokenExpired => "Token has expired",
            AuthError::MalformedHeader => "Invalid token header",
            AuthError::KeyNotFound => "Appropriate key not found",
            AuthError::KeySetUnavailable(_) => "Identity provider keys unavailable",
            AuthError::TokenCreation => "Failed to create authentication token",
            AuthError::MissingSigningKey => "Token signing is not configured",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(json!({ "detail": self.detail() }))).into_response();
        if self.status() == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// Map a jsonwebtoken failure onto the error reported to callers
pub(crate) fn decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    debug!("Token verification failed: {}", e);
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    }
}

/// Issues and verifies HS256 tokens signed with the configured secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    onboarding_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("onboarding_ttl", &self.onboarding_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(
        secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
        onboarding_ttl: Duration,
    ) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSigningKey);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
            onboarding_ttl,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(
            config.secret_key.trim().as_bytes(),
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
            Duration::minutes(config.onboarding_token_ttl_minutes),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an arbitrary claim set
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            warn!("Failed to encode token: {}", e);
            AuthError::TokenCreation
        })
    }

    pub fn issue(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        self.encode(&Claims::new(subject, purpose, ttl))
    }

    pub fn issue_access(
        &self,
        subject: &str,
        email: Option<&str>,
        roles: &[Role],
    ) -> Result<String, AuthError> {
        let mut claims = Claims::new(subject, TokenPurpose::Access, self.access_ttl).with_roles(roles);
        if let Some(email) = email {
            claims = claims.with_email(email);
        }
        self.encode(&claims)
    }

    pub fn issue_refresh(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, TokenPurpose::Refresh, self.refresh_ttl)
    }

    /// Onboarding tokens are bound to the invited employee's email
    pub fn issue_onboarding(&self, email: &str) -> Result<String, AuthError> {
        self.issue(email, TokenPurpose::Onboarding, self.onboarding_ttl)
    }

    /// Check signature and expiry; the purpose is left to the caller
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(decode_error)?
            .claims;

        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            b"unit-test-secret",
            Duration::minutes(60),
            Duration::days(7),
            Duration::minutes(15),
        )
        .unwrap()
    }

    #[test]
    fn test_access_token_round_trip() {
        let codec = codec();
        let token = codec
            .issue_access("emp-123", Some("ana@acme.io"), &[Role::Recruiter])
            .unwrap();

        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.sub, "emp-123");
        assert_eq!(claims.email.as_deref(), Some("ana@acme.io"));
        assert_eq!(claims.purpose, TokenPurpose::Access);
        assert_eq!(claims.roles(), Some(vec![Role::Recruiter]));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_purposes_are_carried() {
        let codec = codec();
        let refresh = codec.decode(&codec.issue_refresh("emp-1").unwrap()).unwrap();
        assert_eq!(refresh.purpose, TokenPurpose::Refresh);
        assert_eq!(refresh.exp - refresh.iat, Duration::days(7).num_seconds());

        let onboarding = codec
            .decode(&codec.issue_onboarding("new@acme.io").unwrap())
            .unwrap();
        assert_eq!(onboarding.purpose, TokenPurpose::Onboarding);
        assert_eq!(onboarding.sub, "new@acme.io");
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let codec = codec();
        let token = codec
            .issue("emp-1", TokenPurpose::Access, Duration::zero())
            .unwrap();
        assert!(matches!(codec.decode(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_and_garbage_rejected() {
        let token = codec().issue_refresh("emp-1").unwrap();
        let other = TokenCodec::new(
            b"another-secret",
            Duration::minutes(1),
            Duration::days(1),
            Duration::minutes(1),
        )
        .unwrap();

        assert!(matches!(other.decode(&token), Err(AuthError::InvalidToken)));
        assert!(matches!(codec().decode("not-a-token"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_missing_purpose_decodes_as_access() {
        let claims: Claims =
            serde_json::from_str(r#"{"sub":"auth0|abc","exp":4102444800}"#).unwrap();
        assert_eq!(claims.purpose, TokenPurpose::Access);
        assert_eq!(claims.roles(), None);
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = AuthConfig::default();
        assert!(matches!(
            TokenCodec::from_config(&config),
            Err(AuthError::MissingSigningKey)
        ));
    }
}
