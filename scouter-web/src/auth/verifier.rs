//! Bearer token verification in the configured mode

use super::jwks::JwksVerifier;
use super::jwt::{AuthError, Claims, TokenCodec};
use scouter_core::{AuthConfig, AuthMode, ScouterError, ScouterResult};
use std::sync::Arc;

/// Verifies access tokens presented as `Authorization: Bearer`
#[derive(Debug)]
pub enum TokenVerifier {
    /// Locally issued HS256 tokens
    Hmac(Arc<TokenCodec>),
    /// Identity provider RS256 tokens
    Jwks(JwksVerifier),
}

impl TokenVerifier {
    pub fn from_config(config: &AuthConfig, codec: Arc<TokenCodec>) -> ScouterResult<Self> {
        match config.mode {
            AuthMode::Hmac => Ok(TokenVerifier::Hmac(codec)),
            AuthMode::Jwks => JwksVerifier::from_config(&config.jwks)
                .map(TokenVerifier::Jwks)
                .ok_or_else(|| {
                    ScouterError::config(
                        "auth.jwks.domain and auth.jwks.audience are required in jwks mode",
                        "auth",
                    )
                }),
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            TokenVerifier::Hmac(_) => AuthMode::Hmac,
            TokenVerifier::Jwks(_) => AuthMode::Jwks,
        }
    }

    /// Validate signature and expiry. Callers check the purpose.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        match self {
            TokenVerifier::Hmac(codec) => codec.decode(token),
            TokenVerifier::Jwks(jwks) => jwks.verify(token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scouter_applications::TokenPurpose;

    #[tokio::test]
    async fn test_hmac_mode_verifies_codec_tokens() {
        let config = AuthConfig {
            secret_key: "verifier-secret".to_string(),
            ..Default::default()
        };
        let codec = Arc::new(TokenCodec::from_config(&config).unwrap());
        let verifier = TokenVerifier::from_config(&config, codec.clone()).unwrap();
        assert_eq!(verifier.mode(), AuthMode::Hmac);

        let token = codec.issue_refresh("emp-9").unwrap();
        let claims = verifier.verify(&token).await.unwrap();
        // verify does not look at the purpose
        assert_eq!(claims.purpose, TokenPurpose::Refresh);
    }

    #[test]
    fn test_jwks_mode_requires_domain() {
        let config = AuthConfig {
            secret_key: "s".to_string(),
            mode: AuthMode::Jwks,
            ..Default::default()
        };
        let codec = Arc::new(TokenCodec::from_config(&config).unwrap());
        assert!(TokenVerifier::from_config(&config, codec).is_err());
    }
}
