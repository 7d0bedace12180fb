//! Configuration management
//!
//! Layered loading: built-in defaults, an optional TOML file, then
//! `SCOUTER__SECTION__KEY` environment variables.

use crate::error::{ErrorContext, ScouterError, ScouterResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SCOUTER";

/// Top-level backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScouterConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS
    pub frontend_url: String,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            frontend_url: "http://localhost:5173".to_string(),
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How bearer access tokens are verified
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// HS256 tokens signed with `auth.secret_key`
    #[default]
    Hmac,
    /// RS256 tokens from a remote identity provider, checked against its key set
    Jwks,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Hmac => write!(f, "hmac"),
            AuthMode::Jwks => write!(f, "jwks"),
        }
    }
}

/// Remote key set settings (JWKS mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwksConfig {
    /// Identity provider domain, e.g. `tenant.eu.auth0.com`
    pub domain: Option<String>,
    /// Expected `aud` claim
    pub audience: Option<String>,
    /// Seconds a fetched key set is reused; 0 fetches on every verification
    pub cache_ttl_secs: u64,
    /// Minimum seconds between refetches forced by an unknown `kid`
    pub refetch_interval_secs: u64,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            domain: None,
            audience: None,
            cache_ttl_secs: 300,
            refetch_interval_secs: 30,
        }
    }
}

impl JwksConfig {
    /// Well-known key set URL derived from the domain
    pub fn jwks_url(&self) -> Option<String> {
        self.domain
            .as_ref()
            .map(|domain| format!("{}/.well-known/jwks.json", base_url(domain)))
    }

    /// Expected `iss` claim derived from the domain
    pub fn issuer(&self) -> Option<String> {
        self.domain
            .as_ref()
            .map(|domain| format!("{}/", base_url(domain)))
    }
}

fn base_url(domain: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}

/// Token and cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// HMAC secret for locally issued tokens; required in every mode
    pub secret_key: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub onboarding_token_ttl_minutes: i64,
    pub refresh_cookie_name: String,
    /// Header carrying the onboarding token on signup completion
    pub onboarding_header: String,
    /// Mark the refresh cookie `Secure`
    pub secure_cookies: bool,
    pub jwks: JwksConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Hmac,
            secret_key: String::new(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 7,
            onboarding_token_ttl_minutes: 15,
            refresh_cookie_name: "scouter_refresh".to_string(),
            onboarding_header: "x-onboarding-token".to_string(),
            secure_cookies: true,
            jwks: JwksConfig::default(),
        }
    }
}

/// Rate-limit rules in `limits` syntax, e.g. `5/minute;10/hour`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Bearer login status check, keyed by token subject
    pub login: String,
    /// Access-code attempts, keyed by token subject
    pub access_gate: String,
    /// Username/password login, keyed by username
    pub password_login: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login: "5/minute".to_string(),
            access_gate: "5/minute;10/hour".to_string(),
            password_login: "5/minute".to_string(),
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL; in-memory stores are used when unset
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

impl ScouterConfig {
    /// Load defaults, then `path` (if any), then `SCOUTER__*` environment variables
    pub fn load(path: Option<&Path>) -> ScouterResult<Self> {
        let defaults = config::Config::try_from(&ScouterConfig::default())
            .map_err(|e| config_load_error("Failed to build default config", e))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: ScouterConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| config_load_error("Failed to load configuration", e))?;

        Ok(loaded)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(content: &str) -> ScouterResult<Self> {
        toml::from_str(content).map_err(|e| ScouterError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Validate settings that would otherwise fail on the first request
    pub fn validate(&self) -> ScouterResult<()> {
        if self.auth.secret_key.trim().is_empty() {
            return Err(ScouterError::Config {
                message: "auth.secret_key must be set".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set SCOUTER__AUTH__SECRET_KEY or auth.secret_key"),
            });
        }

        if self.auth.access_token_ttl_minutes <= 0
            || self.auth.refresh_token_ttl_days <= 0
            || self.auth.onboarding_token_ttl_minutes <= 0
        {
            return Err(ScouterError::config(
                "Token TTLs must be greater than 0",
                "config",
            ));
        }

        if self.auth.mode == AuthMode::Jwks
            && (self.auth.jwks.domain.is_none() || self.auth.jwks.audience.is_none())
        {
            return Err(ScouterError::Config {
                message: "auth.jwks.domain and auth.jwks.audience are required in jwks mode"
                    .to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set SCOUTER__AUTH__JWKS__DOMAIN and SCOUTER__AUTH__JWKS__AUDIENCE"),
            });
        }

        for (name, rules) in [
            ("rate_limit.login", &self.rate_limit.login),
            ("rate_limit.access_gate", &self.rate_limit.access_gate),
            ("rate_limit.password_login", &self.rate_limit.password_login),
        ] {
            if rules.trim().is_empty() {
                return Err(ScouterError::validation(
                    "Rate limit rules must not be empty",
                    name,
                    "config",
                ));
            }
        }

        Ok(())
    }
}

fn config_load_error(message: &str, e: config::ConfigError) -> ScouterError {
    ScouterError::Config {
        message: format!("{}: {}", message, e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("config")
            .with_operation("load")
            .with_suggestion("Check if the config file exists and is valid TOML"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> ScouterConfig {
        let mut config = ScouterConfig::default();
        config.auth.secret_key = "test-secret".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = ScouterConfig::default();
        assert_eq!(config.server.address(), "127.0.0.1:8000");
        assert_eq!(config.auth.mode, AuthMode::Hmac);
        assert_eq!(config.auth.refresh_token_ttl_days, 7);
        assert_eq!(config.rate_limit.access_gate, "5/minute;10/hour");
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_validate_requires_secret() {
        let config = ScouterConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("secret_key"));

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_jwks_requires_domain_and_audience() {
        let mut config = valid_config();
        config.auth.mode = AuthMode::Jwks;
        assert!(config.validate().is_err());

        config.auth.jwks.domain = Some("scouter.eu.auth0.com".to_string());
        config.auth.jwks.audience = Some("https://api.scouter.dev".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jwks_urls() {
        let jwks = JwksConfig {
            domain: Some("scouter.eu.auth0.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            jwks.jwks_url().as_deref(),
            Some("https://scouter.eu.auth0.com/.well-known/jwks.json")
        );
        assert_eq!(jwks.issuer().as_deref(), Some("https://scouter.eu.auth0.com/"));

        let local = JwksConfig {
            domain: Some("http://127.0.0.1:9999/".to_string()),
            ..Default::default()
        };
        assert_eq!(
            local.jwks_url().as_deref(),
            Some("http://127.0.0.1:9999/.well-known/jwks.json")
        );
    }

    #[test]
    fn test_from_toml_str_partial() {
        let config = ScouterConfig::from_toml_str(
            r#"
            [auth]
            secret_key = "from-toml"
            mode = "jwks"

            [auth.jwks]
            domain = "idp.example.com"
            audience = "scouter"
            cache_ttl_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.secret_key, "from-toml");
        assert_eq!(config.auth.mode, AuthMode::Jwks);
        assert_eq!(config.auth.jwks.cache_ttl_secs, 0);
        assert_eq!(config.auth.jwks.refetch_interval_secs, 30);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[auth]\nsecret_key = \"file-secret\"\n\n[rate_limit]\nlogin = \"3/minute\""
        )
        .unwrap();

        let config = ScouterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.auth.secret_key, "file-secret");
        assert_eq!(config.rate_limit.login, "3/minute");
        assert_eq!(config.rate_limit.password_login, "5/minute");
    }
}
