//! Shared application state

use crate::{
    auth::{employees::EmployeeStore, jwt::TokenCodec, verifier::TokenVerifier},
    WebError, WebResult,
};
use scouter_applications::{
    ApplicationResult, CounterStore, FixedWindowRateLimiter, MemoryCounterStore, RateLimitPolicy,
};
use scouter_core::{AuthMode, ScouterConfig};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "sqlite")]
use crate::auth::database::DatabaseEmployeeStore;
#[cfg(feature = "sqlite")]
use scouter_applications::SqliteCounterStore;

/// Counter scope for the bearer login check
pub const LOGIN_SCOPE: &str = "login";
/// Counter scope for access-code attempts
pub const ACCESS_GATE_SCOPE: &str = "rate-limit";
/// Counter scope for username/password login
pub const PASSWORD_LOGIN_SCOPE: &str = "password-login";

/// Parsed rate-limit policies, one per protected endpoint
#[derive(Debug, Clone)]
pub struct RateLimitPolicies {
    pub login: Arc<RateLimitPolicy>,
    pub access_gate: Arc<RateLimitPolicy>,
    pub password_login: Arc<RateLimitPolicy>,
}

impl RateLimitPolicies {
    pub fn from_config(config: &ScouterConfig) -> WebResult<Self> {
        let parse = |scope: &str, rules: &str| {
            RateLimitPolicy::parse(scope, rules)
                .map(Arc::new)
                .map_err(|e| WebError::Config(format!("rate_limit.{}: {}", scope, e)))
        };

        Ok(Self {
            login: parse(LOGIN_SCOPE, &config.rate_limit.login)?,
            access_gate: parse(ACCESS_GATE_SCOPE, &config.rate_limit.access_gate)?,
            password_login: parse(PASSWORD_LOGIN_SCOPE, &config.rate_limit.password_login)?,
        })
    }
}

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScouterConfig>,
    /// Local HS256 issuing (access in HMAC mode, refresh and onboarding always)
    pub tokens: Arc<TokenCodec>,
    /// Bearer access-token verification in the configured mode
    pub verifier: Arc<TokenVerifier>,
    pub rate_limiter: FixedWindowRateLimiter,
    pub policies: RateLimitPolicies,
    pub employees: EmployeeStore,
    /// Present when counters live in SQLite, for periodic purging
    #[cfg(feature = "sqlite")]
    pub sqlite_counters: Option<SqliteCounterStore>,
}

impl AppState {
    /// Build state from config, connecting to the database when one is configured
    pub async fn new(config: ScouterConfig) -> WebResult<Self> {
        config.validate()?;

        #[cfg(feature = "sqlite")]
        if let Some(url) = config.database.url.clone() {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&url)
                .await
                .map_err(|e| WebError::Database(format!("Failed to connect to {}: {}", url, e)))?;

            let employees = DatabaseEmployeeStore::new(pool.clone()).await?;
            let counters = SqliteCounterStore::new(pool).await?;

            info!(url = %url, "Using SQLite persistence");
            let mut state = Self::with_stores(
                config,
                EmployeeStore::database(employees),
                Arc::new(counters.clone()),
            )?;
            state.sqlite_counters = Some(counters);
            return Ok(state);
        }

        info!("No database configured, using in-memory stores");
        Self::with_stores(
            config,
            EmployeeStore::memory(),
            Arc::new(MemoryCounterStore::new()),
        )
    }

    /// Build state over explicit stores
    pub fn with_stores(
        config: ScouterConfig,
        employees: EmployeeStore,
        counters: Arc<dyn CounterStore>,
    ) -> WebResult<Self> {
        config.validate()?;

        let tokens = Arc::new(
            TokenCodec::from_config(&config.auth).map_err(|e| WebError::Config(e.to_string()))?,
        );
        let verifier = Arc::new(TokenVerifier::from_config(&config.auth, tokens.clone())?);
        let policies = RateLimitPolicies::from_config(&config)?;

        info!(
            auth_mode = %verifier.mode(),
            counter_store = counters.name(),
            rate_limiting = config.rate_limit.enabled,
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            tokens,
            verifier,
            rate_limiter: FixedWindowRateLimiter::new(counters),
            policies,
            employees,
            #[cfg(feature = "sqlite")]
            sqlite_counters: None,
        })
    }

    /// Whether the refresh cookie carries `Secure`; never in dev mode, which serves plain http
    pub fn secure_cookies(&self) -> bool {
        self.config.auth.secure_cookies && !self.config.server.dev_mode
    }

    /// Whether password login, refresh and logout are served
    pub fn local_sessions_enabled(&self) -> bool {
        self.config.auth.mode == AuthMode::Hmac
    }

    /// Count a hit against `policy` for `identity`, unless rate limiting is off
    pub async fn enforce_rate_limit(
        &self,
        policy: &RateLimitPolicy,
        identity: &str,
        detail: &str,
    ) -> ApplicationResult<()> {
        if !self.config.rate_limit.enabled {
            return Ok(());
        }
        self.rate_limiter.enforce(policy, identity, detail).await
    }

    /// Drop ended rate-limit windows from persistent storage
    pub async fn purge_expired_windows(&self) -> WebResult<u64> {
        #[cfg(feature = "sqlite")]
        if let Some(counters) = &self.sqlite_counters {
            return Ok(counters.purge_expired().await?);
        }
        Ok(0)
    }
}
