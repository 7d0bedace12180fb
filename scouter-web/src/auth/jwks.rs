//! RS256 verification against a remote key set

use super::jwt::{decode_error, AuthError, Claims};
use jsonwebtoken::{
    decode, decode_header,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use scouter_core::JwksConfig;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

struct CachedKeySet {
    keys: JwkSet,
    fetched_at: Instant,
}

enum CacheLookup {
    Hit(Jwk),
    /// Fresh set without the requested `kid`
    Unknown { fetched_at: Instant },
    /// Nothing cached, or the cached set outlived its TTL
    Stale,
}

/// Verifies identity provider tokens using keys from its JWKS endpoint
///
/// Fetched key sets are reused for `cache_ttl`. A `kid` missing from a
/// fresh cached set triggers a refetch, which picks up rotated keys; such
/// refetches happen at most once per `refetch_interval`.
pub struct JwksVerifier {
    client: reqwest::Client,
    jwks_url: String,
    audience: String,
    issuer: String,
    cache_ttl: Duration,
    refetch_interval: Duration,
    cache: RwLock<Option<CachedKeySet>>,
    fetch_lock: Mutex<()>,
}

/// Minimum gap between refetches forced by an unknown `kid`
pub const DEFAULT_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

impl std::fmt::Debug for JwksVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksVerifier")
            .field("jwks_url", &self.jwks_url)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("cache_ttl", &self.cache_ttl)
            .field("refetch_interval", &self.refetch_interval)
            .finish_non_exhaustive()
    }
}

impl JwksVerifier {
    pub fn new(
        jwks_url: impl Into<String>,
        audience: impl Into<String>,
        issuer: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_url: jwks_url.into(),
            audience: audience.into(),
            issuer: issuer.into(),
            cache_ttl,
            refetch_interval: DEFAULT_REFETCH_INTERVAL,
            cache: RwLock::new(None),
            fetch_lock: Mutex::new(()),
        }
    }

    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = interval;
        self
    }

    /// Build from config; `None` when domain or audience is missing
    pub fn from_config(config: &JwksConfig) -> Option<Self> {
        Some(
            Self::new(
                config.jwks_url()?,
                config.audience.clone()?,
                config.issuer()?,
                Duration::from_secs(config.cache_ttl_secs),
            )
            .with_refetch_interval(Duration::from_secs(config.refetch_interval_secs)),
        )
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!("Unreadable token header: {}", e);
            AuthError::MalformedHeader
        })?;
        let kid = header.kid.ok_or(AuthError::MalformedHeader)?;

        let jwk = self.find_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            warn!(kid = %kid, "Unusable key in key set: {}", e);
            AuthError::KeyNotFound
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(decode_error)?
            .claims;

        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    async fn find_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(found) = self.from_cache(kid).await {
            return found;
        }

        // One fetch at a time; waiters reuse whatever it cached
        let _fetching = self.fetch_lock.lock().await;
        if let Some(found) = self.from_cache(kid).await {
            return found;
        }

        let keys = self.fetch().await?;
        let found = keys.find(kid).cloned();

        if !self.cache_ttl.is_zero() {
            *self.cache.write().await = Some(CachedKeySet {
                keys,
                fetched_at: Instant::now(),
            });
        }

        found.ok_or_else(|| {
            warn!(kid = %kid, "No key in key set matches token kid");
            AuthError::KeyNotFound
        })
    }

    /// `None` when the key set has to be fetched
    async fn from_cache(&self, kid: &str) -> Option<Result<Jwk, AuthError>> {
        match self.cached_key(kid).await {
            CacheLookup::Hit(jwk) => Some(Ok(jwk)),
            CacheLookup::Unknown { fetched_at } if fetched_at.elapsed() < self.refetch_interval => {
                debug!(kid = %kid, "Unknown kid, key set refreshed too recently to refetch");
                Some(Err(AuthError::KeyNotFound))
            }
            CacheLookup::Unknown { .. } | CacheLookup::Stale => None,
        }
    }

    async fn cached_key(&self, kid: &str) -> CacheLookup {
        let cache = self.cache.read().await;
        let Some(cached) = cache.as_ref() else {
            return CacheLookup::Stale;
        };
        if cached.fetched_at.elapsed() >= self.cache_ttl {
            return CacheLookup::Stale;
        }
        match cached.keys.find(kid) {
            Some(jwk) => CacheLookup::Hit(jwk.clone()),
            None => CacheLookup::Unknown {
                fetched_at: cached.fetched_at,
            },
        }
    }

    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        debug!(url = %self.jwks_url, "Fetching key set");
        let keys = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;

        info!(url = %self.jwks_url, keys = keys.keys.len(), "Fetched key set");
        Ok(keys)
    }
}
