//! Fixed-window limiter

use super::rule::{parse_many, RateLimitItem};
use super::store::CounterStore;
use crate::{ApplicationError, ApplicationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read-only view of one rule's current window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    /// When the window ends (or would end, if none is active)
    pub reset_at: DateTime<Utc>,
    /// Hits left before the rule rejects
    pub remaining: u64,
}

/// Named set of rules applied together to one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Key prefix separating this endpoint's counters from others
    pub scope: String,
    pub rules: Vec<RateLimitItem>,
}

impl RateLimitPolicy {
    pub fn new<S: Into<String>>(scope: S, rules: Vec<RateLimitItem>) -> Self {
        Self {
            scope: scope.into(),
            rules,
        }
    }

    /// Build from a rule string such as `5/minute;10/hour`
    pub fn parse<S: Into<String>>(scope: S, rules: &str) -> ApplicationResult<Self> {
        Ok(Self::new(scope, parse_many(rules)?))
    }
}

/// Fixed-window rate limiter over an injected counter store
///
/// A window starts on the first hit for a key and lasts for the rule's
/// period. Rejected hits still count, so hammering a closed window never
/// reopens it early.
#[derive(Clone)]
pub struct FixedWindowRateLimiter {
    store: Arc<dyn CounterStore>,
}

impl std::fmt::Debug for FixedWindowRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowRateLimiter")
            .field("store", &self.store.name())
            .finish()
    }
}

impl FixedWindowRateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Count one hit; `false` once the rule's amount is exceeded in this window
    pub async fn hit(
        &self,
        item: &RateLimitItem,
        scope: &str,
        identity: &str,
    ) -> ApplicationResult<bool> {
        let key = item.key_for(scope, identity);
        let count = self.store.incr(&key, item.window(), 1).await?;
        let allowed = count <= item.amount;

        debug!(key = %key, count, limit = item.amount, allowed, "Rate limit hit");
        Ok(allowed)
    }

    /// Whether a hit would currently be allowed, without counting one
    pub async fn test(
        &self,
        item: &RateLimitItem,
        scope: &str,
        identity: &str,
    ) -> ApplicationResult<bool> {
        let count = self.store.get(&item.key_for(scope, identity)).await?;
        Ok(count < item.amount)
    }

    /// Hit every rule in order; the first rejecting rule ends the request
    pub async fn hit_all(
        &self,
        items: &[RateLimitItem],
        scope: &str,
        identity: &str,
        detail: &str,
    ) -> ApplicationResult<()> {
        for item in items {
            if !self.hit(item, scope, identity).await? {
                let stats = self.get_window_stats(item, scope, identity).await?;
                warn!(
                    scope,
                    identity,
                    limit = %item,
                    reset_at = %stats.reset_at,
                    "Rate limit exceeded"
                );
                return Err(ApplicationError::RateLimited {
                    message: detail.to_string(),
                    reset_at: stats.reset_at,
                });
            }
        }
        Ok(())
    }

    /// Apply a whole policy for `identity`
    pub async fn enforce(
        &self,
        policy: &RateLimitPolicy,
        identity: &str,
        detail: &str,
    ) -> ApplicationResult<()> {
        self.hit_all(&policy.rules, &policy.scope, identity, detail)
            .await
    }

    /// Reset time and remaining allowance, without counting a hit
    pub async fn get_window_stats(
        &self,
        item: &RateLimitItem,
        scope: &str,
        identity: &str,
    ) -> ApplicationResult<WindowStats> {
        let key = item.key_for(scope, identity);
        match self.store.window(&key).await? {
            Some(window) => Ok(WindowStats {
                reset_at: window.expires_at,
                remaining: item.amount.saturating_sub(window.hits),
            }),
            None => Ok(WindowStats {
                reset_at: Utc::now() + super::store::expiry_delta(item.window())?,
                remaining: item.amount,
            }),
        }
    }

    /// Forget the current window for `identity`
    pub async fn clear(
        &self,
        item: &RateLimitItem,
        scope: &str,
        identity: &str,
    ) -> ApplicationResult<()> {
        self.store.clear(&item.key_for(scope, identity)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{CounterWindow, MemoryCounterStore};
    use scouter_core::ScouterResult;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn limiter() -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::new(Arc::new(MemoryCounterStore::new()))
    }

    #[tokio::test]
    async fn test_five_per_minute_rejects_sixth() {
        let limiter = limiter();
        let rule = RateLimitItem::per_minute(5);

        for attempt in 1..=5 {
            assert!(
                limiter.hit(&rule, "login", "auth0|alice").await.unwrap(),
                "attempt {} should pass",
                attempt
            );
        }
        assert!(!limiter.hit(&rule, "login", "auth0|alice").await.unwrap());

        // other identities and scopes are unaffected
        assert!(limiter.hit(&rule, "login", "auth0|bob").await.unwrap());
        assert!(limiter.hit(&rule, "rate-limit", "auth0|alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_window_stats_after_three_hits() {
        let limiter = limiter();
        let rule = RateLimitItem::per_minute(5);

        for _ in 0..3 {
            limiter.hit(&rule, "rate-limit", "auth0|alice").await.unwrap();
        }

        let before = limiter.get_window_stats(&rule, "rate-limit", "auth0|alice").await.unwrap();
        assert_eq!(before.remaining, 2);
        assert!(before.reset_at > Utc::now());

        // introspection does not consume allowance
        let again = limiter.get_window_stats(&rule, "rate-limit", "auth0|alice").await.unwrap();
        assert_eq!(again, before);
    }

    /// Store whose window moves on every read, like a rollover between calls
    struct RollingStore {
        reads: AtomicU64,
        base: DateTime<Utc>,
    }

    #[async_trait::async_trait]
    impl CounterStore for RollingStore {
        async fn incr(&self, _: &str, _: std::time::Duration, _: u64) -> ScouterResult<u64> {
            Ok(1)
        }

        async fn window(&self, _: &str) -> ScouterResult<Option<CounterWindow>> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(CounterWindow {
                hits: read,
                expires_at: self.base + chrono::Duration::minutes(read as i64),
            }))
        }

        async fn clear(&self, _: &str) -> ScouterResult<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "rolling"
        }
    }

    #[tokio::test]
    async fn test_window_stats_read_one_window() {
        let base = Utc::now();
        let store = Arc::new(RollingStore {
            reads: AtomicU64::new(0),
            base,
        });
        let limiter = FixedWindowRateLimiter::new(store.clone());
        let rule = RateLimitItem::per_minute(5);

        let stats = limiter.get_window_stats(&rule, "rate-limit", "erin").await.unwrap();
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(stats.remaining, 4);
        assert_eq!(stats.reset_at, base + chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_window_stats_without_hits() {
        let limiter = limiter();
        let rule = RateLimitItem::per_hour(10);

        let stats = limiter.get_window_stats(&rule, "rate-limit", "nobody").await.unwrap();
        assert_eq!(stats.remaining, 10);
        assert!(stats.reset_at > Utc::now() + chrono::Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_rules_are_conjunctive() {
        let limiter = limiter();
        let rules = vec![RateLimitItem::per_minute(5), RateLimitItem::per_hour(3)];

        for _ in 0..3 {
            limiter.hit_all(&rules, "rate-limit", "carol", "Too many access attempts.").await.unwrap();
        }

        let err = limiter
            .hit_all(&rules, "rate-limit", "carol", "Too many access attempts.")
            .await
            .unwrap_err();
        match err {
            ApplicationError::RateLimited { message, reset_at } => {
                assert_eq!(message, "Too many access attempts.");
                assert!(reset_at > Utc::now() + chrono::Duration::minutes(59));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_test_does_not_count() {
        let limiter = limiter();
        let rule = RateLimitItem::per_minute(1);

        assert!(limiter.test(&rule, "s", "id").await.unwrap());
        assert!(limiter.test(&rule, "s", "id").await.unwrap());
        assert!(limiter.hit(&rule, "s", "id").await.unwrap());
        assert!(!limiter.test(&rule, "s", "id").await.unwrap());

        limiter.clear(&rule, "s", "id").await.unwrap();
        assert!(limiter.test(&rule, "s", "id").await.unwrap());
    }

    #[tokio::test]
    async fn test_policy_parse_and_enforce() {
        let limiter = limiter();
        let policy = RateLimitPolicy::parse("login", "2/minute").unwrap();

        limiter.enforce(&policy, "dave", "slow down").await.unwrap();
        limiter.enforce(&policy, "dave", "slow down").await.unwrap();
        assert!(matches!(
            limiter.enforce(&policy, "dave", "slow down").await,
            Err(ApplicationError::RateLimited { .. })
        ));

        assert!(RateLimitPolicy::parse("login", "often").is_err());
    }
}
