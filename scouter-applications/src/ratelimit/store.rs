//! Counter storage for rate-limit windows

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scouter_core::{ScouterError, ScouterResult};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared hit counters with per-key expiry
///
/// `incr` must be atomic per key: two concurrent callers must observe two
/// distinct counts.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `amount` to `key` and return the new count. A missing or expired
    /// key starts a fresh window that expires `expiry` from now.
    async fn incr(&self, key: &str, expiry: Duration, amount: u64) -> ScouterResult<u64>;

    /// Count and end of the active window for `key`, read together
    async fn window(&self, key: &str) -> ScouterResult<Option<CounterWindow>>;

    /// Current count, 0 when missing or expired
    async fn get(&self, key: &str) -> ScouterResult<u64> {
        Ok(self.window(key).await?.map_or(0, |window| window.hits))
    }

    /// Drop the counter for `key`
    async fn clear(&self, key: &str) -> ScouterResult<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// One active fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterWindow {
    pub hits: u64,
    pub expires_at: DateTime<Utc>,
}

impl CounterWindow {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Entries kept before expired windows are swept on write
const SWEEP_THRESHOLD: usize = 1024;

/// In-process counter store (single instance deployments and tests)
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, CounterWindow>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys, expired or not
    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.lock().await.is_empty()
    }
}

pub(crate) fn expiry_delta(expiry: Duration) -> ScouterResult<chrono::Duration> {
    chrono::Duration::from_std(expiry).map_err(|e| {
        ScouterError::validation(
            format!("Window length out of range: {}", e),
            "expiry",
            "ratelimit",
        )
    })
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, expiry: Duration, amount: u64) -> ScouterResult<u64> {
        let now = Utc::now();
        let delta = expiry_delta(expiry)?;
        let mut windows = self.windows.lock().await;

        if windows.len() >= SWEEP_THRESHOLD {
            let before = windows.len();
            windows.retain(|_, window| !window.is_expired(now));
            debug!(removed = before - windows.len(), "Swept expired rate-limit windows");
        }

        let window = windows.entry(key.to_string()).or_insert(CounterWindow {
            hits: 0,
            expires_at: now + delta,
        });

        if window.is_expired(now) {
            *window = CounterWindow {
                hits: 0,
                expires_at: now + delta,
            };
        }

        window.hits += amount;
        Ok(window.hits)
    }

    async fn window(&self, key: &str) -> ScouterResult<Option<CounterWindow>> {
        let now = Utc::now();
        let windows = self.windows.lock().await;
        Ok(windows
            .get(key)
            .filter(|window| !window.is_expired(now))
            .copied())
    }

    async fn clear(&self, key: &str) -> ScouterResult<()> {
        self.windows.lock().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_incr_counts_within_window() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);

        assert_eq!(store.incr("k", window, 1).await.unwrap(), 1);
        assert_eq!(store.incr("k", window, 1).await.unwrap(), 2);
        assert_eq!(store.incr("k", window, 3).await.unwrap(), 5);
        assert_eq!(store.get("k").await.unwrap(), 5);
        assert_eq!(store.get("other").await.unwrap(), 0);

        let window = store.window("k").await.unwrap().unwrap();
        assert_eq!(window.hits, 5);
        assert!(window.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_expired_window_restarts() {
        let store = MemoryCounterStore::new();
        let short = Duration::from_millis(20);

        store.incr("k", short, 4).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap(), 0);
        assert!(store.window("k").await.unwrap().is_none());
        assert_eq!(store.incr("k", short, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_distinct() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.incr("shared", Duration::from_secs(60), 1).await.unwrap()
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryCounterStore::new();
        store.incr("k", Duration::from_secs(60), 1).await.unwrap();
        store.clear("k").await.unwrap();
        assert!(store.is_empty().await);
    }
}
