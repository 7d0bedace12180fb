//! SQLite-backed counter store
//!
//! Every process pointing at the same database file shares the counters.
//! Increments run as one upsert statement, which SQLite serializes.

use super::store::{expiry_delta, CounterStore, CounterWindow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use scouter_core::{ScouterError, ScouterResult};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info};

const COMPONENT: &str = "ratelimit.sqlite";

const INCR_SQL: &str = r#"
    INSERT INTO rate_limit_counters (key, hits, expires_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
        hits = CASE
            WHEN rate_limit_counters.expires_at <= ?4 THEN excluded.hits
            ELSE rate_limit_counters.hits + excluded.hits
        END,
        expires_at = CASE
            WHEN rate_limit_counters.expires_at <= ?4 THEN excluded.expires_at
            ELSE rate_limit_counters.expires_at
        END
    RETURNING hits
"#;

/// Counter store over a shared SQLite database
#[derive(Debug, Clone)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    /// Wrap `pool`, creating the counter table if needed
    pub async fn new(pool: SqlitePool) -> ScouterResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        info!("SQLite rate-limit counter store ready");
        Ok(store)
    }

    async fn create_tables(&self) -> ScouterResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rate_limit_counters (
                key TEXT PRIMARY KEY,
                hits INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ScouterError::storage("Failed to create rate_limit_counters", COMPONENT, e))?;

        Ok(())
    }

    /// Delete windows that have already ended
    pub async fn purge_expired(&self) -> ScouterResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_counters WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| ScouterError::storage("Failed to purge counters", COMPONENT, e))?;

        debug!(removed = result.rows_affected(), "Purged expired rate-limit windows");
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn incr(&self, key: &str, expiry: Duration, amount: u64) -> ScouterResult<u64> {
        let now = Utc::now();
        let expires_at = now + expiry_delta(expiry)?;

        let hits: i64 = sqlx::query_scalar(INCR_SQL)
            .bind(key)
            .bind(amount as i64)
            .bind(expires_at.timestamp_millis())
            .bind(now.timestamp_millis())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ScouterError::storage("Failed to increment counter", COMPONENT, e))?;

        Ok(hits.max(0) as u64)
    }

    async fn window(&self, key: &str) -> ScouterResult<Option<CounterWindow>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT hits, expires_at FROM rate_limit_counters WHERE key = ?1 AND expires_at > ?2",
        )
        .bind(key)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ScouterError::storage("Failed to read counter", COMPONENT, e))?;

        Ok(row.and_then(|(hits, expires_at)| {
            Some(CounterWindow {
                hits: hits.max(0) as u64,
                expires_at: Utc.timestamp_millis_opt(expires_at).single()?,
            })
        }))
    }

    async fn clear(&self, key: &str) -> ScouterResult<()> {
        sqlx::query("DELETE FROM rate_limit_counters WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| ScouterError::storage("Failed to clear counter", COMPONENT, e))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
