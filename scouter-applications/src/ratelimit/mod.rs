//! Fixed-window rate limiting
//!
//! Rules use the `limits` string syntax (`5/minute;10/hour`). Counters live in
//! a [`CounterStore`] injected at construction, so every process sharing the
//! same store enforces the same windows.

pub mod limiter;
pub mod rule;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use limiter::{FixedWindowRateLimiter, RateLimitPolicy, WindowStats};
pub use rule::{parse_many, Granularity, RateLimitItem};
pub use store::{CounterStore, CounterWindow, MemoryCounterStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCounterStore;
