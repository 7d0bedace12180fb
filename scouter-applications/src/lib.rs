//! Scouter Applications - authorization and abuse protection
//!
//! This crate holds the request-independent half of the access-control flow:
//! - role, tenant and token-purpose guards ([`auth`])
//! - fixed-window rate limiting over a pluggable counter store ([`ratelimit`])
//!
//! The web crate resolves callers from tokens and feeds them through these guards.

pub mod auth;
pub mod ratelimit;

pub use auth::{
    require_purpose, require_role, require_same_tenant, Role, RoleBearer, TenantScoped,
    TokenPurpose,
};
pub use ratelimit::{
    CounterStore, CounterWindow, FixedWindowRateLimiter, Granularity, MemoryCounterStore,
    RateLimitItem, RateLimitPolicy, WindowStats,
};

#[cfg(feature = "sqlite")]
pub use ratelimit::SqliteCounterStore;

use chrono::{DateTime, Utc};
use scouter_core::ScouterError;

/// Application-level error types
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        /// When the exhausted window resets
        reset_at: DateTime<Utc>,
    },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Core error: {0}")]
    Core(#[from] ScouterError),
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;

impl ApplicationError {
    /// Create an unauthorized error
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
