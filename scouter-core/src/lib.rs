//! Scouter Core - shared infrastructure for the Scouter backend
//!
//! Error types with context, logging setup and layered configuration used by
//! the application and web crates.

pub mod config;
pub mod error;
pub mod logging;

pub use self::config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
