//! HTTP request handlers outside the auth flow

pub mod companies;
pub mod health;
pub mod types;

pub use companies::*;
pub use health::*;
pub use types::*;
