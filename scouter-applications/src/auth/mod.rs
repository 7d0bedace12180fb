//! Authorization primitives
//!
//! Roles and token purposes, plus the guard functions every handler runs
//! before touching tenant data.

pub mod guard;
pub mod identity;

pub use guard::{require_purpose, require_role, require_same_tenant, RoleBearer, TenantScoped};
pub use identity::{Role, TokenPurpose};
