//! Authentication and access-control core.
//!
//! Everything in this module is independent of the HTTP layer: the engines
//! operate on snapshots and injected timestamps so they can be exercised
//! directly in unit tests. The axum surface in `crate::api` and the
//! orchestration in `crate::services` are the only consumers.

pub mod csrf;
pub mod error;
pub mod hasher;
pub mod lockout;
pub mod rbac;
pub mod reset;
pub mod session;
pub mod strength;

pub use csrf::CsrfStore;
pub use error::AuthError;
pub use hasher::PasswordHasher;
pub use lockout::{Gate, LockoutPolicy, OriginGuard};
pub use rbac::{Operation, Ownership, Permission, PermissionTable, Resource};
pub use reset::ResetPolicy;
pub use session::SessionUser;
pub use strength::{PasswordStrengthValidator, StrengthLabel, StrengthReport};
