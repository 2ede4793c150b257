//! Domain service for authentication.
//!
//! Orchestrates registration, login, password changes, and the password-reset
//! lifecycle over the core engines in `crate::auth`. The trait is the seam
//! the HTTP layer depends on.

use std::net::IpAddr;

use crate::auth::{AuthError, SessionUser};

/// New-account request after transport-level shape validation.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Domain service trait for authentication flows.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when the username or email is taken
    /// and [`AuthError::PasswordPolicy`] listing every violated rule.
    async fn register(&self, request: RegisterRequest) -> Result<SessionUser, AuthError>;

    /// Authenticates by username or email address.
    ///
    /// Evaluation order: identity lookup, per-account gate, per-origin gate,
    /// then password verification, so a locked account answers
    /// [`AuthError::AccountLocked`] even when the presented password is
    /// correct.
    async fn login(
        &self,
        identity: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<SessionUser, AuthError>;

    /// Authenticated password change; the current password must verify and
    /// the new one must satisfy the strength policy.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Issues a reset token for the address, if one maps to an account.
    ///
    /// Succeeds identically for unknown addresses and suppressed reissues;
    /// the only distinguishable outcome is [`AuthError::RateLimitExceeded`]
    /// when the origin exceeds its hourly cap.
    async fn request_password_reset(&self, email: &str, origin: IpAddr) -> Result<(), AuthError>;

    /// True when the presented token matches a live, unexpired digest.
    async fn validate_reset_token(&self, token: &str) -> Result<bool, AuthError>;

    /// Consumes a reset token and installs the new password. The token is
    /// single-use; consuming it also unlocks and reactivates the account.
    async fn complete_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}
