use thiserror::Error;

/// Errors surfaced by the authentication core.
///
/// Everything except `Internal` is a recoverable, caller-visible outcome.
/// Messages that touch account existence stay generic so responses cannot be
/// used to enumerate accounts; lockout and rate-limit variants carry the
/// remaining time because that feedback is explicitly allowed.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked. Try again in {remaining_minutes} minutes")]
    AccountLocked { remaining_minutes: i64 },

    #[error("Account suspended. Contact an administrator")]
    AccountSuspended,

    #[error("Account inactive. Reset your password to reactivate")]
    AccountInactive,

    #[error("Authentication required")]
    UnauthorizedAccess,

    #[error("Permission denied")]
    ForbiddenAccess,

    #[error("CSRF token missing or invalid")]
    CsrfValidationFailed,

    #[error("Token is invalid or has expired")]
    TokenExpiredOrInvalid,

    #[error("Too many requests. Try again in {retry_minutes} minutes")]
    RateLimitExceeded { retry_minutes: i64 },

    #[error("Password does not meet requirements")]
    PasswordPolicy(Vec<String>),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
