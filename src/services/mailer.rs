//! Email dispatch collaborator.
//!
//! Delivery is external to this subsystem, so it is modeled as a trait and
//! the shipped implementation just writes the reset link to the log. Sends
//! are best-effort and must never block or fail token issuance.

use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait ResetMailer: Send + Sync {
    /// Delivers a password-reset token to the given address. The raw token
    /// exists only on this path; the store holds its digest.
    async fn send_reset_token(&self, email: &str, username: &str, token: &str);
}

/// Development mailer that logs the reset link instead of sending mail.
pub struct LogMailer;

#[async_trait]
impl ResetMailer for LogMailer {
    async fn send_reset_token(&self, email: &str, username: &str, token: &str) {
        info!(
            email = %email,
            username = %username,
            "Password reset requested: /reset-password?token={token}"
        );
    }
}
