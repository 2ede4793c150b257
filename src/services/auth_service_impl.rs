//! `SeaORM` implementation of the `AuthService` trait.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::lockout::{self, Gate};
use crate::auth::reset;
use crate::auth::{
    AuthError, LockoutPolicy, OriginGuard, PasswordHasher, PasswordStrengthValidator, ResetPolicy,
    SessionUser,
};
use crate::db::Store;
use crate::services::auth_service::{AuthService, RegisterRequest};
use crate::services::mailer::ResetMailer;

pub struct SeaOrmAuthService {
    store: Store,
    hasher: PasswordHasher,
    strength: Arc<PasswordStrengthValidator>,
    origin_guard: Arc<OriginGuard>,
    lockout: LockoutPolicy,
    reset: ResetPolicy,
    mailer: Arc<dyn ResetMailer>,
}

impl SeaOrmAuthService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        hasher: PasswordHasher,
        strength: Arc<PasswordStrengthValidator>,
        origin_guard: Arc<OriginGuard>,
        lockout: LockoutPolicy,
        reset: ResetPolicy,
        mailer: Arc<dyn ResetMailer>,
    ) -> Self {
        Self {
            store,
            hasher,
            strength,
            origin_guard,
            lockout,
            reset,
            mailer,
        }
    }

    /// Looks up the account snapshot and stored hash for a login identity.
    /// An identity containing `@` is treated as an email address.
    async fn lookup_auth_state(
        &self,
        identity: &str,
    ) -> Result<Option<(crate::db::User, String)>, AuthError> {
        if identity.contains('@') {
            let Some(user) = self.store.get_user_by_email(identity).await? else {
                return Ok(None);
            };
            Ok(self.store.get_auth_state(&user.username).await?)
        } else {
            Ok(self.store.get_auth_state(identity).await?)
        }
    }

    async fn issue_reset_token(&self, user: &crate::db::User) -> Result<(), AuthError> {
        let now = Utc::now();
        let token = reset::generate_token();
        let digest = reset::token_digest(&token);
        let expires = now + self.reset.token_ttl;

        self.store.set_reset_token(user.id, &digest, expires).await?;

        // Delivery is best-effort and must not delay the response.
        let mailer = Arc::clone(&self.mailer);
        let email = user.email.clone();
        let username = user.username.clone();
        tokio::spawn(async move {
            mailer.send_reset_token(&email, &username, &token).await;
        });

        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, request: RegisterRequest) -> Result<SessionUser, AuthError> {
        let report = self.strength.validate(&request.password);
        if !report.is_valid {
            return Err(AuthError::PasswordPolicy(report.errors));
        }

        if self
            .store
            .get_user_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict("Username is already taken".to_string()));
        }
        if self.store.get_user_by_email(&request.email).await?.is_some() {
            return Err(AuthError::Conflict(
                "Email address is already registered".to_string(),
            ));
        }

        let hash = self.hasher.hash_blocking(&request.password).await?;
        let user = self
            .store
            .create_user(
                &request.username,
                &request.email,
                &hash,
                crate::entities::users::Role::User,
            )
            .await?;

        info!(username = %user.username, "Account registered");

        Ok(SessionUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        })
    }

    async fn login(
        &self,
        identity: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<SessionUser, AuthError> {
        let now = Utc::now();

        let Some((user, stored_hash)) = self.lookup_auth_state(identity).await? else {
            // Unknown identity pays the same costs as a wrong password:
            // origin gate, a full hash verification, and a recorded failure.
            self.origin_guard.check_login(origin, now)?;
            self.hasher.verify_dummy_blocking(password).await;
            self.origin_guard.record_login_failure(origin, now);
            return Err(AuthError::InvalidCredentials);
        };

        // Account state is gated before the origin so a locked account
        // answers AccountLocked even when the origin is also throttled.
        let was_locked = match lockout::gate(user.status, user.locked_at, now, &self.lockout) {
            Gate::Deny(err) => return Err(err),
            Gate::Allow { clear_lock } => {
                if clear_lock {
                    self.store.clear_lockout(user.id, now).await?;
                }
                clear_lock
            }
        };

        self.origin_guard.check_login(origin, now)?;

        if self.hasher.verify_blocking(password, &stored_hash).await? {
            self.store.record_login_success(user.id, now).await?;
            info!(username = %user.username, "Login succeeded");

            return Ok(SessionUser {
                id: user.id,
                username: user.username,
                email: user.email,
                role: user.role,
            });
        }

        // A cleared lock restarts the counter at zero for this window.
        let prior_failures = if was_locked {
            0
        } else {
            user.failed_login_attempts
        };
        let escalation = lockout::register_failure(prior_failures, &self.lockout);

        self.store
            .record_login_failure(user.id, escalation.attempts, escalation.lock_now, now)
            .await?;
        self.origin_guard.record_login_failure(origin, now);

        if escalation.lock_now {
            warn!(
                username = %user.username,
                attempts = escalation.attempts,
                "Account locked after repeated failures"
            );
        }

        Err(AuthError::InvalidCredentials)
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UnauthorizedAccess)?;

        let Some((_, stored_hash)) = self.store.get_auth_state(&user.username).await? else {
            return Err(AuthError::UnauthorizedAccess);
        };

        if !self
            .hasher
            .verify_blocking(current_password, &stored_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let mut report = self.strength.validate(new_password);
        if new_password == current_password {
            report.errors.push(
                "New password must be different from the current password".to_string(),
            );
            report.is_valid = false;
        }
        if !report.is_valid {
            return Err(AuthError::PasswordPolicy(report.errors));
        }

        let hash = self.hasher.hash_blocking(new_password).await?;
        self.store.update_password(user.id, &hash).await?;

        info!(username = %user.username, "Password changed");
        Ok(())
    }

    async fn request_password_reset(&self, email: &str, origin: IpAddr) -> Result<(), AuthError> {
        let now = Utc::now();

        // The hourly cap is the only outcome allowed to differ.
        self.origin_guard.check_reset_request(origin, now)?;

        // One randomized delay covers every branch below, so response timing
        // does not separate known, unknown, and suppressed addresses.
        tokio::time::sleep(StdDuration::from_millis(self.reset.jitter_ms())).await;

        let Some(user) = self.store.get_user_by_email(email).await? else {
            return Ok(());
        };

        if let Some(expires) = user.password_reset_expires {
            if self.reset.within_resend_window(expires, now) {
                return Ok(());
            }
        }

        self.issue_reset_token(&user).await
    }

    async fn validate_reset_token(&self, token: &str) -> Result<bool, AuthError> {
        let digest = reset::token_digest(token);
        let user = self.store.find_by_reset_digest(&digest, Utc::now()).await?;
        Ok(user.is_some())
    }

    async fn complete_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let report = self.strength.validate(new_password);
        if !report.is_valid {
            return Err(AuthError::PasswordPolicy(report.errors));
        }

        let digest = reset::token_digest(token);
        let hash = self.hasher.hash_blocking(new_password).await?;

        // One conditional update; rows_affected enforces single use even
        // under concurrent consumers of the same token.
        if self.store.consume_reset(&digest, &hash, Utc::now()).await? {
            info!("Password reset completed");
            Ok(())
        } else {
            Err(AuthError::TokenExpiredOrInvalid)
        }
    }
}
