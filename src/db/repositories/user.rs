use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::users;
use crate::entities::users::{AccountStatus, Role};

/// User data returned from the repository (without the password hash).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub failed_login_attempts: i32,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub last_password_reset: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            status: model.status,
            failed_login_attempts: model.failed_login_attempts,
            locked_at: parse_ts(model.locked_at.as_deref()),
            last_login: parse_ts(model.last_login.as_deref()),
            password_reset_expires: parse_ts(model.password_reset_expires.as_deref()),
            last_password_reset: model.last_password_reset,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn parse_ts(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.to_utc())
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let now = Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_lowercase()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role),
            status: Set(AccountStatus::Active),
            failed_login_attempts: Set(0),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Email lookups are case-insensitive because addresses are stored
    /// lowercased.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    /// Lookup for the login path: the snapshot plus the stored hash, so the
    /// caller can gate on account state before paying for verification.
    pub async fn get_auth_state(&self, username: &str) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for authentication")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let models = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(models.into_iter().map(User::from).collect())
    }

    pub async fn count_with_status(&self, status: AccountStatus) -> Result<u64> {
        users::Entity::find()
            .filter(users::Column::Status.eq(status))
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    /// Success resets the failure counter, clears any lock reference and
    /// stamps the last login. Column-targeted so concurrent writers to other
    /// fields are never clobbered.
    pub async fn record_login_success(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        let stamp = now.to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(users::Column::Status, Expr::value(AccountStatus::Active))
            .col_expr(users::Column::LockedAt, Expr::value(Option::<String>::None))
            .col_expr(users::Column::LastLogin, Expr::value(stamp.clone()))
            .col_expr(users::Column::UpdatedAt, Expr::value(stamp))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record login success")?;

        Ok(())
    }

    /// Writes the escalated counter; when the threshold tripped the row is
    /// moved to `locked` with the lockout reference time.
    pub async fn record_login_failure(
        &self,
        id: i32,
        attempts: i32,
        lock_now: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let stamp = now.to_rfc3339();

        let mut update = users::Entity::update_many()
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(attempts))
            .col_expr(users::Column::UpdatedAt, Expr::value(stamp.clone()));

        if lock_now {
            update = update
                .col_expr(users::Column::Status, Expr::value(AccountStatus::Locked))
                .col_expr(users::Column::LockedAt, Expr::value(stamp));
        }

        update
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record login failure")?;

        Ok(())
    }

    /// Restores a row whose lock window has elapsed before the current
    /// attempt is evaluated.
    pub async fn clear_lockout(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        users::Entity::update_many()
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(users::Column::Status, Expr::value(AccountStatus::Active))
            .col_expr(users::Column::LockedAt, Expr::value(Option::<String>::None))
            .col_expr(users::Column::UpdatedAt, Expr::value(now.to_rfc3339()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to clear lockout")?;

        Ok(())
    }

    /// Administrative status change. Restoring `active` also zeroes the
    /// failure counter and drops the lock reference.
    pub async fn set_status(&self, id: i32, status: AccountStatus) -> Result<bool> {
        let stamp = Utc::now().to_rfc3339();

        let mut update = users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value(status))
            .col_expr(users::Column::UpdatedAt, Expr::value(stamp));

        if status == AccountStatus::Active {
            update = update
                .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
                .col_expr(users::Column::LockedAt, Expr::value(Option::<String>::None));
        }

        let result = update
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to set account status")?;

        Ok(result.rows_affected == 1)
    }

    /// Stores the reset-token digest and expiry, replacing any outstanding
    /// token so at most one is live per user.
    pub async fn set_reset_token(
        &self,
        id: i32,
        digest: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        users::Entity::update_many()
            .col_expr(
                users::Column::PasswordResetToken,
                Expr::value(digest.to_string()),
            )
            .col_expr(
                users::Column::PasswordResetExpires,
                Expr::value(expires.to_rfc3339()),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now().to_rfc3339()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to store reset token")?;

        Ok(())
    }

    /// Reads back the user holding a live token with the given digest.
    pub async fn find_by_reset_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::PasswordResetToken.eq(digest))
            .filter(users::Column::PasswordResetExpires.gt(now.to_rfc3339()))
            .one(&self.conn)
            .await
            .context("Failed to query user by reset token")?;

        Ok(user.map(User::from))
    }

    /// Single conditional update keyed on the stored digest: sets the new
    /// hash, clears the token pair, zeroes the failure counter and forces
    /// the account active. `rows_affected == 1` is the single-use
    /// guarantee; a replayed token matches nothing.
    pub async fn consume_reset(
        &self,
        digest: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let stamp = now.to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(
                users::Column::PasswordHash,
                Expr::value(new_hash.to_string()),
            )
            .col_expr(
                users::Column::PasswordResetToken,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                users::Column::PasswordResetExpires,
                Expr::value(Option::<String>::None),
            )
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(users::Column::LockedAt, Expr::value(Option::<String>::None))
            .col_expr(users::Column::Status, Expr::value(AccountStatus::Active))
            .col_expr(
                users::Column::LastPasswordReset,
                Expr::value(stamp.clone()),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(stamp.clone()))
            .filter(users::Column::PasswordResetToken.eq(digest))
            .filter(users::Column::PasswordResetExpires.gt(stamp))
            .exec(&self.conn)
            .await
            .context("Failed to consume reset token")?;

        Ok(result.rows_affected == 1)
    }

    /// Authenticated password change.
    pub async fn update_password(&self, id: i32, new_hash: &str) -> Result<()> {
        let stamp = Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(
                users::Column::PasswordHash,
                Expr::value(new_hash.to_string()),
            )
            .col_expr(
                users::Column::LastPasswordReset,
                Expr::value(stamp.clone()),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(stamp))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    /// Marks active accounts whose last login predates the cutoff as
    /// inactive. Idempotent; accounts that never logged in are skipped.
    pub async fn mark_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value(AccountStatus::Inactive))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now().to_rfc3339()))
            .filter(users::Column::Status.eq(AccountStatus::Active))
            .filter(users::Column::LastLogin.is_not_null())
            .filter(users::Column::LastLogin.lt(cutoff.to_rfc3339()))
            .exec(&self.conn)
            .await
            .context("Failed to mark inactive accounts")?;

        Ok(result.rows_affected)
    }
}
