use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::users::{AccountStatus, Role};

pub mod migrator;
pub mod repositories;

pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// The underlying sqlx pool, shared with the session store so sessions
    /// and users live in the same database file.
    #[must_use]
    pub fn sqlite_pool(&self) -> sea_orm::sqlx::SqlitePool {
        self.conn.get_sqlite_connection_pool().clone()
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        self.user_repo()
            .create(username, email, password_hash, role)
            .await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_auth_state(&self, username: &str) -> Result<Option<(User, String)>> {
        self.user_repo().get_auth_state(username).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn count_users_with_status(&self, status: AccountStatus) -> Result<u64> {
        self.user_repo().count_with_status(status).await
    }

    pub async fn record_login_success(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        self.user_repo().record_login_success(id, now).await
    }

    pub async fn record_login_failure(
        &self,
        id: i32,
        attempts: i32,
        lock_now: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.user_repo()
            .record_login_failure(id, attempts, lock_now, now)
            .await
    }

    pub async fn clear_lockout(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        self.user_repo().clear_lockout(id, now).await
    }

    pub async fn set_account_status(&self, id: i32, status: AccountStatus) -> Result<bool> {
        self.user_repo().set_status(id, status).await
    }

    pub async fn set_reset_token(
        &self,
        id: i32,
        digest: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        self.user_repo().set_reset_token(id, digest, expires).await
    }

    pub async fn find_by_reset_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        self.user_repo().find_by_reset_digest(digest, now).await
    }

    pub async fn consume_reset(
        &self,
        digest: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.user_repo().consume_reset(digest, new_hash, now).await
    }

    pub async fn update_password(&self, id: i32, new_hash: &str) -> Result<()> {
        self.user_repo().update_password(id, new_hash).await
    }

    pub async fn mark_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.user_repo().mark_inactive(cutoff).await
    }
}
