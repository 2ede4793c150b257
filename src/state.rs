use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::{
    CsrfStore, LockoutPolicy, OriginGuard, PasswordHasher, PasswordStrengthValidator,
    PermissionTable, ResetPolicy,
};
use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, LogMailer, ResetMailer, SeaOrmAuthService};

/// Process-wide components, constructed once at startup and injected into
/// every handler. Nothing here is a global; tests build their own instance
/// against an in-memory database.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub hasher: PasswordHasher,

    pub strength: Arc<PasswordStrengthValidator>,

    pub origin_guard: Arc<OriginGuard>,

    pub csrf: Arc<CsrfStore>,

    pub permissions: Arc<PermissionTable>,

    pub auth_service: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_mailer(config, Arc::new(LogMailer)).await
    }

    pub async fn with_mailer(
        config: Config,
        mailer: Arc<dyn ResetMailer>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let hasher = PasswordHasher::new(&config.security.argon2)?;
        let strength = Arc::new(PasswordStrengthValidator::new(&config.security.password));

        let lockout = LockoutPolicy::new(
            config.security.lockout.max_attempts,
            config.security.lockout.lock_minutes,
        );
        let origin_guard = Arc::new(OriginGuard::new(
            lockout,
            config.security.reset.origin_hourly_cap,
        ));

        let reset = ResetPolicy::new(
            config.security.reset.token_ttl_minutes,
            config.security.reset.resend_window_minutes,
            config.security.reset.origin_hourly_cap,
            config.security.reset.delay_min_ms,
            config.security.reset.delay_max_ms,
        );

        let csrf = Arc::new(CsrfStore::new(config.security.csrf.token_ttl_hours));
        let permissions = Arc::new(PermissionTable::standard());

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            hasher.clone(),
            strength.clone(),
            origin_guard.clone(),
            lockout,
            reset,
            mailer,
        )) as Arc<dyn AuthService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            hasher,
            strength,
            origin_guard,
            csrf,
            permissions,
            auth_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
