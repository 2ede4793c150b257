use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::state::SharedState;

pub mod auth;
mod error;
pub mod net;
mod observability;
pub mod password_reset;
mod system;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: crate::config::Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let (cors_origins, secure_cookies, session_days) = {
        let config = state.shared.config.read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.session_expiry_days(),
        )
    };

    // Sessions live in the same sqlite database as the accounts they
    // reference, so a single backup captures both.
    let session_store = SqliteStore::new(state.shared.store.sqlite_pool());
    session_store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to migrate session store: {e}"))?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(session_days)));

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/password/check", post(auth::check_password))
        .route("/auth/password/suggest", get(auth::suggest_password))
        .route(
            "/auth/password-reset/request",
            post(password_reset::request_reset),
        )
        .route(
            "/auth/password-reset/validate",
            get(password_reset::validate_token),
        )
        .route(
            "/auth/password-reset/complete",
            post(password_reset::complete_reset),
        )
        .route("/system/health/live", get(system::health_live))
        .route("/system/health/ready", get(system::health_ready))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::csrf_issue,
        ))
        .layer(session_layer)
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Ok(Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
        .layer(middleware::from_fn(observability::logging_middleware)))
}

/// Routes behind the session: the outer layer resolves the identity (401),
/// the inner one enforces the anti-forgery token on unsafe methods.
fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/status", put(users::set_status))
        .route("/users/{id}/unlock", post(users::unlock))
        .route("/system/status", get(system::get_status))
        .route("/system/config", get(system::get_config))
        .route("/system/config", put(system::update_config))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::csrf_validate))
        .route_layer(middleware::from_fn(auth::require_session))
}
