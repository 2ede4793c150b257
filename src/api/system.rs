//! System API endpoints.
//!
//! Status, configuration read/update, and health probes. Configuration
//! access is admin-only through the permission table; the health probes are
//! public so orchestrators can poll them unauthenticated.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{Operation, Ownership, Permission, Resource, SessionUser};
use crate::config::Config;
use crate::entities::users::AccountStatus;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub struct HealthLiveResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthReadinessChecks {
    pub database: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthReadyResponse {
    pub ready: bool,
    pub checks: HealthReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub active_accounts: u64,
    pub locked_accounts: u64,
    pub suspended_accounts: u64,
    pub inactive_accounts: u64,
    pub tracked_origins: usize,
    pub live_csrf_tokens: usize,
}

/// `GET /api/system/status`
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<SessionUser>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    state.shared.permissions.require(
        Some(&user),
        Permission::new(Resource::SystemSettings, Operation::Read),
        Ownership::Any,
    )?;

    let store = &state.shared.store;
    let status = SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        active_accounts: count(store, AccountStatus::Active).await?,
        locked_accounts: count(store, AccountStatus::Locked).await?,
        suspended_accounts: count(store, AccountStatus::Suspended).await?,
        inactive_accounts: count(store, AccountStatus::Inactive).await?,
        tracked_origins: state.shared.origin_guard.tracked_origins(),
        live_csrf_tokens: state.shared.csrf.len(),
    };

    Ok(Json(ApiResponse::success(status)))
}

async fn count(store: &crate::db::Store, status: AccountStatus) -> Result<u64, ApiError> {
    store
        .count_users_with_status(status)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to count accounts: {e}")))
}

/// `GET /api/system/config`
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<SessionUser>,
) -> Result<Json<ApiResponse<Config>>, ApiError> {
    state.shared.permissions.require(
        Some(&user),
        Permission::new(Resource::SystemSettings, Operation::Read),
        Ownership::Any,
    )?;

    let config = state.shared.config.read().await.clone();
    Ok(Json(ApiResponse::success(config)))
}

/// `PUT /api/system/config`
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<SessionUser>,
    Json(new_config): Json<Config>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.shared.permissions.require(
        Some(&user),
        Permission::new(Resource::SystemSettings, Operation::Update),
        Ownership::Any,
    )?;

    new_config
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    new_config
        .save()
        .map_err(|e| ApiError::internal(format!("Failed to persist config: {e}")))?;

    *state.shared.config.write().await = new_config;

    tracing::info!(admin = %user.username, "Configuration updated");

    Ok(Json(ApiResponse::success(())))
}

/// `GET /api/system/health/live`
pub async fn health_live() -> impl IntoResponse {
    Json(ApiResponse::success(HealthLiveResponse { status: "alive" }))
}

/// `GET /api/system/health/ready`
pub async fn health_ready(State(state): State<Arc<AppState>>) -> Response {
    let db_ready = state.shared.store.ping().await.is_ok();

    let body = HealthReadyResponse {
        ready: db_ready,
        checks: HealthReadinessChecks { database: db_ready },
    };

    let status = if body.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ApiResponse::success(body))).into_response()
}
