//! Administrative user management.
//!
//! Every handler runs behind the session middleware, so the caller identity
//! is always present; the permission table decides what it may do. A regular
//! user can read their own record, everything else needs `users.manage`.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use std::sync::Arc;

use crate::auth::{Operation, Ownership, Permission, Resource, SessionUser};
use crate::entities::users::AccountStatus;

use super::types::{MessageResponse, SetStatusPayload, UserDto};
use super::{ApiError, ApiResponse, AppState};

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    state.shared.permissions.require(
        Some(&user),
        Permission::new(Resource::Users, Operation::Manage),
        Ownership::Any,
    )?;

    let users = state
        .shared
        .store
        .list_users()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list users: {e}")))?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let grant = state.shared.permissions.require(
        Some(&user),
        Permission::new(Resource::Users, Operation::Read),
        Ownership::Required,
    )?;

    if grant.must_own && id != user.id {
        return Err(ApiError::Auth(crate::auth::AuthError::ForbiddenAccess));
    }

    let target = state
        .shared
        .store
        .get_user_by_id(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load user: {e}")))?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    Ok(Json(ApiResponse::success(UserDto::from(target))))
}

/// PUT /users/{id}/status
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i32>,
    Json(payload): Json<SetStatusPayload>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.permissions.require(
        Some(&user),
        Permission::new(Resource::Users, Operation::Manage),
        Ownership::Any,
    )?;

    if payload.status == AccountStatus::Locked {
        return Err(ApiError::validation(
            "Accounts lock automatically; set 'suspended' to bar access",
        ));
    }
    if id == user.id && payload.status != AccountStatus::Active {
        return Err(ApiError::validation(
            "Administrators cannot disable their own account",
        ));
    }

    let updated = state
        .shared
        .store
        .set_account_status(id, payload.status)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update status: {e}")))?;

    if !updated {
        return Err(ApiError::not_found("User", id));
    }

    tracing::info!(admin = %user.username, target = id, status = %payload.status, "Account status changed");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Account status updated",
    ))))
}

/// POST /users/{id}/unlock
pub async fn unlock(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.permissions.require(
        Some(&user),
        Permission::new(Resource::Users, Operation::Manage),
        Ownership::Any,
    )?;

    let target = state
        .shared
        .store
        .get_user_by_id(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load user: {e}")))?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    state
        .shared
        .store
        .clear_lockout(target.id, Utc::now())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to clear lockout: {e}")))?;

    tracing::info!(admin = %user.username, target = %target.username, "Account unlocked");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Account unlocked",
    ))))
}
