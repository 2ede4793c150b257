//! Password-reset HTTP surface.
//!
//! Issuance responses are identical for unknown addresses, fresh issues, and
//! suppressed reissues; the service applies the shared randomized delay.
//! Only the per-origin cap surfaces a distinct outcome (429).

use axum::{Json, extract::Query, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use super::net::ClientOrigin;
use super::types::{MessageResponse, ResetCompletePayload, ResetRequestPayload};
use super::{ApiError, ApiResponse, AppState};

const GENERIC_RESPONSE: &str =
    "If that email address is registered, a password reset link has been sent";

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub token: String,
}

/// POST /auth/password-reset/request
pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    origin: ClientOrigin,
    Json(payload): Json<ResetRequestPayload>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .auth_service
        .request_password_reset(&payload.email, origin.0)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        GENERIC_RESPONSE,
    ))))
}

/// GET /auth/password-reset/validate?token=...
///
/// Lets the reset form reject a dead link before the user types a password.
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidateQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let valid = state
        .shared
        .auth_service
        .validate_reset_token(&query.token)
        .await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "valid": valid }),
    )))
}

/// POST /auth/password-reset/complete
pub async fn complete_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetCompletePayload>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .auth_service
        .complete_password_reset(&payload.token, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password has been reset. You can now log in",
    ))))
}
