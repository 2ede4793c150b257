use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use uuid::Uuid;

use crate::auth::AuthError;

use super::ApiResponse;

#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),

    ValidationError(String),

    NotFound(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Auth(err) => write!(f, "{err}"),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Auth(err) => return auth_error_response(err),
            ApiError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, ApiResponse::<()>::error(msg))
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiResponse::<()>::error(msg)),
            ApiError::InternalError(msg) => return internal_error_response(&msg),
        };

        (status, Json(body)).into_response()
    }
}

/// Maps core auth outcomes onto HTTP. Lockout gets 423, rate limits 429, and
/// CSRF failures carry their own code so clients can tell them apart from a
/// permission denial; everything else keeps the generic message the error
/// already carries.
fn auth_error_response(err: AuthError) -> Response {
    let (status, body) = match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            ApiResponse::<()>::error(err.to_string()),
        ),
        AuthError::AccountLocked { .. } => (
            StatusCode::LOCKED,
            ApiResponse::<()>::error(err.to_string()),
        ),
        AuthError::AccountSuspended | AuthError::AccountInactive => (
            StatusCode::FORBIDDEN,
            ApiResponse::<()>::error(err.to_string()),
        ),
        AuthError::UnauthorizedAccess => (
            StatusCode::UNAUTHORIZED,
            ApiResponse::<()>::error(err.to_string()),
        ),
        AuthError::ForbiddenAccess => (
            StatusCode::FORBIDDEN,
            ApiResponse::<()>::error(err.to_string()),
        ),
        AuthError::CsrfValidationFailed => (
            StatusCode::FORBIDDEN,
            ApiResponse::<()>::error_with_code(err.to_string(), "csrf_invalid"),
        ),
        AuthError::TokenExpiredOrInvalid => (
            StatusCode::BAD_REQUEST,
            ApiResponse::<()>::error(err.to_string()),
        ),
        AuthError::RateLimitExceeded { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            ApiResponse::<()>::error(err.to_string()),
        ),
        AuthError::PasswordPolicy(rules) => (
            StatusCode::BAD_REQUEST,
            ApiResponse::<()>::error_with_details("Password does not meet requirements", rules),
        ),
        AuthError::Conflict(msg) => (StatusCode::CONFLICT, ApiResponse::<()>::error(msg)),
        AuthError::Internal(msg) => return internal_error_response(&msg),
    };

    (status, Json(body)).into_response()
}

/// Internals are logged with a correlation id; the caller sees only the id.
fn internal_error_response(detail: &str) -> Response {
    let error_id = Uuid::new_v4();
    tracing::error!(error_id = %error_id, "Internal error: {detail}");

    let body = ApiResponse::<()>::error(format!(
        "An internal error occurred (reference: {error_id})"
    ));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{resource} {id} not found"))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
