use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tower_sessions::Session;

use crate::auth::csrf::{CSRF_BODY_FIELD, CSRF_COOKIE, CSRF_HEADER};
use crate::auth::{AuthError, SessionUser, session};
use crate::services::RegisterRequest;

use super::net::ClientOrigin;
use super::types::{
    ChangePasswordPayload, CheckPasswordPayload, LoginPayload, MessageResponse, RegisterPayload,
    StrengthDto, SuggestedPasswordDto, UserDto,
};
use super::{ApiError, ApiResponse, AppState};

const SUGGESTED_PASSWORD_LEN: usize = 16;

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the session identity for protected routes. Missing, expired, or
/// tampered sessions answer 401; on success the identity is placed in request
/// extensions for the handlers.
pub async fn require_session(
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(user) = session::current_user(&session).await else {
        return Err(ApiError::Auth(AuthError::UnauthorizedAccess));
    };

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Mints a fresh anti-forgery token on every API response, delivered both as
/// a readable cookie and a response header so browser and non-browser clients
/// can echo it back.
pub async fn csrf_issue(
    State(state): State<Arc<AppState>>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let user_id = session::current_user(&session).await.map(|u| u.id);

    let mut response = next.run(request).await;

    let token = state.shared.csrf.issue(user_id, Utc::now());
    let secure = state.shared.config.read().await.server.secure_cookies;

    let cookie = format!(
        "{CSRF_COOKIE}={token}; Path=/; SameSite=Lax{}",
        if secure { "; Secure" } else { "" }
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&token) {
        response.headers_mut().insert(CSRF_HEADER, value);
    }

    response
}

/// Rejects unsafe requests that do not echo a live anti-forgery token.
/// The token comes from the request header, falling back to a `csrf_token`
/// field in a JSON or form-urlencoded body.
pub async fn csrf_validate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return Ok(next.run(request).await);
    }

    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let (request, token) = match header_token {
        Some(token) => (request, Some(token)),
        // The body is buffered so it can be inspected and replayed.
        None => {
            let (parts, body) = request.into_parts();
            let bytes = axum::body::to_bytes(body, 1024 * 1024)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to read request body: {e}")))?;

            let token = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| {
                    v.get(CSRF_BODY_FIELD)
                        .and_then(|t| t.as_str())
                        .map(ToString::to_string)
                })
                .or_else(|| {
                    url::form_urlencoded::parse(&bytes)
                        .find(|(key, _)| *key == CSRF_BODY_FIELD)
                        .map(|(_, value)| value.into_owned())
                });

            (Request::from_parts(parts, Body::from(bytes)), token)
        }
    };

    let valid = token.is_some_and(|t| state.shared.csrf.validate(&t, Utc::now()));
    if !valid {
        return Err(ApiError::Auth(AuthError::CsrfValidationFailed));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    validate_username(&payload.username)?;
    validate_email(&payload.email)?;

    let session_user = state
        .shared
        .auth_service
        .register(RegisterRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    let user = state
        .shared
        .store
        .get_user_by_id(session_user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load new account: {e}")))?
        .ok_or_else(|| ApiError::internal("New account vanished after insert"))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    origin: ClientOrigin,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<ApiResponse<SessionUser>>, ApiError> {
    if payload.identity.is_empty() {
        return Err(ApiError::validation("Username or email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .shared
        .auth_service
        .login(&payload.identity, &payload.password, origin.0)
        .await?;

    session::establish(&session, user.clone()).await?;

    Ok(Json(ApiResponse::success(user)))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<SessionUser>,
    session: Session,
) -> impl IntoResponse {
    session::destroy(&session).await;
    state.shared.csrf.clear_user(user.id);

    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<SessionUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .shared
        .store
        .get_user_by_id(user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load user: {e}")))?
        .ok_or_else(|| ApiError::Auth(AuthError::UnauthorizedAccess))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<SessionUser>,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .auth_service
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password changed",
    ))))
}

/// POST /auth/password/check
///
/// Public strength feedback for registration forms; never touches accounts.
pub async fn check_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckPasswordPayload>,
) -> Json<ApiResponse<StrengthDto>> {
    let report = state.shared.strength.validate(&payload.password);

    Json(ApiResponse::success(StrengthDto {
        is_valid: report.is_valid,
        score: state.shared.strength.score(&payload.password),
        label: state.shared.strength.classify(&payload.password),
        errors: report.errors,
    }))
}

/// GET /auth/password/suggest
pub async fn suggest_password(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<SuggestedPasswordDto>> {
    let password = state.shared.strength.generate(SUGGESTED_PASSWORD_LEN);

    Json(ApiResponse::success(SuggestedPasswordDto {
        score: state.shared.strength.score(&password),
        label: state.shared.strength.classify(&password),
        password,
    }))
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return Err(ApiError::validation(
            "Username must be between 3 and 30 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::validation(
            "Username may contain only letters, digits, '_' and '-'",
        ));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

    if valid {
        Ok(())
    } else {
        Err(ApiError::validation("A valid email address is required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("casey_dev").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(31)).is_err());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("player@example.com").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@nodot").is_err());
    }
}
