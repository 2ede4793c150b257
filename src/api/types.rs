use serde::{Deserialize, Serialize};

use crate::auth::StrengthLabel;
use crate::db::User;
use crate::entities::users::{AccountStatus, Role};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error class for clients that branch on outcomes
    /// (for example distinguishing a CSRF failure from a permission denial).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Per-rule detail lines, used by password-policy rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            details: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: None,
            details: None,
        }
    }

    pub fn error_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::error(message)
        }
    }

    pub fn error_with_details(message: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            details: Some(details),
            ..Self::error(message)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub failed_login_attempts: i32,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            status: user.status,
            failed_login_attempts: user.failed_login_attempts,
            last_login: user.last_login.map(|t| t.to_rfc3339()),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StrengthDto {
    pub is_valid: bool,
    pub score: u8,
    pub label: StrengthLabel,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestedPasswordDto {
    pub password: String,
    pub score: u8,
    pub label: StrengthLabel,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    /// Username or email address.
    pub identity: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckPasswordPayload {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetCompletePayload {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusPayload {
    pub status: AccountStatus,
}
