//! Server-side session identity.
//!
//! The canonical credential is an opaque cookie id resolving to a record in
//! the sqlite-backed session store; the record carries [`SessionUser`] and
//! never any password material. Revocation is immediate because logout
//! destroys the server-side record regardless of the client's cookie.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::entities::users::Role;

use super::error::AuthError;

const SESSION_USER_KEY: &str = "user";

/// Identity carried by an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Binds an identity to the session after successful authentication.
/// The session id is cycled so a pre-login id can never be fixated onto an
/// authenticated session.
pub async fn establish(session: &Session, user: SessionUser) -> Result<(), AuthError> {
    session
        .cycle_id()
        .await
        .map_err(|e| AuthError::Internal(format!("Failed to cycle session id: {e}")))?;
    session
        .insert(SESSION_USER_KEY, user)
        .await
        .map_err(|e| AuthError::Internal(format!("Failed to create session: {e}")))?;

    Ok(())
}

/// Resolves the current identity. Missing, expired, or tampered sessions all
/// resolve to `None`; protected routes turn that into a 401.
pub async fn current_user(session: &Session) -> Option<SessionUser> {
    session.get::<SessionUser>(SESSION_USER_KEY).await.ok()?
}

/// Destroys the server-side record immediately.
pub async fn destroy(session: &Session) {
    let _ = session.flush().await;
}
