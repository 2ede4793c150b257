//! Anti-forgery token store.
//!
//! Tokens are single-purpose bearer values held in a process-local map,
//! not cryptographically tied to the session. A fresh token is minted on
//! every API response and delivered via a readable cookie plus a response
//! header; unsafe requests must echo a live token back. Expired entries are
//! swept on a timer to bound memory.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::reset::generate_token;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_BODY_FIELD: &str = "csrf_token";

#[derive(Debug, Clone)]
struct CsrfEntry {
    expires: DateTime<Utc>,
    user_id: Option<i32>,
}

pub struct CsrfStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, CsrfEntry>>,
}

impl CsrfStore {
    #[must_use]
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Mints a fresh token bound to an expiry and, when present, the acting
    /// user. Tokens are never reused across users.
    pub fn issue(&self, user_id: Option<i32>, now: DateTime<Utc>) -> String {
        let token = generate_token();
        let entry = CsrfEntry {
            expires: now + self.ttl,
            user_id,
        };

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), entry);

        token
    }

    /// True only for a live, unexpired entry.
    #[must_use]
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .is_some_and(|entry| now < entry.expires)
    }

    /// Drops every token held for the given user, e.g. on logout.
    pub fn clear_user(&self, user_id: i32) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, entry| entry.user_id != Some(user_id));
    }

    /// Evicts expired entries. Holds the lock only for the retain.
    pub fn sweep(&self, now: DateTime<Utc>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, entry| now < entry.expires);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().to_utc()
    }

    #[test]
    fn issued_token_validates_until_expiry() {
        let store = CsrfStore::new(24);
        let token = store.issue(None, t0());

        assert!(store.validate(&token, t0() + Duration::hours(23)));
        assert!(!store.validate(&token, t0() + Duration::hours(24)));
        assert!(!store.validate("no-such-token", t0()));
    }

    #[test]
    fn sweep_drops_expired_entries_only() {
        let store = CsrfStore::new(24);
        let old = store.issue(None, t0());
        let fresh = store.issue(Some(7), t0() + Duration::hours(12));

        store.sweep(t0() + Duration::hours(25));

        assert_eq!(store.len(), 1);
        assert!(!store.validate(&old, t0() + Duration::hours(25)));
        assert!(store.validate(&fresh, t0() + Duration::hours(25)));
    }

    #[test]
    fn clear_user_drops_only_that_users_tokens() {
        let store = CsrfStore::new(24);
        let mine = store.issue(Some(1), t0());
        let theirs = store.issue(Some(2), t0());
        let anonymous = store.issue(None, t0());

        store.clear_user(1);

        assert!(!store.validate(&mine, t0()));
        assert!(store.validate(&theirs, t0()));
        assert!(store.validate(&anonymous, t0()));
    }
}
