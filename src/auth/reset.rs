//! Password-reset token primitives.
//!
//! Tokens are 32 random bytes rendered as 64 hex characters. Only the
//! SHA-256 digest of a token is ever persisted; the raw value exists in the
//! issuance response path (the mailer) and nowhere else, so a leaked user
//! table does not yield usable reset tokens.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy)]
pub struct ResetPolicy {
    pub token_ttl: Duration,
    pub resend_window: Duration,
    pub origin_hourly_cap: usize,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

impl ResetPolicy {
    #[must_use]
    pub fn new(
        ttl_minutes: i64,
        resend_window_minutes: i64,
        origin_hourly_cap: usize,
        delay_min_ms: u64,
        delay_max_ms: u64,
    ) -> Self {
        Self {
            token_ttl: Duration::minutes(ttl_minutes),
            resend_window: Duration::minutes(resend_window_minutes),
            origin_hourly_cap,
            delay_min_ms,
            delay_max_ms,
        }
    }

    /// True while a prior token is live and young enough that a new request
    /// should be silently suppressed instead of issuing a replacement.
    #[must_use]
    pub fn within_resend_window(&self, expires: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if now >= expires {
            return false;
        }
        let issued_at = expires - self.token_ttl;
        now - issued_at < self.resend_window
    }

    /// Random per-request delay applied to every issuance branch so timing
    /// does not distinguish known from unknown addresses.
    #[must_use]
    pub fn jitter_ms(&self) -> u64 {
        if self.delay_max_ms <= self.delay_min_ms {
            return self.delay_min_ms;
        }
        rand::rng().random_range(self.delay_min_ms..=self.delay_max_ms)
    }
}

/// 256 bits of randomness as 64 lowercase hex characters.
#[must_use]
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// SHA-256 hex digest of a presented token, matching the stored form.
#[must_use]
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ResetPolicy {
        ResetPolicy::new(60, 15, 3, 0, 0)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().to_utc()
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();

        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_stable_and_token_shaped() {
        let token = generate_token();
        assert_eq!(token_digest(&token), token_digest(&token));
        assert_ne!(token_digest(&token), token);
        assert_eq!(token_digest("x").len(), 64);
    }

    #[test]
    fn resend_window_suppresses_fresh_tokens_only() {
        let p = policy();
        let expires = t0() + p.token_ttl;

        // 5 minutes after issue: suppressed
        assert!(p.within_resend_window(expires, t0() + Duration::minutes(5)));
        // 20 minutes after issue: reissue allowed
        assert!(!p.within_resend_window(expires, t0() + Duration::minutes(20)));
        // expired token never suppresses
        assert!(!p.within_resend_window(expires, t0() + Duration::minutes(61)));
    }
}
