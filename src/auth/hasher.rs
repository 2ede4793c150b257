//! Argon2id credential hashing.
//!
//! Hash output is a PHC string, so the algorithm, cost parameters and salt
//! travel with the record and verification stays forward-compatible when the
//! parameters change. Verification fails closed: a malformed record or an
//! internal error is indistinguishable from a wrong password.

use anyhow::Result;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use tokio::task;

use crate::config::Argon2Config;

/// Fixed input for the dummy record. The value itself is irrelevant; only
/// the work of verifying against its hash matters.
const DUMMY_PASSWORD: &str = "gamekeep.dummy-credential";

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of [`DUMMY_PASSWORD`] under the configured cost parameters,
    /// verified against when the login identity is unknown so known and
    /// unknown usernames cost the same.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(config: &Argon2Config) -> Result<Self> {
        let params = Params::new(
            config.memory_cost_kib,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash(DUMMY_PASSWORD)?;

        Ok(hasher)
    }

    fn argon2(&self) -> Argon2 {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes a password into a self-describing PHC string.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

        Ok(hash.to_string())
    }

    /// Verifies a password against a stored PHC string. Any failure,
    /// including a malformed record, returns `false`.
    #[must_use]
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burns the same amount of work as a real verification without revealing
    /// anything; used when no account matches the presented identity.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// Hashing is CPU and memory bound, so it runs on the blocking pool to
    /// keep unrelated request tasks responsive.
    pub async fn hash_blocking(&self, password: &str) -> Result<String> {
        let hasher = self.clone();
        let password = password.to_string();

        task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task panicked: {e}"))?
    }

    pub async fn verify_blocking(&self, password: &str, stored: &str) -> Result<bool> {
        let hasher = self.clone();
        let password = password.to_string();
        let stored = stored.to_string();

        task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| anyhow::anyhow!("Password verification task panicked: {e}"))
    }

    pub async fn verify_dummy_blocking(&self, password: &str) {
        let hasher = self.clone();
        let password = password.to_string();

        let _ = task::spawn_blocking(move || hasher.verify_dummy(&password)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hasher() -> PasswordHasher {
        // Low cost parameters to keep the test suite fast.
        PasswordHasher::new(&Argon2Config {
            memory_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn round_trip_verifies() {
        let hasher = test_hasher();
        let stored = hasher.hash("correct-Horse1!").unwrap();

        assert!(hasher.verify("correct-Horse1!", &stored));
        assert!(!hasher.verify("wrong-Horse1!", &stored));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = test_hasher();
        let a = hasher.hash("Tr0ub4dor!9").unwrap();
        let b = hasher.hash("Tr0ub4dor!9").unwrap();

        assert_ne!(a, b);
        assert!(hasher.verify("Tr0ub4dor!9", &a));
        assert!(hasher.verify("Tr0ub4dor!9", &b));
    }

    #[test]
    fn hash_is_phc_self_describing() {
        let hasher = test_hasher();
        let stored = hasher.hash("Tr0ub4dor!9").unwrap();

        assert!(stored.starts_with("$argon2id$"));
        assert!(stored.contains("m=1024,t=1,p=1"));
    }

    #[test]
    fn dummy_hash_tracks_configured_costs() {
        let hasher = test_hasher();

        assert!(hasher.dummy_hash.starts_with("$argon2id$"));
        assert!(hasher.dummy_hash.contains("m=1024,t=1,p=1"));
    }

    #[test]
    fn malformed_record_fails_closed() {
        let hasher = test_hasher();

        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("anything", ""));
        assert!(!hasher.verify("anything", "$argon2id$truncated"));
    }
}
