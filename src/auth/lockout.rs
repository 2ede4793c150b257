//! Brute-force lockout tracking.
//!
//! Per-account decisions are pure functions over a snapshot of the user row
//! with an injected `now`, so the state machine is testable without a store.
//! The coarser per-origin tracking lives in [`OriginGuard`], a process-local
//! map guarded by a mutex; entries are swept on a timer to bound memory.
//! Origin state is lost on restart, which is an accepted limitation of the
//! single-process deployment model.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

use crate::entities::users::AccountStatus;

use super::error::AuthError;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: i32,
    pub lock_duration: Duration,
}

impl LockoutPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, lock_minutes: i64) -> Self {
        Self {
            max_attempts: max_attempts as i32,
            lock_duration: Duration::minutes(lock_minutes),
        }
    }
}

/// Outcome of gating an authentication attempt against the account state.
#[derive(Debug, PartialEq)]
pub enum Gate {
    /// The attempt may proceed to password verification. When `clear_lock`
    /// is set the lock window has elapsed and the caller must restore the
    /// account to `active` with a zeroed counter before evaluating the
    /// attempt.
    Allow { clear_lock: bool },
    Deny(AuthError),
}

/// Decides whether an attempt may proceed given the account snapshot.
///
/// `locked` auto-clears once the lock window has elapsed; `suspended` and
/// `inactive` always deny and only clear through an admin action or a
/// completed password reset.
#[must_use]
pub fn gate(
    status: AccountStatus,
    locked_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &LockoutPolicy,
) -> Gate {
    match status {
        AccountStatus::Active => Gate::Allow { clear_lock: false },
        AccountStatus::Suspended => Gate::Deny(AuthError::AccountSuspended),
        AccountStatus::Inactive => Gate::Deny(AuthError::AccountInactive),
        AccountStatus::Locked => {
            // A locked row without a reference time cannot compute an expiry;
            // treat the lock as elapsed rather than permanent.
            let Some(reference) = locked_at else {
                return Gate::Allow { clear_lock: true };
            };

            let expiry = reference + policy.lock_duration;
            if now >= expiry {
                Gate::Allow { clear_lock: true }
            } else {
                let remaining = expiry - now;
                Gate::Deny(AuthError::AccountLocked {
                    remaining_minutes: remaining_minutes(remaining),
                })
            }
        }
    }
}

/// Result of registering a failed password check on an active account.
#[derive(Debug, PartialEq, Eq)]
pub struct Escalation {
    pub attempts: i32,
    pub lock_now: bool,
}

/// Increments the failure counter and reports whether the threshold tripped.
#[must_use]
pub fn register_failure(failed_attempts: i32, policy: &LockoutPolicy) -> Escalation {
    let attempts = failed_attempts.saturating_add(1);
    Escalation {
        attempts,
        lock_now: attempts >= policy.max_attempts,
    }
}

fn remaining_minutes(remaining: Duration) -> i64 {
    // Round up so "1 minute left" never reads as zero.
    (remaining.num_seconds() + 59) / 60
}

#[derive(Debug, Clone)]
struct OriginRecord {
    failures: u32,
    last_failure: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

/// Per-network-origin failure tracking, independent of the targeted account.
/// Slows distributed credential stuffing that spreads attempts across many
/// usernames from one address. Also carries the sliding window that caps
/// password-reset issuance per origin.
pub struct OriginGuard {
    policy: LockoutPolicy,
    reset_hourly_cap: usize,
    logins: Mutex<HashMap<IpAddr, OriginRecord>>,
    reset_requests: Mutex<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl OriginGuard {
    #[must_use]
    pub fn new(policy: LockoutPolicy, reset_hourly_cap: usize) -> Self {
        Self {
            policy,
            reset_hourly_cap,
            logins: Mutex::new(HashMap::new()),
            reset_requests: Mutex::new(HashMap::new()),
        }
    }

    /// Rejects the attempt while the origin is inside its lock window.
    pub fn check_login(&self, origin: IpAddr, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut map = self.logins.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(record) = map.get_mut(&origin) else {
            return Ok(());
        };

        if let Some(until) = record.locked_until {
            if now < until {
                return Err(AuthError::RateLimitExceeded {
                    retry_minutes: remaining_minutes(until - now),
                });
            }
            // Lock elapsed; start a fresh window for this origin.
            map.remove(&origin);
        }

        Ok(())
    }

    pub fn record_login_failure(&self, origin: IpAddr, now: DateTime<Utc>) {
        let mut map = self.logins.lock().unwrap_or_else(PoisonError::into_inner);

        let record = map.entry(origin).or_insert(OriginRecord {
            failures: 0,
            last_failure: now,
            locked_until: None,
        });

        record.failures += 1;
        record.last_failure = now;

        if record.failures >= self.policy.max_attempts as u32 && record.locked_until.is_none() {
            record.locked_until = Some(now + self.policy.lock_duration);
        }
    }

    /// Caps password-reset issuance per origin with an hourly sliding window.
    pub fn check_reset_request(&self, origin: IpAddr, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut map = self
            .reset_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let window_start = now - Duration::hours(1);
        let stamps = map.entry(origin).or_default();
        stamps.retain(|t| *t > window_start);

        if stamps.len() >= self.reset_hourly_cap {
            let oldest = stamps.iter().min().copied().unwrap_or(now);
            let retry_at = oldest + Duration::hours(1);
            return Err(AuthError::RateLimitExceeded {
                retry_minutes: remaining_minutes(retry_at - now),
            });
        }

        stamps.push(now);
        Ok(())
    }

    /// Evicts origins whose lock and retention windows have both elapsed.
    /// Held locks cover only the `retain` calls; nothing awaits inside.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let retention = self.policy.lock_duration;

        {
            let mut map = self.logins.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, record| {
                let lock_live = record.locked_until.is_some_and(|until| now < until);
                let window_live = now - record.last_failure < retention;
                lock_live || window_live
            });
        }

        {
            let mut map = self
                .reset_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let window_start = now - Duration::hours(1);
            map.retain(|_, stamps| {
                stamps.retain(|t| *t > window_start);
                !stamps.is_empty()
            });
        }
    }

    #[must_use]
    pub fn tracked_origins(&self) -> usize {
        self.logins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, 30)
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().to_utc()
            + Duration::minutes(minutes)
    }

    fn origin() -> IpAddr {
        "203.0.113.7".parse().unwrap()
    }

    #[test]
    fn active_account_is_allowed() {
        assert_eq!(
            gate(AccountStatus::Active, None, at(0), &policy()),
            Gate::Allow { clear_lock: false }
        );
    }

    #[test]
    fn locked_account_denies_with_remaining_minutes() {
        let result = gate(AccountStatus::Locked, Some(at(0)), at(10), &policy());
        match result {
            Gate::Deny(AuthError::AccountLocked { remaining_minutes }) => {
                assert_eq!(remaining_minutes, 20);
            }
            other => panic!("expected AccountLocked, got {other:?}"),
        }
    }

    #[test]
    fn elapsed_lock_allows_and_requests_clear() {
        assert_eq!(
            gate(AccountStatus::Locked, Some(at(0)), at(30), &policy()),
            Gate::Allow { clear_lock: true }
        );
        assert_eq!(
            gate(AccountStatus::Locked, Some(at(0)), at(31), &policy()),
            Gate::Allow { clear_lock: true }
        );
    }

    #[test]
    fn suspended_and_inactive_never_auto_clear() {
        for status in [AccountStatus::Suspended, AccountStatus::Inactive] {
            match gate(status, Some(at(-1000)), at(0), &policy()) {
                Gate::Deny(_) => {}
                other => panic!("expected deny for {status:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn fifth_failure_trips_the_lock() {
        let p = policy();
        assert_eq!(
            register_failure(3, &p),
            Escalation { attempts: 4, lock_now: false }
        );
        assert_eq!(
            register_failure(4, &p),
            Escalation { attempts: 5, lock_now: true }
        );
    }

    #[test]
    fn origin_locks_after_threshold_failures() {
        let guard = OriginGuard::new(policy(), 3);

        for i in 0..5 {
            assert!(guard.check_login(origin(), at(i)).is_ok());
            guard.record_login_failure(origin(), at(i));
        }

        assert!(matches!(
            guard.check_login(origin(), at(5)),
            Err(AuthError::RateLimitExceeded { .. })
        ));

        // lock window elapses relative to the fifth failure
        assert!(guard.check_login(origin(), at(4 + 31)).is_ok());
    }

    #[test]
    fn reset_requests_are_capped_per_hour() {
        let guard = OriginGuard::new(policy(), 3);

        for i in 0..3 {
            assert!(guard.check_reset_request(origin(), at(i)).is_ok());
        }
        assert!(matches!(
            guard.check_reset_request(origin(), at(3)),
            Err(AuthError::RateLimitExceeded { .. })
        ));

        // window slides: the first stamp falls out after an hour
        assert!(guard.check_reset_request(origin(), at(61)).is_ok());
    }

    #[test]
    fn sweep_evicts_expired_entries() {
        let guard = OriginGuard::new(policy(), 3);

        for i in 0..5 {
            guard.record_login_failure(origin(), at(i));
        }
        assert_eq!(guard.tracked_origins(), 1);

        guard.sweep(at(10));
        assert_eq!(guard.tracked_origins(), 1);

        guard.sweep(at(120));
        assert_eq!(guard.tracked_origins(), 0);
    }
}
