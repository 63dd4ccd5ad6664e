//! Brute-force protection through temporary account lockout
//!
//! The policy is stateless: it interprets and computes lockout timestamps but
//! never stores anything. The account owner persists [`LockoutState`] and
//! decides when to apply a transition.
//!
//! ```text
//! UNLOCKED(n) --failure, n+1 <  max--> UNLOCKED(n+1)
//! UNLOCKED(n) --failure, n+1 >= max--> LOCKED(now + duration)
//! LOCKED(t)   --attempt while now < t--> rejected, password not checked
//! LOCKED(t)   --late failure, now < t--> LOCKED(t), count still grows
//! LOCKED(t)   --now >= t-------------> UNLOCKED(stale n)
//! any         --success--------------> UNLOCKED(0)
//! ```

use crate::{clock::SharedClock, config::AppConfig};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failed attempts that trigger a lockout
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long a lockout lasts
pub const LOCKOUT_DURATION_SECS: u64 = 30 * 60;

/// Per-account lockout state, owned and persisted by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// State after one more failed attempt.
    ///
    /// An active lock is kept as is: a failure that raced the locking attempt
    /// neither clears nor extends it.
    pub fn register_failure(&self, policy: &LockoutPolicy) -> LockoutState {
        let failed_attempts = self.failed_attempts.saturating_add(1);
        let locked_until = if policy.is_account_locked(self.locked_until) {
            self.locked_until
        } else if failed_attempts >= policy.max_failed_attempts() {
            Some(policy.calculate_lockout_until())
        } else {
            self.locked_until
        };

        LockoutState {
            failed_attempts,
            locked_until,
        }
    }

    /// State after a successful login
    pub fn reset() -> LockoutState {
        LockoutState::default()
    }

    /// Whether the state holds anything a successful login must clear
    pub fn is_dirty(&self) -> bool {
        self.failed_attempts > 0 || self.locked_until.is_some()
    }
}

/// Lockout policy
#[derive(Clone)]
pub struct LockoutPolicy {
    max_failed_attempts: u32,
    lockout_duration: Duration,
    clock: SharedClock,
}

impl LockoutPolicy {
    /// Policy with the default threshold (5 attempts) and duration (30 minutes)
    pub fn new(clock: SharedClock) -> Self {
        Self::with_limits(
            MAX_FAILED_ATTEMPTS,
            Duration::seconds(LOCKOUT_DURATION_SECS as i64),
            clock,
        )
    }

    pub fn with_limits(max_failed_attempts: u32, lockout_duration: Duration, clock: SharedClock) -> Self {
        Self {
            max_failed_attempts: max_failed_attempts.max(1),
            lockout_duration,
            clock,
        }
    }

    pub fn from_config(config: &AppConfig, clock: SharedClock) -> Self {
        Self::with_limits(
            config.security.max_login_attempts,
            Duration::seconds(config.security.login_lockout_duration_secs as i64),
            clock,
        )
    }

    pub fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    /// True iff `locked_until` is present and strictly in the future
    pub fn is_account_locked(&self, locked_until: Option<DateTime<Utc>>) -> bool {
        is_locked_at(locked_until, self.clock.now())
    }

    /// Expiry of a lockout starting now
    pub fn calculate_lockout_until(&self) -> DateTime<Utc> {
        self.clock.now() + self.lockout_duration
    }

    /// Time left until the lockout lifts, `None` if not locked
    pub fn retry_after(&self, locked_until: Option<DateTime<Utc>>) -> Option<std::time::Duration> {
        let remaining = locked_until? - self.clock.now();
        if remaining > Duration::zero() {
            remaining.to_std().ok()
        } else {
            None
        }
    }

    /// Whole seconds left until the lockout lifts, rounded up
    pub fn retry_after_secs(&self, locked_until: Option<DateTime<Utc>>) -> Option<u64> {
        self.retry_after(locked_until)
            .map(|remaining| remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
    }
}

/// Pure lockout check against an explicit instant
pub fn is_locked_at(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(locked_until, Some(until) if until > now)
}

/// Human-readable retry-after, rounded up to the displayed unit
pub fn format_retry_after(remaining: std::time::Duration) -> String {
    let secs = remaining.as_secs().max(1);
    if secs < 60 {
        plural(secs, "second")
    } else if secs < 3600 {
        plural(secs.div_ceil(60), "minute")
    } else {
        plural(secs.div_ceil(3600), "hour")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
