//! Gateway middleware.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use evently_core::validation::limits::MAX_EMAIL_LENGTH;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

/// Checks between sweeps of replenished keys.
const PRUNE_INTERVAL: u64 = 1024;

/// Per-email limiter for login attempts.
///
/// Callers pass the canonical email so that every spelling of one address
/// shares a single quota.
pub struct LoginRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    checks: AtomicU64,
}

impl LoginRateLimiter {
    /// Create a new rate limiter. Zero is treated as one attempt per minute.
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
            checks: AtomicU64::new(0),
        }
    }

    /// Check if another attempt for this key is allowed, consuming one cell.
    ///
    /// Keys are lowercased and cut to the longest valid email, so arbitrary
    /// input cannot inflate the key store.
    #[must_use]
    pub fn check(&self, key: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_INTERVAL == PRUNE_INTERVAL - 1 {
            self.prune();
        }

        let key: String = key
            .chars()
            .take(MAX_EMAIL_LENGTH)
            .collect::<String>()
            .to_lowercase();
        self.limiter.check_key(&key).is_ok()
    }

    /// Drop state for keys whose quota has fully replenished.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter")
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}
