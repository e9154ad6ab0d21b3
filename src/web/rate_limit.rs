//! Per-IP rate limiting for credential endpoints
//!
//! Tracks failed login, registration and governor bootstrap attempts by
//! client address and locks the address out after too many failures.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum failed attempts inside the window before a lockout
const MAX_FAILED_ATTEMPTS: usize = 5;
/// Window over which failures are counted
const FAILURE_WINDOW: Duration = Duration::from_secs(300);
/// How long a locked-out address stays blocked
const LOCKOUT_DURATION: Duration = Duration::from_secs(900);

/// Limits for [`LoginRateLimiter`]
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_failures: usize,
    pub window: Duration,
    pub lockout: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_failures: MAX_FAILED_ATTEMPTS,
            window: FAILURE_WINDOW,
            lockout: LOCKOUT_DURATION,
        }
    }
}

/// Retry hint while an address already has as many attempts in flight as it may still fail
const PENDING_RETRY_SECS: u64 = 1;

#[derive(Debug, Default)]
struct AttemptLog {
    failures: Vec<Instant>,
    locked_at: Option<Instant>,
    /// Attempts admitted by `begin` that have not finished yet
    in_flight: usize,
}

impl AttemptLog {
    fn is_idle(&self) -> bool {
        self.failures.is_empty() && self.locked_at.is_none() && self.in_flight == 0
    }
}

/// Rate limiter for credential attempts, shared across handlers
///
/// Every attempt reserves a slot before it runs, so concurrent requests from
/// one address can never exceed the failure budget between them.
#[derive(Debug, Clone, Default)]
pub struct LoginRateLimiter {
    policy: RateLimitPolicy,
    entries: Arc<Mutex<HashMap<IpAddr, AttemptLog>>>,
}

impl LoginRateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            entries: Arc::default(),
        }
    }

    /// Reserve an attempt for `ip`
    ///
    /// Fails with the seconds to wait when the address is locked out, or when
    /// its recent failures plus attempts still in flight already reach the limit.
    pub fn begin(&self, ip: IpAddr) -> Result<Attempt, u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let log = entries.entry(ip).or_default();

        if let Some(locked_at) = log.locked_at {
            let elapsed = now.duration_since(locked_at);
            if elapsed < self.policy.lockout {
                return Err((self.policy.lockout - elapsed).as_secs().max(1));
            }
            log.locked_at = None;
        }

        let window = self.policy.window;
        log.failures.retain(|t| now.duration_since(*t) < window);
        if log.failures.len() + log.in_flight >= self.policy.max_failures {
            return Err(PENDING_RETRY_SECS);
        }

        log.in_flight += 1;
        Ok(Attempt {
            limiter: self.clone(),
            ip,
        })
    }

    /// Record a failed attempt; locks the address once the limit is reached
    fn record_failure(&self, ip: &IpAddr) {
        let now = Instant::now();
        let window = self.policy.window;

        let mut entries = self.entries.lock();
        let log = entries.entry(*ip).or_default();
        log.failures.retain(|t| now.duration_since(*t) < window);
        log.failures.push(now);

        if log.failures.len() >= self.policy.max_failures {
            tracing::warn!(ip = %ip, failures = log.failures.len(), "Locking out client after repeated failures");
            log.locked_at = Some(now);
            log.failures.clear();
        }
    }

    /// Forget failures and lockout of an address after a successful attempt
    fn reset(&self, ip: &IpAddr) {
        if let Some(log) = self.entries.lock().get_mut(ip) {
            log.failures.clear();
            log.locked_at = None;
        }
    }

    /// Give back the slot reserved by `begin`
    fn release(&self, ip: &IpAddr) {
        let mut entries = self.entries.lock();
        if let Some(log) = entries.get_mut(ip) {
            log.in_flight = log.in_flight.saturating_sub(1);
            if log.is_idle() {
                entries.remove(ip);
            }
        }
    }

    /// Drop stale entries
    pub fn cleanup(&self) {
        let now = Instant::now();
        let RateLimitPolicy {
            window, lockout, ..
        } = self.policy;

        self.entries.lock().retain(|_, log| {
            log.failures.retain(|t| now.duration_since(*t) < window);
            if log.locked_at.is_some_and(|at| at.elapsed() >= lockout) {
                log.locked_at = None;
            }
            !log.is_idle()
        });
    }

    /// Number of addresses currently tracked
    pub fn tracked(&self) -> usize {
        self.entries.lock().len()
    }
}

/// A reserved credential attempt; its slot is released when dropped
#[must_use = "an attempt holds a slot until it is settled or dropped"]
pub struct Attempt {
    limiter: LoginRateLimiter,
    ip: IpAddr,
}

impl Attempt {
    /// The credentials were rejected
    pub fn failed(self) {
        self.limiter.record_failure(&self.ip);
    }

    /// The credentials were accepted
    pub fn succeeded(self) {
        self.limiter.reset(&self.ip);
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        self.limiter.release(&self.ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn fail(limiter: &LoginRateLimiter, addr: IpAddr) {
        limiter.begin(addr).unwrap().failed();
    }

    #[test]
    fn test_allows_attempts_below_limit() {
        let limiter = LoginRateLimiter::default();
        let addr = ip("192.168.1.1");

        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            fail(&limiter, addr);
        }
        assert!(limiter.begin(addr).is_ok());
    }

    #[test]
    fn test_locks_out_after_limit() {
        let limiter = LoginRateLimiter::default();
        let addr = ip("192.168.1.2");

        for _ in 0..MAX_FAILED_ATTEMPTS {
            fail(&limiter, addr);
        }

        let remaining = limiter.begin(addr).err().unwrap();
        assert!(remaining > 0 && remaining <= LOCKOUT_DURATION.as_secs());
    }

    #[test]
    fn test_success_resets_failures() {
        let limiter = LoginRateLimiter::default();
        let addr = ip("192.168.1.3");

        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            fail(&limiter, addr);
        }
        limiter.begin(addr).unwrap().succeeded();
        assert_eq!(limiter.tracked(), 0);

        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            fail(&limiter, addr);
        }
        assert!(limiter.begin(addr).is_ok());
    }

    #[test]
    fn test_concurrent_attempts_share_the_budget() {
        let limiter = LoginRateLimiter::default();
        let addr = ip("192.168.1.4");

        let pending: Vec<Attempt> = (0..MAX_FAILED_ATTEMPTS)
            .map(|_| limiter.begin(addr).unwrap())
            .collect();
        assert_eq!(limiter.begin(addr).err(), Some(PENDING_RETRY_SECS));

        for attempt in pending {
            attempt.failed();
        }
        let remaining = limiter.begin(addr).err().unwrap();
        assert!(remaining > PENDING_RETRY_SECS);
    }

    #[test]
    fn test_abandoned_attempt_frees_its_slot() {
        let limiter = LoginRateLimiter::new(RateLimitPolicy {
            max_failures: 1,
            window: Duration::from_secs(60),
            lockout: Duration::from_secs(60),
        });
        let addr = ip("192.168.1.5");

        let attempt = limiter.begin(addr).unwrap();
        assert!(limiter.begin(addr).is_err());

        drop(attempt);
        assert_eq!(limiter.tracked(), 0);
        assert!(limiter.begin(addr).is_ok());
    }

    #[test]
    fn test_isolates_addresses() {
        let limiter = LoginRateLimiter::default();
        let blocked = ip("10.0.0.1");
        let other = ip("10.0.0.2");

        for _ in 0..MAX_FAILED_ATTEMPTS {
            fail(&limiter, blocked);
        }

        assert!(limiter.begin(blocked).is_err());
        assert!(limiter.begin(other).is_ok());
    }

    #[test]
    fn test_lockout_expires() {
        let limiter = LoginRateLimiter::new(RateLimitPolicy {
            max_failures: 2,
            window: Duration::from_secs(60),
            lockout: Duration::from_millis(20),
        });
        let addr = ip("::1");

        fail(&limiter, addr);
        fail(&limiter, addr);
        assert!(limiter.begin(addr).is_err());

        std::thread::sleep(Duration::from_millis(40));
        limiter.begin(addr).unwrap().succeeded();
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_cleanup_drops_stale_entries() {
        let limiter = LoginRateLimiter::new(RateLimitPolicy {
            max_failures: 5,
            window: Duration::from_millis(10),
            lockout: Duration::from_millis(10),
        });
        fail(&limiter, ip("10.1.1.1"));
        assert_eq!(limiter.tracked(), 1);

        std::thread::sleep(Duration::from_millis(30));
        limiter.cleanup();
        assert_eq!(limiter.tracked(), 0);
    }
}
