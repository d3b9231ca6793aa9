//! Fixed-window, per-IP request limiter for the `/api` routes.
//!
//! Each client IP gets a counter that resets when its window expires.  The
//! window starts at the first request after the previous one expired, not on
//! a global clock tick.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::domain::RateLimitConfig;

/// Returned when a client has used up its budget for the current window.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("too many requests; retry in {retry_after:?}")]
pub struct RateLimited {
    /// Time until the client's window resets.
    pub retry_after: Duration,
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Per-IP fixed-window counter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    /// Creates a limiter with no clients tracked yet.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request from `ip` at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] once `ip` has made more than
    /// `max_requests` requests in its current window.
    pub fn check(&self, ip: IpAddr, now: Instant) -> Result<(), RateLimited> {
        // The map holds plain counters; a panic elsewhere cannot leave it
        // inconsistent, so a poisoned lock is still usable.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let window_len = self.config.window;
        windows.retain(|_, w| now.saturating_duration_since(w.started_at) < window_len);

        let entry = windows.entry(ip).or_insert(Window {
            started_at: now,
            count: 0,
        });
        entry.count += 1;

        if entry.count > self.config.max_requests {
            let elapsed = now.saturating_duration_since(entry.started_at);
            return Err(RateLimited {
                retry_after: window_len.saturating_sub(elapsed),
            });
        }
        Ok(())
    }

    /// Number of IPs with a live window.  Used by tests.
    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limiter(max: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window: Duration::from_millis(window_ms),
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    #[test]
    fn test_requests_within_budget_are_allowed() {
        let rl = limiter(10, 1000);
        let now = Instant::now();

        for _ in 0..10 {
            assert!(rl.check(ip(1), now).is_ok());
        }
    }

    #[test]
    fn test_eleventh_request_in_window_is_rejected() {
        // Arrange
        let rl = limiter(10, 1000);
        let now = Instant::now();
        for _ in 0..10 {
            rl.check(ip(1), now).unwrap();
        }

        // Act
        let result = rl.check(ip(1), now + Duration::from_millis(400));

        // Assert
        let err = result.unwrap_err();
        assert_eq!(err.retry_after, Duration::from_millis(600));
    }

    #[test]
    fn test_budget_resets_after_window_expires() {
        // Arrange
        let rl = limiter(2, 1000);
        let start = Instant::now();
        rl.check(ip(1), start).unwrap();
        rl.check(ip(1), start).unwrap();
        assert!(rl.check(ip(1), start).is_err());

        // Act
        let later = start + Duration::from_millis(1000);

        // Assert
        assert!(rl.check(ip(1), later).is_ok());
    }

    #[test]
    fn test_clients_are_limited_independently() {
        let rl = limiter(1, 1000);
        let now = Instant::now();

        rl.check(ip(1), now).unwrap();
        assert!(rl.check(ip(1), now).is_err());
        assert!(rl.check(ip(2), now).is_ok());
    }

    #[test]
    fn test_expired_windows_are_pruned() {
        let rl = limiter(5, 100);
        let start = Instant::now();
        rl.check(ip(1), start).unwrap();
        rl.check(ip(2), start).unwrap();
        assert_eq!(rl.tracked_clients(), 2);

        rl.check(ip(3), start + Duration::from_millis(150)).unwrap();

        assert_eq!(rl.tracked_clients(), 1);
    }
}
