//! Minimum-interval rate limiter for broker queries.
//!
//! Upstream history APIs enforce per-client pacing; callers that arrive
//! before the interval elapses receive a "throttled" outcome rather than
//! blocking.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Enforces a minimum interval between successive acquisitions.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Try to acquire a slot. Returns `true` and records the acquisition
    /// when the interval has elapsed; `false` otherwise.
    pub fn try_acquire(&self) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Time remaining until the next acquisition would succeed.
    #[must_use]
    pub fn time_until_ready(&self) -> Duration {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.map_or(Duration::ZERO, |at| {
            self.min_interval.saturating_sub(at.elapsed())
        })
    }
}
