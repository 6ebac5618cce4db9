use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Fixed-window limiter: at most `limit` checks per `interval`
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    limit: u64,
    window: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
    started: Option<Instant>,
    used: u64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(interval: Duration, limit: u64) -> Self {
        Self {
            interval,
            limit,
            window: Mutex::new(Window {
                started: None,
                used: 0,
            }),
        }
    }

    /// Take one check from the current window if any remain
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = window
            .started
            .is_none_or(|started| now.saturating_duration_since(started) >= self.interval);
        if expired {
            window.started = Some(now);
            window.used = 0;
        }
        if window.used < self.limit {
            window.used += 1;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_exhausts_and_resets() {
        let limiter = RateLimiter::new(Duration::from_secs(10), 2);
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(1)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(9)));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_limit_never_admits() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 0);
        assert!(!limiter.try_acquire());
    }
}
