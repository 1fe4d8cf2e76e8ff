//! Admission control for unauthenticated callers.
//!
//! The public booking channel is open to anyone, so every request first asks
//! an [`AdmissionGate`] keyed by the caller's address.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

pub trait AdmissionGate: Send + Sync {
    /// Returns `false` when `key` has exhausted its allowance.
    fn admit(&self, key: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    requests: u32,
    started: Instant,
}

/// Fixed-window counter per key: at most `max_requests` per `window`.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub const DEFAULT_MAX_REQUESTS: u32 = 5;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    fn admit_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        windows.retain(|_, w| now.duration_since(w.started) < self.window);

        let entry = windows.entry(key.to_string()).or_insert(Window {
            requests: 0,
            started: now,
        });
        if entry.requests >= self.max_requests {
            return false;
        }
        entry.requests += 1;
        true
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_REQUESTS, Self::DEFAULT_WINDOW)
    }
}

impl AdmissionGate for FixedWindowLimiter {
    fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }
}

/// Lets everything through.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl AdmissionGate for Unlimited {
    fn admit(&self, _key: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_request_in_window_is_refused() {
        let limiter = FixedWindowLimiter::default();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.admit_at("10.0.0.1", now));
        }
        assert!(!limiter.admit_at("10.0.0.1", now));
        // Other callers are unaffected.
        assert!(limiter.admit_at("10.0.0.2", now));
    }

    #[test]
    fn window_expiry_resets_allowance() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.admit_at("k", now));
        assert!(!limiter.admit_at("k", now + Duration::from_secs(59)));
        assert!(limiter.admit_at("k", now + Duration::from_secs(60)));
    }
}
