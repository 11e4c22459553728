//! Per-origin rate limiting for authentication-sensitive endpoints.
//!
//! Sliding-window counters keyed by client origin, with a periodic sweep of
//! idle keys so the map cannot grow without bound. A limit of 0 disables a
//! window. Blocked attempts perform no store access at all.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Registration window: one hour.
pub const REGISTER_WINDOW_SECS: u64 = 3600;

/// Login window: one minute.
pub const LOGIN_WINDOW_SECS: u64 = 60;

/// How often the limiter sweeps idle keys from its map.
const SWEEP_INTERVAL_SECS: u64 = 300; // 5 minutes

#[derive(Debug)]
struct SlidingWindow {
    limit_per_window: u32,
    window: Duration,
    requests: Mutex<(HashMap<String, Vec<Instant>>, Instant)>,
}

impl SlidingWindow {
    fn new(limit_per_window: u32, window: Duration) -> Self {
        Self {
            limit_per_window,
            window,
            requests: Mutex::new((HashMap::new(), Instant::now())),
        }
    }

    fn allow(&self, key: &str) -> bool {
        if self.limit_per_window == 0 {
            return true;
        }

        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or_else(Instant::now);

        let mut guard = self.requests.lock();
        let (requests, last_sweep) = &mut *guard;

        // Periodic sweep: remove keys with no recent requests
        if last_sweep.elapsed() >= Duration::from_secs(SWEEP_INTERVAL_SECS) {
            requests.retain(|_, timestamps| {
                timestamps.retain(|t| *t > cutoff);
                !timestamps.is_empty()
            });
            *last_sweep = now;
        }

        let entry = requests.entry(key.to_owned()).or_default();
        entry.retain(|instant| *instant > cutoff);

        if entry.len() >= self.limit_per_window as usize {
            return false;
        }

        entry.push(now);
        true
    }
}

/// Bounds the attempt rate of registration and login per client origin.
#[derive(Debug)]
pub struct RateLimiter {
    register: SlidingWindow,
    login: SlidingWindow,
}

impl RateLimiter {
    pub fn new(register_per_hour: u32, login_per_minute: u32) -> Self {
        Self {
            register: SlidingWindow::new(
                register_per_hour,
                Duration::from_secs(REGISTER_WINDOW_SECS),
            ),
            login: SlidingWindow::new(login_per_minute, Duration::from_secs(LOGIN_WINDOW_SECS)),
        }
    }

    /// Whether a registration attempt from this origin is allowed right now.
    pub fn allow_register(&self, key: &str) -> bool {
        self.register.allow(key)
    }

    /// Whether a login attempt from this origin is allowed right now.
    pub fn allow_login(&self, key: &str) -> bool {
        self.login.allow(key)
    }
}
