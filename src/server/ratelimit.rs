use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// Rate limiter configuration.
pub struct RateLimiterConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Per-identity fixed-window request counter.
///
/// Each identity gets a counter anchored to the instant its current window
/// started. A request inside a live window increments the counter until the
/// limit is hit; the first request after the window elapses starts a fresh
/// one. Fixed windows deliberately trade precision for simplicity: a client
/// can land up to twice the limit across a window boundary.
///
/// State lives only in process memory and resets on restart.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<Uuid, WindowState>,
}

struct WindowState {
    started: Instant,
    count: u32,
}

/// Outcome of a rate limit check.
#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { limit: u32, retry_after: Duration },
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            windows: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and count one request for the given identity.
    ///
    /// The map entry guard keeps the read-check-increment atomic per key;
    /// unrelated identities proceed in parallel on other shards. A missing
    /// entry is simply the identity's first request.
    pub fn check_and_increment(&self, identity_id: Uuid) -> Decision {
        let now = Instant::now();
        let mut entry = self.windows.entry(identity_id).or_insert(WindowState {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            Decision::Allowed {
                remaining: self.max_requests - entry.count,
            }
        } else {
            Decision::Limited {
                limit: self.max_requests,
                retry_after: self.window - now.duration_since(entry.started),
            }
        }
    }

    /// Remove entries whose window started more than `max_age` ago, so the
    /// table does not grow with every identity ever seen.
    pub fn cleanup(&self, max_age: Duration) {
        self.windows.retain(|_, state| state.started.elapsed() <= max_age);
    }
}
