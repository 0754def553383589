//! Fixed-window request counter.

use parking_lot::Mutex;
use std::time::Duration;

/// The admission ceiling and window length for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitRule {
    /// Maximum requests admitted within one window
    pub max_requests: u64,
    /// Length of the window
    pub window: Duration,
}

impl LimitRule {
    /// Create a rule admitting `max_requests` per `window`.
    pub const fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Create a rule admitting `max_requests` per minute.
    pub const fn per_minute(max_requests: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

#[derive(Debug)]
struct WindowState {
    count: u64,
    window_start: u64,
}

/// Request counter for a single (client, category) pair.
///
/// The `(count, window_start)` pair is guarded by a mutex owned by this
/// counter alone, so contention on one client never blocks another.
#[derive(Debug)]
pub struct RequestCounter {
    state: Mutex<WindowState>,
}

impl RequestCounter {
    /// Create a counter whose first window opens at `now_millis`.
    pub fn new(now_millis: u64) -> Self {
        Self {
            state: Mutex::new(WindowState {
                count: 0,
                window_start: now_millis,
            }),
        }
    }

    /// Count one request at `now_millis` and report whether it is admitted.
    ///
    /// The window resets only when strictly more than `rule.window` has
    /// elapsed since it opened; a request landing exactly on the boundary
    /// still counts against the old window.
    pub fn check_and_increment(&self, now_millis: u64, rule: &LimitRule) -> bool {
        let mut state = self.state.lock();

        let window_ms = rule.window.as_millis() as u64;
        if now_millis.saturating_sub(state.window_start) > window_ms {
            state.count = 0;
            state.window_start = now_millis;
        }

        state.count += 1;
        state.count <= rule.max_requests
    }

    /// Requests counted in the current window, as of the last check.
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// When the current window opened, in epoch millis.
    pub fn window_start(&self) -> u64 {
        self.state.lock().window_start
    }
}
