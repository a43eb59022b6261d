//! Rate limiting for publish calls
//!
//! Prevents over-posting to a network by tracking posts per hour window.
//! The counters are process-wide and shared by every account task; the
//! core persists nothing, so the windows live in memory.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Posts-per-hour limiter keyed by network name.
pub struct RateLimiter {
    /// Network-specific limits (posts per hour)
    limits: HashMap<String, u32>,
    /// Post counts per (network, window start)
    windows: Mutex<HashMap<(String, i64), u32>>,
}

impl RateLimiter {
    pub fn new(limits: HashMap<String, u32>) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check if posting is allowed and record the post.
    ///
    /// Returns true if posting is allowed, false if rate limited. Networks
    /// without a configured limit are always allowed.
    pub fn check_and_record(&self, network: &str, now: i64) -> bool {
        let limit = match self.limits.get(network) {
            Some(l) => *l,
            None => return true,
        };

        let window_start = get_window_start(now);
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let count = windows
            .entry((network.to_string(), window_start))
            .or_insert(0);
        if *count >= limit {
            return false;
        }
        *count += 1;
        true
    }

    /// Drop windows that ended before `cutoff`.
    pub fn cleanup_old_windows(&self, cutoff: i64) {
        let cutoff_window = get_window_start(cutoff);
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        windows.retain(|(_, window_start), _| *window_start >= cutoff_window);
    }
}

/// Get the window start timestamp (floor to hour)
fn get_window_start(timestamp: i64) -> i64 {
    (timestamp / 3600) * 3600
}
