//! Rate limiting for failure log lines.
//!
//! A window opens on the first error seen after the previous window lapsed.
//! Errors inside the window are counted; once the count reaches the limit the
//! rest of the window is silent. There is no background reset: a stale window
//! is only replaced when the next error arrives.

use crate::config::{ThrottleConfig, DEFAULT_THROTTLE_MAX_ERRORS, DEFAULT_THROTTLE_WINDOW};
use crate::utils::time::{Clock, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared across all connections. Two independent atomics; a race right at
/// the window edge may over or under count by one, but no increment is lost.
pub struct ErrorLogThrottle {
    window_start: AtomicU64,
    errors_in_window: AtomicU64,
    window_millis: u64,
    max_errors: u64,
    clock: Arc<dyn Clock>,
}

impl ErrorLogThrottle {
    pub fn new(window: Duration, max_errors: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            window_start: AtomicU64::new(0),
            errors_in_window: AtomicU64::new(0),
            window_millis: window.as_millis() as u64,
            max_errors,
            clock,
        }
    }

    pub fn from_config(config: &ThrottleConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.window, config.max_errors, clock)
    }

    /// Record an error and report whether its log line must be suppressed
    pub fn should_throttle(&self) -> bool {
        let now = self.clock.now_millis();
        let window_start = self.window_start.load(Ordering::Acquire);

        if now <= window_start.saturating_add(self.window_millis) {
            let errors = self.errors_in_window.fetch_add(1, Ordering::AcqRel) + 1;
            errors >= self.max_errors
        } else {
            self.window_start.store(now, Ordering::Release);
            self.errors_in_window.store(0, Ordering::Release);
            false
        }
    }

    pub fn errors_in_window(&self) -> u64 {
        self.errors_in_window.load(Ordering::Acquire)
    }
}

impl Default for ErrorLogThrottle {
    fn default() -> Self {
        Self::new(
            DEFAULT_THROTTLE_WINDOW,
            DEFAULT_THROTTLE_MAX_ERRORS,
            Arc::new(SystemClock),
        )
    }
}
