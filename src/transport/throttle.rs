//! Suppression of repeated error diagnostics
//!
//! During a sustained outage every send can fail. The throttle lets the
//! first error of a window through and counts the rest, so the error total
//! stays exact while the diagnostic output stays bounded.

use std::time::{Duration, Instant};

/// Outcome of offering an error to the throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Log this error; `suppressed` errors were swallowed since the last one
    Report { suppressed: u64 },
    /// Count this error without logging it
    Suppress,
}

#[derive(Debug, Clone)]
pub struct ErrorThrottle {
    interval: Duration,
    window_start: Option<Instant>,
    pending: u64,
    suppressed_total: u64,
}

impl ErrorThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: None,
            pending: 0,
            suppressed_total: 0,
        }
    }

    /// Decide whether an error observed at `now` should be logged
    pub fn check(&mut self, now: Instant) -> ThrottleDecision {
        match self.window_start {
            Some(start) if now.saturating_duration_since(start) < self.interval => {
                self.pending += 1;
                self.suppressed_total += 1;
                ThrottleDecision::Suppress
            }
            _ => {
                self.window_start = Some(now);
                let suppressed = std::mem::take(&mut self.pending);
                ThrottleDecision::Report { suppressed }
            }
        }
    }

    /// Errors swallowed over the throttle's lifetime
    pub fn suppressed_total(&self) -> u64 {
        self.suppressed_total
    }
}
