//! Shipper counters for observability
//!
//! Process-lifetime counters that make shipping loss visible: every
//! record handed to the shipper is counted once in `total`, then once more
//! in either `sent` or `discarded`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for shipper observability
///
/// # Example
///
/// ```
/// use udp_log_shipper::ShipperMetrics;
///
/// let metrics = ShipperMetrics::new();
///
/// metrics.record_received();
/// metrics.record_discarded();
///
/// assert_eq!(metrics.total(), 1);
/// assert_eq!(metrics.discarded(), 1);
/// ```
#[derive(Debug)]
pub struct ShipperMetrics {
    /// Records handed to the shipper
    total: AtomicU64,

    /// Records handed to a ready socket
    sent: AtomicU64,

    /// Records dropped for any reason
    discarded: AtomicU64,

    /// Records dropped because their stream had no resolvable path
    unresolved: AtomicU64,
}

impl ShipperMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            unresolved: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn unresolved(&self) -> u64 {
        self.unresolved.load(Ordering::Relaxed)
    }

    /// Record a record entering the shipper
    #[inline]
    pub fn record_received(&self) -> u64 {
        self.total.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a record handed to the socket
    #[inline]
    pub fn record_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a dropped record
    #[inline]
    pub fn record_discarded(&self) -> u64 {
        self.discarded.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a record dropped on path resolution failure
    ///
    /// Also counts it as discarded.
    #[inline]
    pub fn record_unresolved(&self) -> u64 {
        self.record_discarded();
        self.unresolved.fetch_add(1, Ordering::Relaxed)
    }

    /// Get discard rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if no records have been handled.
    pub fn discard_rate(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            0.0
        } else {
            (self.discarded() as f64 / total) * 100.0
        }
    }
}

impl Default for ShipperMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ShipperMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            total: AtomicU64::new(self.total()),
            sent: AtomicU64::new(self.sent()),
            discarded: AtomicU64::new(self.discarded()),
            unresolved: AtomicU64::new(self.unresolved()),
        }
    }
}
