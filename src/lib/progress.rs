//! Progress tracking utilities
//!
//! This module provides a thread-safe progress tracker for logging progress at regular intervals.
//! The tracker maintains an internal count and logs when interval boundaries are crossed.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe progress tracker for logging progress at regular intervals.
///
/// Maintains an internal count and logs progress messages when the count crosses
/// interval boundaries. Safe to share across worker threads.
///
/// # Example
/// ```
/// use varsum_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Scanned records").with_interval(100);
///
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // Logs at 100, 200
/// }
/// tracker.log_final(); // Logs "Scanned records 250 (complete)"
/// ```
pub struct ProgressTracker {
    /// The logging interval - progress is logged when count crosses multiples of this.
    interval: u64,
    /// Message prefix for log output.
    message: String,
    /// Internal count of items processed (thread-safe).
    count: AtomicU64,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified message.
    ///
    /// The tracker starts with a count of 0 and a default interval of 100,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 100_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Set the logging interval.
    ///
    /// Progress will be logged each time the count crosses a multiple of this interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Add to the count and log if an interval boundary was crossed.
    ///
    /// Atomically adds `additional` to the internal count and logs progress
    /// for each interval boundary crossed, so bulk additions behave the same
    /// as incrementing one item at a time.
    ///
    /// # Returns
    /// `true` if the final count is exactly a multiple of the interval. This
    /// lets [`log_final`](Self::log_final) know whether a closing message is
    /// still needed.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        if additional == 0 {
            // No change, just check if current count is on interval
            let count = self.count.load(Ordering::Relaxed);
            return count > 0 && count.is_multiple_of(self.interval);
        }

        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let new_count = prev + additional;

        // Log once per interval boundary crossed
        let prev_intervals = prev / self.interval;
        let new_intervals = new_count / self.interval;
        for i in (prev_intervals + 1)..=new_intervals {
            let milestone = i * self.interval;
            info!("{} {}", self.message, milestone);
        }

        new_count.is_multiple_of(self.interval)
    }

    /// Log final progress.
    ///
    /// If the current count is not exactly on an interval boundary, logs a
    /// final message with "(complete)". Counts landing exactly on an interval
    /// were already logged by the last `log_if_needed` call.
    pub fn log_final(&self) {
        if !self.log_if_needed(0) {
            let count = self.count.load(Ordering::Relaxed);
            if count > 0 {
                info!("{} {} (complete)", self.message, count);
            }
        }
    }

    /// Get the current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
