//! Shared counters and run reports for queue scenarios.

pub mod reporter;

pub use reporter::RunReport;

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Counters shared by every producer and consumer of a scenario.
///
/// `sum` grows by each produced item and shrinks by each consumed one, so
/// once every produced item has been consumed it returns to zero.
#[derive(Debug, Default)]
pub struct Counters {
    produced: AtomicUsize,
    consumed: AtomicUsize,
    sum: AtomicI64,
}

impl Counters {
    /// Creates zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            produced: AtomicUsize::new(0),
            consumed: AtomicUsize::new(0),
            sum: AtomicI64::new(0),
        }
    }

    /// Records an item that made it into the queue.
    pub fn record_produced(&self, item: i64) {
        self.produced.fetch_add(1, Ordering::SeqCst);
        self.sum.fetch_add(item, Ordering::SeqCst);
    }

    /// Records an item taken out of the queue.
    pub fn record_consumed(&self, item: i64) {
        self.consumed.fetch_add(1, Ordering::SeqCst);
        self.sum.fetch_sub(item, Ordering::SeqCst);
    }

    /// Items produced since the last reset.
    #[must_use]
    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }

    /// Items consumed since the last reset.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }

    /// Sum of produced items minus sum of consumed items.
    #[must_use]
    pub fn sum(&self) -> i64 {
        self.sum.load(Ordering::SeqCst)
    }

    /// Zeroes the produced and consumed counts, keeping the running sum.
    pub fn reset_counts(&self) {
        self.produced.store(0, Ordering::SeqCst);
        self.consumed.store(0, Ordering::SeqCst);
    }

    /// Zeroes everything, including the running sum.
    pub fn reset(&self) {
        self.reset_counts();
        self.sum.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::Counters;

    #[test]
    fn sum_balances_once_everything_is_consumed() {
        let counters = Counters::new();
        for item in [3, 5, 8] {
            counters.record_produced(item);
        }
        counters.record_consumed(5);
        assert_eq!(counters.sum(), 11);

        counters.record_consumed(3);
        counters.record_consumed(8);
        assert_eq!(counters.produced(), 3);
        assert_eq!(counters.consumed(), 3);
        assert_eq!(counters.sum(), 0);
    }

    #[test]
    fn reset_counts_keeps_sum() {
        let counters = Counters::new();
        counters.record_produced(7);
        counters.reset_counts();
        assert_eq!(counters.produced(), 0);
        assert_eq!(counters.sum(), 7);

        counters.reset();
        assert_eq!(counters.sum(), 0);
    }
}
