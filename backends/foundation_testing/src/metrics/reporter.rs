//! Run report generation.

use core::time::Duration;
use std::fmt;

/// Outcome of one queue scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Scenario name, used as the report title
    pub scenario: String,
    /// Items enqueued during the run
    pub produced: usize,
    /// Items dequeued during the run
    pub consumed: usize,
    /// Running sum of produced minus consumed items
    pub sum_balance: i64,
    /// Queue length when the run finished
    pub queue_len: usize,
    /// Threads cancelled because they were still blocked at the deadline
    pub cancelled_threads: usize,
    /// Wall clock time of the run
    pub duration: Duration,
}

impl RunReport {
    /// Returns true when every produced item has been consumed.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.sum_balance == 0
    }

    /// Returns the number of enqueue and dequeue calls that completed.
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.produced + self.consumed
    }

    /// Returns operations per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_operations() as f64 / secs
        } else {
            0.0
        }
    }

    /// Generates a human-readable report.
    #[must_use]
    pub fn to_string_pretty(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("=== {} ===\n", self.scenario));
        report.push_str(&format!("Produced: {}\n", self.produced));
        report.push_str(&format!("Consumed: {}\n", self.consumed));
        report.push_str(&format!("Queue length: {}\n", self.queue_len));
        report.push_str(&format!(
            "Sum balance: {} ({})\n",
            self.sum_balance,
            if self.is_balanced() { "ok" } else { "pending" }
        ));
        if self.cancelled_threads > 0 {
            report.push_str(&format!(
                "Cancelled threads: {}\n",
                self.cancelled_threads
            ));
        }
        report.push_str(&format!("Duration: {:?}\n", self.duration));
        report.push_str(&format!(
            "Throughput: {:.2} ops/sec\n",
            self.operations_per_second()
        ));

        report
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_pretty())
    }
}
