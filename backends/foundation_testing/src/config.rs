//! Queue scenario configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for queue scenarios.
///
/// Deserializes from a partial document; missing keys keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Queue capacity
    capacity: usize,
    /// Number of producer threads
    producers: usize,
    /// Number of consumer threads
    consumers: usize,
    /// Items each producer enqueues
    items_per_producer: usize,
    /// Items each consumer dequeues
    items_per_consumer: usize,
    /// How long a scenario waits on its threads before cancelling them
    timeout_secs: u64,
}

impl HarnessConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults:
    /// - `capacity`: 100
    /// - `producers` / `consumers`: 10
    /// - `items_per_producer` / `items_per_consumer`: 100
    /// - `timeout_secs`: 30
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capacity: 100,
            producers: 10,
            consumers: 10,
            items_per_producer: 100,
            items_per_consumer: 100,
            timeout_secs: 30,
        }
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of producer threads.
    #[must_use]
    pub const fn producers(mut self, count: usize) -> Self {
        self.producers = count;
        self
    }

    /// Sets the number of consumer threads.
    #[must_use]
    pub const fn consumers(mut self, count: usize) -> Self {
        self.consumers = count;
        self
    }

    /// Sets how many items every producer and every consumer handles.
    #[must_use]
    pub const fn items(mut self, count: usize) -> Self {
        self.items_per_producer = count;
        self.items_per_consumer = count;
        self
    }

    /// Sets the number of items each producer enqueues.
    #[must_use]
    pub const fn items_per_producer(mut self, count: usize) -> Self {
        self.items_per_producer = count;
        self
    }

    /// Sets the number of items each consumer dequeues.
    #[must_use]
    pub const fn items_per_consumer(mut self, count: usize) -> Self {
        self.items_per_consumer = count;
        self
    }

    /// Sets the join timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Returns the queue capacity.
    #[must_use]
    pub const fn get_capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the producer count.
    #[must_use]
    pub const fn get_producers(&self) -> usize {
        self.producers
    }

    /// Returns the consumer count.
    #[must_use]
    pub const fn get_consumers(&self) -> usize {
        self.consumers
    }

    /// Returns the per producer item count.
    #[must_use]
    pub const fn get_items_per_producer(&self) -> usize {
        self.items_per_producer
    }

    /// Returns the per consumer item count.
    #[must_use]
    pub const fn get_items_per_consumer(&self) -> usize {
        self.items_per_consumer
    }

    /// Returns the join timeout.
    #[must_use]
    pub const fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new()
    }
}
