//! Bounded blocking FIFO queue built as a monitor.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::cancel::{CancelToken, SharedWaker, Waker};
use crate::errors::{QueueError, QueueResult};

/// A capacity bounded, thread-safe FIFO queue.
///
/// One mutex guards the items; `not_full` parks producers while the queue
/// holds `capacity` items and `not_empty` parks consumers while it holds
/// none. Every successful operation broadcasts to the opposite side.
///
/// Cloning is cheap and yields another handle onto the same queue.
///
/// Storage grows with the queued items, so any positive `capacity` is
/// accepted, including `usize::MAX` for an effectively unbounded queue.
///
/// # Item bounds
///
/// The blocking operations register the queue itself as a [`Waker`] on the
/// caller's [`CancelToken`], which needs `T: Send + 'static`. A queue of
/// borrowed items (for example one shared between `std::thread::scope`
/// threads) can still be built, inspected and cleared, but cannot call
/// [`Self::enqueue`] or [`Self::dequeue`].
///
/// # Examples
///
/// ```
/// use foundation_monitor::BoundedBlockingQueue;
///
/// let queue = BoundedBlockingQueue::new(3).unwrap();
/// queue.enqueue("a").unwrap();
/// queue.enqueue("b").unwrap();
///
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.dequeue().unwrap(), "a");
/// assert_eq!(queue.dequeue().unwrap(), "b");
/// assert!(queue.is_empty());
/// ```
pub struct BoundedBlockingQueue<T> {
    monitor: Arc<Monitor<T>>,
}

struct Monitor<T> {
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> Monitor<T> {
    // Every mutation leaves the deque valid, so a poisoned lock is still
    // safe to keep using.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_not_full<'a>(&self, guard: MutexGuard<'a, VecDeque<T>>) -> MutexGuard<'a, VecDeque<T>> {
        self.not_full
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_not_empty<'a>(
        &self,
        guard: MutexGuard<'a, VecDeque<T>>,
    ) -> MutexGuard<'a, VecDeque<T>> {
        self.not_empty
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Waker for Monitor<T> {
    fn wake(&self) {
        // Passing through the lock orders this wake after any waiter that
        // already checked its token but has not parked yet.
        drop(self.lock());
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

impl<T> Clone for BoundedBlockingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            monitor: Arc::clone(&self.monitor),
        }
    }
}

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBlockingQueue")
            .field("len", &self.len())
            .field("capacity", &self.monitor.capacity)
            .finish()
    }
}

// --- constructors

impl<T> BoundedBlockingQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> QueueResult<Self> {
        Self::with_items(capacity, std::iter::empty())
    }

    /// Creates a queue already holding `items`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] when `capacity` is zero and
    /// [`QueueError::SeedOverflow`] when `items` does not fit.
    pub fn with_items<I>(capacity: usize, items: I) -> QueueResult<Self>
    where
        I: IntoIterator<Item = T>,
    {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity(capacity));
        }

        // Capacity is only the backpressure bound; storage grows on demand.
        let seeded: VecDeque<T> = items.into_iter().collect();
        if seeded.len() > capacity {
            return Err(QueueError::SeedOverflow {
                capacity,
                supplied: seeded.len(),
            });
        }

        Ok(Self {
            monitor: Arc::new(Monitor {
                items: Mutex::new(seeded),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                capacity,
            }),
        })
    }
}

// --- introspection

impl<T> BoundedBlockingQueue<T> {
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.monitor.capacity
    }

    /// Number of queued items at the instant the lock was held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.monitor.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.monitor.capacity
    }

    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.monitor.capacity.saturating_sub(self.len())
    }

    /// Takes a consistent snapshot of every size related figure at once.
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        let len = self.len();
        QueueStatus {
            len,
            capacity: self.monitor.capacity,
        }
    }

    /// Removes every queued item and wakes all blocked producers.
    ///
    /// Returns how many items were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.monitor.lock();
        let removed = items.len();
        items.clear();
        drop(items);

        if removed > 0 {
            self.monitor.not_full.notify_all();
        }
        tracing::debug!(removed, "BoundedBlockingQueue cleared");
        removed
    }
}

// --- blocking operations

impl<T: Send + 'static> BoundedBlockingQueue<T> {
    /// Appends `item`, blocking while the queue is full.
    ///
    /// The wait is interruptible through the calling thread's ambient
    /// [`CancelToken::current`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`] if the ambient token was cancelled
    /// while this call was waiting; `item` is dropped and the queue is
    /// untouched.
    pub fn enqueue(&self, item: T) -> QueueResult<()> {
        self.enqueue_with(item, &CancelToken::current())
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`] if the ambient token was cancelled
    /// while this call was waiting.
    pub fn dequeue(&self) -> QueueResult<T> {
        self.dequeue_with(&CancelToken::current())
    }

    /// Like [`Self::enqueue`] but interruptible through `token`.
    ///
    /// Cancellation only interrupts waiting: if there is room the item is
    /// appended even when `token` is already cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`] if `token` is cancelled while the
    /// queue is full.
    pub fn enqueue_with(&self, item: T, token: &CancelToken) -> QueueResult<()> {
        let mut items = self.monitor.lock();

        if items.len() >= self.monitor.capacity {
            let _registration = token.register(self.waker());
            while items.len() >= self.monitor.capacity {
                if token.is_cancelled() {
                    tracing::debug!(
                        len = items.len(),
                        "enqueue cancelled while waiting for space"
                    );
                    return Err(QueueError::Cancelled);
                }

                tracing::debug!(
                    capacity = self.monitor.capacity,
                    "queue is full, enqueue waiting"
                );
                items = self.monitor.wait_not_full(items);
            }
        }

        items.push_back(item);
        tracing::trace!(len = items.len(), "enqueued item");
        drop(items);

        self.monitor.not_empty.notify_all();
        Ok(())
    }

    /// Like [`Self::dequeue`] but interruptible through `token`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`] if `token` is cancelled while the
    /// queue is empty.
    pub fn dequeue_with(&self, token: &CancelToken) -> QueueResult<T> {
        let mut items = self.monitor.lock();
        let mut registration = None;

        let item = loop {
            if let Some(item) = items.pop_front() {
                break item;
            }

            registration.get_or_insert_with(|| token.register(self.waker()));
            if token.is_cancelled() {
                tracing::debug!("dequeue cancelled while waiting for an item");
                return Err(QueueError::Cancelled);
            }

            tracing::debug!("queue is empty, dequeue waiting");
            items = self.monitor.wait_not_empty(items);
        };

        tracing::trace!(len = items.len(), "dequeued item");
        drop(registration);
        drop(items);

        self.monitor.not_full.notify_all();
        Ok(item)
    }

    fn waker(&self) -> SharedWaker {
        self.monitor.clone()
    }
}

/// Point in time view of a queue's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub len: usize,
    pub capacity: usize,
}

impl QueueStatus {
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Queue Status ===")?;
        writeln!(f, "Length: {}", self.len)?;
        writeln!(f, "Capacity: {}", self.capacity)?;
        writeln!(f, "Remaining: {}", self.remaining())?;
        writeln!(f, "Empty: {}", self.is_empty())?;
        write!(f, "Full: {}", self.is_full())
    }
}

#[cfg(test)]
mod test_bounded_blocking_queue {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use ntest::timeout;
    use tracing_test::traced_test;

    use super::{BoundedBlockingQueue, QueueStatus};
    use crate::cancel::{self, CancelToken};
    use crate::errors::QueueError;

    #[test]
    fn rejects_zero_capacity() {
        let result = BoundedBlockingQueue::<u8>::new(0);
        assert!(matches!(result, Err(QueueError::InvalidCapacity(0))));
    }

    #[test]
    fn huge_capacity_is_a_bound_not_an_allocation() {
        let queue = BoundedBlockingQueue::<u64>::new(usize::MAX).expect("positive capacity");
        assert_eq!(queue.capacity(), usize::MAX);
        assert_eq!(queue.remaining_capacity(), usize::MAX);

        queue.enqueue(1).expect("room available");
        assert_eq!(queue.remaining_capacity(), usize::MAX - 1);
        assert_eq!(queue.dequeue(), Ok(1));

        let seeded = BoundedBlockingQueue::with_items(1 << 40, [1u64, 2]).expect("fits");
        assert_eq!(seeded.len(), 2);
        assert_eq!(seeded.capacity(), 1 << 40);
    }

    #[test]
    fn borrowed_items_support_non_blocking_calls() {
        let words = String::from("alpha beta gamma");
        let queue = BoundedBlockingQueue::with_items(4, words.split(' ')).expect("fits");

        let seen = thread::scope(|scope| {
            scope
                .spawn(|| (queue.len(), queue.is_full(), queue.status().remaining()))
                .join()
                .expect("should join")
        });

        assert_eq!(seen, (3, false, 1));
        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn rejects_seed_larger_than_capacity() {
        let result = BoundedBlockingQueue::with_items(2, [1, 2, 3]);
        assert_eq!(
            result.err(),
            Some(QueueError::SeedOverflow {
                capacity: 2,
                supplied: 3
            })
        );
    }

    #[test]
    fn dequeues_in_insertion_order() {
        let queue = BoundedBlockingQueue::new(5).expect("valid capacity");
        for item in 1..=5 {
            queue.enqueue(item).expect("room available");
        }

        let drained: Vec<_> = (0..5)
            .map(|_| queue.dequeue().expect("item available"))
            .collect();
        assert_eq!(drained, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn seeded_queue_starts_full() {
        let queue = BoundedBlockingQueue::with_items(3, ["x", "y", "z"]).expect("fits");
        assert!(queue.is_full());
        assert_eq!(queue.remaining_capacity(), 0);
        assert_eq!(queue.dequeue().expect("seeded"), "x");
        assert_eq!(queue.remaining_capacity(), 1);
    }

    #[test]
    fn status_reflects_occupancy() {
        let queue = BoundedBlockingQueue::with_items(4, [1, 2]).expect("fits");
        let status = queue.status();

        assert_eq!(
            status,
            QueueStatus {
                len: 2,
                capacity: 4
            }
        );
        assert_eq!(status.remaining(), 2);
        assert!(!status.is_empty());
        assert!(!status.is_full());
        assert!(status.to_string().contains("Remaining: 2"));
    }

    #[test]
    #[timeout(5000)]
    fn enqueue_blocks_until_a_slot_opens() {
        let queue = BoundedBlockingQueue::new(1).expect("valid capacity");
        queue.enqueue(1).expect("room available");

        let producer_queue = queue.clone();
        let producer = thread::spawn(move || producer_queue.enqueue(2));

        thread::sleep(Duration::from_millis(100));
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.dequeue().expect("item available"), 1);
        producer
            .join()
            .expect("should join")
            .expect("not cancelled");

        assert_eq!(queue.dequeue().expect("item available"), 2);
    }

    #[test]
    #[timeout(5000)]
    fn dequeue_blocks_until_an_item_arrives() {
        let queue = BoundedBlockingQueue::<String>::new(2).expect("valid capacity");

        let consumer_queue = queue.clone();
        let consumer = thread::spawn(move || consumer_queue.dequeue());

        thread::sleep(Duration::from_millis(100));
        assert!(!consumer.is_finished());

        queue
            .enqueue(String::from("payload"))
            .expect("room available");
        let received = consumer
            .join()
            .expect("should join")
            .expect("not cancelled");
        assert_eq!(received, "payload");
        assert!(queue.is_empty());
    }

    #[test]
    #[timeout(5000)]
    fn cancelling_a_blocked_enqueue_leaves_queue_untouched() {
        let queue = BoundedBlockingQueue::with_items(2, [10, 20]).expect("fits");
        let (started_tx, started_rx) = mpsc::channel::<()>();

        let producer_queue = queue.clone();
        let producer = cancel::spawn(move || {
            started_tx.send(()).expect("should send");
            let result = producer_queue.enqueue(30);
            (result, CancelToken::current().is_cancelled())
        });

        started_rx.recv().expect("producer should start");
        thread::sleep(Duration::from_millis(50));
        assert!(producer.cancel());

        let (result, still_cancelled) = producer.join().expect("should join");
        assert_eq!(result, Err(QueueError::Cancelled));
        assert!(still_cancelled);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().expect("seeded"), 10);
        assert_eq!(queue.dequeue().expect("seeded"), 20);
    }

    #[test]
    #[timeout(5000)]
    fn cancelling_a_blocked_dequeue_returns_cancelled() {
        let queue = BoundedBlockingQueue::<u32>::new(1).expect("valid capacity");
        let token = CancelToken::new();

        let consumer_queue = queue.clone();
        let consumer_token = token.clone();
        let consumer = thread::spawn(move || consumer_queue.dequeue_with(&consumer_token));

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let result = consumer.join().expect("should join");
        assert_eq!(result, Err(QueueError::Cancelled));
        assert_eq!(token.registered_wakers(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    #[traced_test]
    fn cancelled_token_does_not_block_an_operation_that_can_proceed() {
        let queue = BoundedBlockingQueue::new(1).expect("valid capacity");
        let token = CancelToken::new();
        token.cancel();

        queue.enqueue_with(7, &token).expect("room available");
        assert_eq!(queue.enqueue_with(8, &token), Err(QueueError::Cancelled));
        assert_eq!(queue.dequeue_with(&token), Ok(7));
        assert_eq!(queue.dequeue_with(&token), Err(QueueError::Cancelled));
        assert!(logs_contain("enqueue cancelled while waiting for space"));
        assert!(logs_contain("dequeue cancelled while waiting for an item"));
    }

    #[test]
    fn reset_token_can_retry() {
        let queue = BoundedBlockingQueue::with_items(1, [1]).expect("fits");
        let token = CancelToken::new();
        token.cancel();

        assert_eq!(queue.enqueue_with(2, &token), Err(QueueError::Cancelled));
        queue.dequeue().expect("seeded");

        assert!(token.reset());
        queue.enqueue_with(2, &token).expect("room after dequeue");
        assert_eq!(queue.dequeue().expect("retried item"), 2);
    }

    #[test]
    #[timeout(5000)]
    fn clear_releases_blocked_producers() {
        let queue = BoundedBlockingQueue::with_items(2, [1, 2]).expect("fits");

        let producer_queue = queue.clone();
        let producer = thread::spawn(move || producer_queue.enqueue(3));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.clear(), 2);

        producer
            .join()
            .expect("should join")
            .expect("not cancelled");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue().expect("item available"), 3);
    }

    #[test]
    fn survives_a_panic_in_another_holder() {
        let queue = BoundedBlockingQueue::with_items(3, [1]).expect("fits");

        let poisoned = queue.clone();
        let outcome = thread::spawn(move || {
            let _guard = poisoned.monitor.lock();
            panic!("poison the monitor");
        })
        .join();
        assert!(outcome.is_err());

        queue.enqueue(2).expect("room available");
        assert_eq!(queue.dequeue().expect("seeded"), 1);
        assert_eq!(queue.dequeue().expect("item available"), 2);
    }

    #[test]
    fn debug_output_shows_occupancy() {
        let queue = BoundedBlockingQueue::with_items(4, [1]).expect("fits");
        assert_eq!(
            format!("{queue:?}"),
            "BoundedBlockingQueue { len: 1, capacity: 4 }"
        );
    }
}
