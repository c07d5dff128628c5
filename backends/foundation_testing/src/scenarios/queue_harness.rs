//! Producer/consumer scenarios driven against a shared `BoundedBlockingQueue`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use foundation_monitor::cancel::{self, CancelToken, CancellableThread};
use foundation_monitor::{BoundedBlockingQueue, QueueResult, QueueStatus};

use crate::config::HarnessConfig;
use crate::metrics::{Counters, RunReport};
use crate::stress::{cancelled_at_deadline, join_until, StressHarness};

/// Runs producer and consumer threads against one queue and keeps score.
///
/// Counts are reset at the start of every scenario while the running sum
/// carries over until [`QueueHarness::clear`], so a producers-only run
/// followed by a consumers-only run that drains the queue ends balanced.
///
/// # Examples
///
/// ```
/// use foundation_testing::{HarnessConfig, QueueHarness};
///
/// let harness = QueueHarness::new(&HarnessConfig::new().capacity(100)).unwrap();
///
/// let produced = harness.run_producers(5, 20);
/// assert_eq!(produced.produced, 100);
/// assert_eq!(produced.queue_len, 100);
///
/// let consumed = harness.run_consumers(5, 20);
/// assert_eq!(consumed.consumed, 100);
/// assert!(consumed.is_balanced());
/// ```
#[derive(Debug)]
pub struct QueueHarness {
    queue: BoundedBlockingQueue<i64>,
    counters: Arc<Counters>,
    config: HarnessConfig,
    next_run: AtomicU64,
    /// Tokens of worker threads still owned by a running scenario.
    running: Mutex<Vec<(u64, CancelToken)>>,
    interrupted: AtomicBool,
}

impl QueueHarness {
    /// Creates a harness over a fresh queue of the configured capacity.
    ///
    /// # Errors
    ///
    /// Returns [`foundation_monitor::QueueError::InvalidCapacity`] when the
    /// configured capacity is zero.
    pub fn new(config: &HarnessConfig) -> QueueResult<Self> {
        Ok(Self {
            queue: BoundedBlockingQueue::new(config.get_capacity())?,
            counters: Arc::new(Counters::new()),
            config: *config,
            next_run: AtomicU64::new(0),
            running: Mutex::new(Vec::new()),
            interrupted: AtomicBool::new(false),
        })
    }

    /// Cancels every worker of every scenario currently running.
    ///
    /// Returns how many workers were cancelled by this call.
    pub fn cancel_running(&self) -> usize {
        let cancelled = self
            .running()
            .iter()
            .filter(|(_, token)| token.cancel())
            .count();
        tracing::warn!(cancelled, "cancelled running scenario threads");
        cancelled
    }

    /// Stops the harness for good: cancels every running worker and every
    /// worker spawned from now on, so later scenarios end straight away.
    ///
    /// Returns how many running workers were cancelled by this call.
    pub fn interrupt(&self) -> usize {
        self.interrupted.store(true, Ordering::SeqCst);
        self.cancel_running()
    }

    /// Whether [`Self::interrupt`] has been called.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Returns the queue under test.
    #[must_use]
    pub const fn queue(&self) -> &BoundedBlockingQueue<i64> {
        &self.queue
    }

    /// Returns the shared counters.
    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Returns the queue's occupancy.
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Fills the queue from the calling thread.
    ///
    /// Items count towards the running sum so a later drain balances out.
    ///
    /// # Errors
    ///
    /// Returns [`foundation_monitor::QueueError::Cancelled`] if the calling
    /// thread's token is cancelled while the queue is full. Items enqueued
    /// before that remain queued and counted.
    pub fn initialize(&self, data: &[i64]) -> QueueResult<usize> {
        tracing::info!(capacity = self.queue.capacity(), items = data.len(), "initializing queue");
        for &item in data {
            self.queue.enqueue(item)?;
            self.counters.record_produced(item);
        }
        Ok(data.len())
    }

    /// Runs the configured mixed scenario.
    #[must_use]
    pub fn run_configured(&self) -> RunReport {
        self.run_mixed(
            self.config.get_producers(),
            self.config.get_consumers(),
            self.config.get_items_per_producer(),
            self.config.get_items_per_consumer(),
        )
    }

    /// Runs `producers` threads that each enqueue `per_producer` items.
    ///
    /// Producer `p` enqueues `p * per_producer + j` for `j` in `0..per_producer`.
    #[must_use]
    pub fn run_producers(&self, producers: usize, per_producer: usize) -> RunReport {
        let (run, start) = self.begin("Producers", producers, 0);
        let threads = self.spawn_producers(run, producers, per_producer);
        let cancelled = self.join(run, threads, start);
        self.report("Producers", start, cancelled)
    }

    /// Runs `consumers` threads that each dequeue `per_consumer` items.
    #[must_use]
    pub fn run_consumers(&self, consumers: usize, per_consumer: usize) -> RunReport {
        let (run, start) = self.begin("Consumers", 0, consumers);
        let threads = self.spawn_consumers(run, consumers, per_consumer);
        let cancelled = self.join(run, threads, start);
        self.report("Consumers", start, cancelled)
    }

    /// Runs producers and consumers at the same time.
    #[must_use]
    pub fn run_mixed(
        &self,
        producers: usize,
        consumers: usize,
        per_producer: usize,
        per_consumer: usize,
    ) -> RunReport {
        let (run, start) = self.begin("Mixed", producers, consumers);
        let mut threads = self.spawn_producers(run, producers, per_producer);
        threads.extend(self.spawn_consumers(run, consumers, per_consumer));
        let cancelled = self.join(run, threads, start);
        self.report("Mixed", start, cancelled)
    }

    /// Runs `threads` workers doing `operations` queue calls each; even
    /// thread ids produce and odd thread ids consume.
    ///
    /// An odd `threads` leaves one producer unmatched, which blocks once its
    /// surplus exceeds the free capacity.
    #[must_use]
    pub fn run_stress(&self, threads: usize, operations: usize) -> RunReport {
        let (run, start) = self.begin("Stress", threads.div_ceil(2), threads / 2);

        let queue = self.queue.clone();
        let counters = Arc::clone(&self.counters);
        let result = StressHarness::new(threads, operations)
            .timeout(self.config.get_timeout())
            .run_tracked(
                move |thread_id, iteration| {
                    if thread_id % 2 == 0 {
                        let item = item_for(thread_id, operations, iteration);
                        queue.enqueue(item)?;
                        counters.record_produced(item);
                    } else {
                        let item = queue.dequeue()?;
                        counters.record_consumed(item);
                    }
                    Ok(())
                },
                |token| self.track(run, token),
            );
        self.untrack(run);

        self.report("Stress", start, result.cancelled_threads)
    }

    /// Empties the queue and zeroes every counter.
    ///
    /// Returns how many items were dropped from the queue.
    pub fn clear(&self) -> usize {
        let removed = self.queue.clear();
        self.counters.reset();
        tracing::info!(removed, "queue harness cleared");
        removed
    }

    fn begin(&self, scenario: &str, producers: usize, consumers: usize) -> (u64, Instant) {
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        tracing::info!(scenario, run, producers, consumers, "starting queue scenario");
        self.counters.reset_counts();
        (run, Instant::now())
    }

    fn running(&self) -> MutexGuard<'_, Vec<(u64, CancelToken)>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, run: u64, token: &CancelToken) {
        let mut running = self.running();
        running.push((run, token.clone()));
        // Checked under the lock `interrupt` takes after setting the flag.
        if self.is_interrupted() {
            token.cancel();
        }
    }

    fn untrack(&self, run: u64) {
        self.running().retain(|(owner, _)| *owner != run);
    }

    fn spawn_producers(
        &self,
        run: u64,
        producers: usize,
        per_producer: usize,
    ) -> Vec<CancellableThread<QueueResult<()>>> {
        (0..producers)
            .map(|producer_id| {
                let queue = self.queue.clone();
                let counters = Arc::clone(&self.counters);
                cancel::spawn_named(format!("producer-{producer_id}"), move || {
                    for j in 0..per_producer {
                        let item = item_for(producer_id, per_producer, j);
                        queue.enqueue(item).inspect_err(|_| {
                            tracing::warn!(producer_id, "producer cancelled");
                        })?;
                        counters.record_produced(item);
                    }
                    Ok(())
                })
                .expect("should spawn producer thread")
            })
            .inspect(|thread| self.track(run, thread.token()))
            .collect()
    }

    fn spawn_consumers(
        &self,
        run: u64,
        consumers: usize,
        per_consumer: usize,
    ) -> Vec<CancellableThread<QueueResult<()>>> {
        (0..consumers)
            .map(|consumer_id| {
                let queue = self.queue.clone();
                let counters = Arc::clone(&self.counters);
                cancel::spawn_named(format!("consumer-{consumer_id}"), move || {
                    for _ in 0..per_consumer {
                        let item = queue.dequeue().inspect_err(|_| {
                            tracing::warn!(consumer_id, "consumer cancelled");
                        })?;
                        counters.record_consumed(item);
                    }
                    Ok(())
                })
                .expect("should spawn consumer thread")
            })
            .inspect(|thread| self.track(run, thread.token()))
            .collect()
    }

    fn join(
        &self,
        run: u64,
        threads: Vec<CancellableThread<QueueResult<()>>>,
        start: Instant,
    ) -> usize {
        let deadline = start + self.config.get_timeout();
        let cancelled = cancelled_at_deadline(&join_until(threads, Some(deadline)));
        self.untrack(run);
        cancelled
    }

    fn report(&self, scenario: &str, start: Instant, cancelled_threads: usize) -> RunReport {
        let report = RunReport {
            scenario: scenario.to_owned(),
            produced: self.counters.produced(),
            consumed: self.counters.consumed(),
            sum_balance: self.counters.sum(),
            queue_len: self.queue.len(),
            cancelled_threads,
            duration: start.elapsed(),
        };
        tracing::info!(
            scenario,
            produced = report.produced,
            consumed = report.consumed,
            queue_len = report.queue_len,
            cancelled_threads,
            "queue scenario finished"
        );
        report
    }
}

#[allow(clippy::cast_possible_wrap)]
fn item_for(thread_id: usize, per_thread: usize, index: usize) -> i64 {
    (thread_id * per_thread + index) as i64
}
