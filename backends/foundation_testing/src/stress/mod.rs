//! Stress test framework for blocking queue operations.
//!
//! Every worker runs on a [`foundation_monitor::cancel`] thread, so a run
//! that hits its deadline cancels the stragglers instead of leaking them
//! parked on a condition variable.

use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use foundation_monitor::cancel::{self, CancelToken, CancellableThread};
use foundation_monitor::QueueResult;

/// How often [`join_until`] re-checks unfinished threads.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations completed successfully
    pub successes: usize,
    /// Threads still running at the deadline that then stopped as cancelled
    pub cancelled_threads: usize,
    /// Total time taken for the test
    pub duration: Duration,
    /// Number of threads used
    pub thread_count: usize,
}

impl StressResult {
    /// Returns operations per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.successes as f64 / secs
        }
    }
}

/// Spawns `threads` workers that each call an operation `iterations` times.
///
/// A worker stops early when its operation reports
/// [`foundation_monitor::QueueError::Cancelled`].
#[derive(Debug, Clone, Copy)]
pub struct StressHarness {
    threads: usize,
    iterations: usize,
    timeout: Option<Duration>,
}

impl StressHarness {
    /// Creates a harness without a deadline.
    #[must_use]
    pub const fn new(threads: usize, iterations: usize) -> Self {
        Self {
            threads,
            iterations,
            timeout: None,
        }
    }

    /// Cancels workers that are still running `timeout` after the start.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs the operation closure on every worker.
    ///
    /// The closure receives:
    /// - `thread_id`: Index of the thread (`0..threads`)
    /// - `iteration`: Iteration number for this thread
    ///
    /// # Examples
    ///
    /// ```
    /// use foundation_monitor::BoundedBlockingQueue;
    /// use foundation_testing::StressHarness;
    ///
    /// let queue = BoundedBlockingQueue::new(8).unwrap();
    /// let result = StressHarness::new(4, 100).run(move |thread_id, iteration| {
    ///     if thread_id % 2 == 0 {
    ///         queue.enqueue(iteration)
    ///     } else {
    ///         queue.dequeue().map(drop)
    ///     }
    /// });
    ///
    /// assert_eq!(result.successes, 400);
    /// assert_eq!(result.cancelled_threads, 0);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if any worker thread panics or cannot be spawned.
    pub fn run<F>(self, operation: F) -> StressResult
    where
        F: Fn(usize, usize) -> QueueResult<()> + Send + Sync + 'static,
    {
        self.run_tracked(operation, |_| {})
    }

    /// Like [`Self::run`], handing every worker's token to `on_spawn` so the
    /// caller can cancel the run from elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if any worker thread panics or cannot be spawned.
    pub fn run_tracked<F, S>(self, operation: F, mut on_spawn: S) -> StressResult
    where
        F: Fn(usize, usize) -> QueueResult<()> + Send + Sync + 'static,
        S: FnMut(&CancelToken),
    {
        let start = Instant::now();
        let operation = Arc::new(operation);
        let successes = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(self.threads);
        for thread_id in 0..self.threads {
            let operation = Arc::clone(&operation);
            let successes = Arc::clone(&successes);
            let iterations = self.iterations;

            let worker = cancel::spawn_named(format!("stress-{thread_id}"), move || -> QueueResult<()> {
                for iteration in 0..iterations {
                    operation(thread_id, iteration).inspect_err(|err| {
                        tracing::debug!(thread_id, iteration, %err, "stress worker stopped");
                    })?;
                    successes.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            })
            .expect("should spawn stress worker");
            on_spawn(worker.token());
            workers.push(worker);
        }

        let deadline = self.timeout.map(|timeout| start + timeout);
        let cancelled_threads = cancelled_at_deadline(&join_until(workers, deadline));

        StressResult {
            successes: successes.load(Ordering::Relaxed),
            cancelled_threads,
            duration: start.elapsed(),
            thread_count: self.threads,
        }
    }
}

/// Joins every thread, cancelling those still alive at `deadline`.
///
/// Returns each thread's output paired with whether it was still running at
/// the deadline. Such a thread may still finish normally if it was not
/// blocked in a queue call, so use [`cancelled_at_deadline`] to count the
/// ones that actually stopped. Without a deadline this is a plain join of
/// every thread.
///
/// # Panics
///
/// Panics if any of the threads panicked.
pub fn join_until<R>(
    threads: Vec<CancellableThread<R>>,
    deadline: Option<Instant>,
) -> Vec<(R, bool)> {
    threads
        .into_iter()
        .map(|worker| {
            let mut timed_out = false;
            if let Some(deadline) = deadline {
                while !worker.is_finished() && Instant::now() < deadline {
                    thread::sleep(JOIN_POLL_INTERVAL);
                }
                if !worker.is_finished() {
                    tracing::warn!(
                        thread = worker.thread().name().unwrap_or("unnamed"),
                        "thread still running at deadline, cancelling"
                    );
                    worker.cancel();
                    timed_out = true;
                }
            }

            let output = worker.join().expect("Thread panicked during stress test");
            (output, timed_out)
        })
        .collect()
}

/// Counts joined threads that were running at the deadline and then
/// returned [`foundation_monitor::QueueError::Cancelled`].
#[must_use]
pub fn cancelled_at_deadline<T>(joined: &[(QueueResult<T>, bool)]) -> usize {
    joined
        .iter()
        .filter(|(result, timed_out)| {
            *timed_out && result.as_ref().is_err_and(|err| err.is_cancelled())
        })
        .count()
}
