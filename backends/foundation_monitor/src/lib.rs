//! Monitor style synchronization primitives for the foundation crates.
//!
//! The centrepiece is [`BoundedBlockingQueue`], a capacity bounded FIFO queue
//! guarded by a single mutex and two condition variables (`not_full` and
//! `not_empty`). Producers block while the queue is full, consumers block
//! while it is empty, and any blocked caller can be released through a
//! [`CancelToken`].
//!
//! # Examples
//!
//! ```rust
//! use foundation_monitor::{cancel, BoundedBlockingQueue};
//!
//! let queue = BoundedBlockingQueue::new(2).expect("capacity is positive");
//!
//! let producer_queue = queue.clone();
//! let producer = cancel::spawn(move || {
//!     for item in 0..10 {
//!         producer_queue.enqueue(item)?;
//!     }
//!     Ok::<_, foundation_monitor::QueueError>(())
//! });
//!
//! let mut received = Vec::new();
//! for _ in 0..10 {
//!     received.push(queue.dequeue().expect("not cancelled"));
//! }
//!
//! producer.join().expect("producer should not panic").expect("not cancelled");
//! assert_eq!(received, (0..10).collect::<Vec<_>>());
//! ```

pub mod cancel;
mod errors;
mod queue;

pub use cancel::{CancelToken, CancellableThread, SharedWaker, Waker, WakerRegistration};
pub use errors::*;
pub use queue::*;
