// Cooperative cancellation for threads parked inside a monitor.
//
// A `CancelToken` carries a sticky SET/UNSET flag plus a registry of wakers.
// A thread that is about to park on a condition variable registers a waker
// for the duration of its wait, so that `cancel()` can kick it back awake.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

/// Indicates the token has been cancelled.
const SET: usize = 1;

/// Indicates the token is live.
const UNSET: usize = 0;

/// `Waker` is implemented by anything a blocked thread might be parked on.
///
/// Implementations must synchronize with the waiter's predicate check
/// (usually by acquiring the same lock the waiter holds before it parks)
/// otherwise a wake issued between the check and the park is lost.
pub trait Waker {
    fn wake(&self);
}

pub type SharedWaker = Arc<dyn Waker + Send + Sync>;

struct TokenState {
    state: AtomicUsize,
    next_key: AtomicUsize,
    wakers: Mutex<Vec<(usize, SharedWaker)>>,
}

impl TokenState {
    fn wakers(&self) -> MutexGuard<'_, Vec<(usize, SharedWaker)>> {
        self.wakers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `CancelToken` is a cloneable handle to a shared cancellation flag.
///
/// Once cancelled it stays cancelled until [`CancelToken::reset`] is
/// called, so every layer of a call stack that inspects the token after a
/// queue operation returned [`crate::QueueError::Cancelled`] sees the same
/// answer.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

thread_local! {
    static CURRENT: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("waiters", &self.inner.wakers().len())
            .finish()
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenState {
                state: AtomicUsize::new(UNSET),
                next_key: AtomicUsize::new(0),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the calling thread's ambient token, creating one on first use.
    ///
    /// Threads started through [`spawn`] get the token held by their
    /// [`CancellableThread`] handle, which is how another thread reaches in
    /// and cancels them.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(CancelToken::new)
                .clone()
        })
    }

    /// Replaces the calling thread's ambient token, returning the previous one.
    pub fn install(token: CancelToken) -> Option<CancelToken> {
        CURRENT.with(|slot| slot.borrow_mut().replace(token))
    }

    /// `cancel` flips the token from UNSET to SET and wakes every thread
    /// currently registered on it.
    ///
    /// Returns false when the token was already cancelled.
    pub fn cancel(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(UNSET, SET, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        // Snapshot so wakers run without the registry lock held; a waker
        // takes the monitor lock and the waiter may be registering under it.
        let wakers: Vec<SharedWaker> = self
            .inner
            .wakers()
            .iter()
            .map(|(_, waker)| Arc::clone(waker))
            .collect();

        tracing::debug!(waiters = wakers.len(), "CancelToken cancelled");
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// `reset` flips the token from SET back to UNSET so its owner may retry.
    ///
    /// Returns false when the token was not cancelled.
    pub fn reset(&self) -> bool {
        self.inner
            .state
            .compare_exchange(SET, UNSET, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.load(Ordering::SeqCst) == SET
    }

    /// Registers `waker` to be woken by [`CancelToken::cancel`] until the
    /// returned registration is dropped.
    ///
    /// The waker is pushed before the caller re-checks [`Self::is_cancelled`],
    /// so a cancellation that lands in between is either observed by that
    /// check or delivered to the waker. Registering on a token that is
    /// already cancelled does not call the waker; the caller's re-check
    /// sees the flag instead.
    #[must_use]
    pub fn register(&self, waker: SharedWaker) -> WakerRegistration<'_> {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers().push((key, waker));
        WakerRegistration { token: self, key }
    }

    #[must_use]
    pub fn registered_wakers(&self) -> usize {
        self.inner.wakers().len()
    }
}

/// Keeps a waker registered on a [`CancelToken`]; unregisters on drop.
pub struct WakerRegistration<'a> {
    token: &'a CancelToken,
    key: usize,
}

impl Drop for WakerRegistration<'_> {
    fn drop(&mut self) {
        let key = self.key;
        self.token.inner.wakers().retain(|(entry, _)| *entry != key);
    }
}

/// A spawned thread whose ambient [`CancelToken`] is held by this handle.
#[derive(Debug)]
pub struct CancellableThread<R> {
    handle: thread::JoinHandle<R>,
    token: CancelToken,
}

impl<R> CancellableThread<R> {
    /// Cancels the thread's token, releasing it from any blocking queue call.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    #[must_use]
    pub fn thread(&self) -> &thread::Thread {
        self.handle.thread()
    }

    /// Waits for the thread to finish.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the thread panicked.
    pub fn join(self) -> thread::Result<R> {
        self.handle.join()
    }
}

/// Spawns a thread with a fresh ambient [`CancelToken`].
///
/// # Panics
///
/// Panics if the OS fails to create a thread, like [`std::thread::spawn`].
pub fn spawn<F, R>(f: F) -> CancellableThread<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let token = CancelToken::new();
    let thread_token = token.clone();
    let handle = thread::spawn(move || {
        CancelToken::install(thread_token);
        f()
    });
    CancellableThread { handle, token }
}

/// Spawns a named thread with a fresh ambient [`CancelToken`].
///
/// # Errors
///
/// Returns the OS error when the thread could not be created.
pub fn spawn_named<F, R>(name: impl Into<String>, f: F) -> io::Result<CancellableThread<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let token = CancelToken::new();
    let thread_token = token.clone();
    let handle = thread::Builder::new().name(name.into()).spawn(move || {
        CancelToken::install(thread_token);
        f()
    })?;
    Ok(CancellableThread { handle, token })
}

#[cfg(test)]
mod test_cancel_token {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};

    use super::{spawn, spawn_named, CancelToken, Waker};

    #[derive(Default)]
    struct CountingWaker {
        wakes: AtomicUsize,
    }

    impl Waker for CountingWaker {
        fn wake(&self) {
            self.wakes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_is_sticky_until_reset() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());

        assert!(token.reset());
        assert!(!token.reset());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_registered_wakers_only_while_registered() {
        let token = CancelToken::new();
        let waker = Arc::new(CountingWaker::default());

        {
            let _registration = token.register(waker.clone());
            assert_eq!(token.registered_wakers(), 1);
            token.cancel();
        }

        assert_eq!(waker.wakes.load(Ordering::SeqCst), 1);
        assert_eq!(token.registered_wakers(), 0);

        token.reset();
        token.cancel();
        assert_eq!(waker.wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registering_on_a_cancelled_token_leaves_the_flag_to_the_caller() {
        let token = CancelToken::new();
        token.cancel();

        let waker = Arc::new(CountingWaker::default());
        let registration = token.register(waker.clone());

        assert_eq!(waker.wakes.load(Ordering::SeqCst), 0);
        assert!(token.is_cancelled());
        drop(registration);
        assert_eq!(token.registered_wakers(), 0);
    }

    #[test]
    fn dropping_one_registration_keeps_the_others() {
        let token = CancelToken::new();
        let first = Arc::new(CountingWaker::default());
        let second = Arc::new(CountingWaker::default());

        let first_registration = token.register(first.clone());
        let _second_registration = token.register(second.clone());
        drop(first_registration);

        token.cancel();
        assert_eq!(first.wakes.load(Ordering::SeqCst), 0);
        assert_eq!(second.wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn current_token_is_per_thread() {
        let here = CancelToken::current();
        here.cancel();
        assert!(CancelToken::current().is_cancelled());

        let elsewhere = std::thread::spawn(|| CancelToken::current().is_cancelled())
            .join()
            .expect("should join");
        assert!(!elsewhere);

        here.reset();
    }

    #[test]
    fn spawned_thread_observes_handle_token() {
        let (ready_tx, ready_rx) = mpsc::channel::<()>();
        let (go_tx, go_rx) = mpsc::channel::<()>();

        let worker = spawn(move || {
            ready_tx.send(()).expect("should send");
            go_rx.recv().expect("should receive");
            CancelToken::current().is_cancelled()
        });

        ready_rx.recv().expect("worker should start");
        assert!(worker.cancel());
        assert!(worker.token().is_cancelled());
        go_tx.send(()).expect("should send");

        assert!(worker.join().expect("should join"));
    }

    #[test]
    fn spawn_named_sets_thread_name() {
        let worker = spawn_named("monitor-worker", || {
            std::thread::current().name().map(str::to_owned)
        })
        .expect("should spawn");

        assert_eq!(worker.thread().name(), Some("monitor-worker"));
        assert_eq!(
            worker.join().expect("should join").as_deref(),
            Some("monitor-worker")
        );
    }
}
