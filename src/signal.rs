#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-wide cooperative cancellation flag.
///
/// Clones share the same state. The flag goes from "not cancelled" to
/// "cancelled" exactly once and is never reset. Workers poll it with
/// [`CancellationSignal::is_cancelled`] and sleep on it with
/// [`CancellationSignal::wait_timeout`], which wakes as soon as
/// [`CancellationSignal::cancel`] is called.
#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        // Waiters check the flag under this lock, so taking it here
        // guarantees none of them misses the notification.
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for up to `timeout`. Returns `true` if the signal was
    /// cancelled before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };
        let mut guard = self.inner.lock.lock();
        while !self.is_cancelled() {
            if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                return self.is_cancelled();
            }
        }
        true
    }

    /// Blocks until the signal is cancelled.
    pub fn wait(&self) -> bool {
        let mut guard = self.inner.lock.lock();
        while !self.is_cancelled() {
            self.inner.wake.wait(&mut guard);
        }
        true
    }
}
