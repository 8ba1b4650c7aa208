//! Cancellation and deadlines for retry/backoff waits
//!
//! Backoff sleeps inside migration and recovery are condvar waits against a
//! shared [`CancelToken`], so an overall cascade deadline or an explicit
//! cancel wakes them immediately instead of finishing the sleep. All
//! suspension points in the engine go through these two types.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct TokenInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

/// A cloneable cancellation token.
///
/// Cancelling wakes every thread currently blocked in [`CancelToken::wait_for`].
/// Cancellation is sticky: once set it never resets.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                cond: Condvar::new(),
            }),
        }
    }

    /// Cancel the token and wake all waiters
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.cond.notify_all();
    }

    /// Whether the token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Block for up to `duration`, waking early on cancellation.
    ///
    /// Returns `true` if the token was cancelled (before or during the
    /// wait), `false` if the full duration elapsed.
    pub fn wait_for(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.lock.lock();
        while !self.is_cancelled() {
            if self.inner.cond.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_cancelled()
    }
}

/// A point in time after which an operation must stop.
///
/// `Deadline::never()` never expires; waits clamp their duration to the
/// remaining time so a backoff can never outlive the deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires
    pub fn never() -> Self {
        Deadline(None)
    }

    /// A deadline `duration` from now
    pub fn within(duration: Duration) -> Self {
        Deadline(Some(Instant::now() + duration))
    }

    /// A deadline at an absolute instant
    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    /// Whether the deadline has passed
    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Time remaining, `None` for a never-expiring deadline.
    /// An expired deadline reports zero remaining.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Clamp a wait duration so it does not outlive the deadline
    pub fn clamp(&self, duration: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => duration.min(remaining),
            None => duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_for_times_out_when_not_cancelled() {
        let token = CancelToken::new();
        let cancelled = token.wait_for(Duration::from_millis(10));
        assert!(!cancelled);
    }

    #[test]
    fn test_pre_cancelled_token_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(token.wait_for(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = thread::spawn(move || waiter.wait_for(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let start = Instant::now();
        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_deadline_never_does_not_expire() {
        let d = Deadline::never();
        assert!(!d.expired());
        assert_eq!(d.remaining(), None);
        assert_eq!(d.clamp(Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[test]
    fn test_deadline_clamps_waits() {
        let d = Deadline::within(Duration::from_millis(5));
        assert!(d.clamp(Duration::from_secs(60)) <= Duration::from_millis(5));
        thread::sleep(Duration::from_millis(10));
        assert!(d.expired());
        assert_eq!(d.remaining(), Some(Duration::ZERO));
    }
}
