//! Condition-variable wait queues.
//!
//! A queue pairs a mutex with a condition variable. Waiters hold the mutex
//! while evaluating their predicate and re-evaluate it after every wake,
//! so spurious wakeups are harmless. Wakers never take the mutex.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A named wait point for threads blocking on a predicate.
#[derive(Debug, Default)]
pub struct WaitQueue {
    lock: Mutex<()>,
    cv: Condvar,
}

impl WaitQueue {
    /// Creates an empty wait queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes a single waiter.
    pub fn wake_one(&self) {
        self.cv.notify_one();
    }

    /// Wakes every waiter.
    pub fn wake_all(&self) {
        self.cv.notify_all();
    }

    /// Blocks until `pred` returns true. The predicate is checked under
    /// the queue mutex and after every wake.
    pub fn wait_for<F>(&self, mut pred: F)
    where
        F: FnMut() -> bool,
    {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !pred() {
            guard = self
                .cv
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until `pred` returns true or `timeout` elapses. Returns
    /// whether the predicate was satisfied.
    pub fn wait_timeout_for<F>(&self, mut pred: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !pred() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (g, _) = self
                .cv
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            guard = g;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_wait_returns_once_predicate_holds() {
        let queue = Arc::new(WaitQueue::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let queue = Arc::clone(&queue);
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                queue.wait_for(|| flag.load(Ordering::Relaxed));
            })
        };

        // Give the waiter a chance to block, then release it.
        std::thread::sleep(Duration::from_millis(20));
        flag.store(true, Ordering::Relaxed);
        queue.wake_all();

        waiter.join().unwrap();
    }

    #[test]
    fn test_timeout_without_wake() {
        let queue = WaitQueue::new();
        let satisfied = queue.wait_timeout_for(|| false, Duration::from_millis(10));
        assert!(!satisfied);
    }

    #[test]
    fn test_timeout_predicate_already_true() {
        let queue = WaitQueue::new();
        assert!(queue.wait_timeout_for(|| true, Duration::from_millis(10)));
    }

    #[test]
    fn test_spurious_wake_rechecks_predicate() {
        let queue = Arc::new(WaitQueue::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let queue = Arc::clone(&queue);
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                queue.wait_timeout_for(|| flag.load(Ordering::Relaxed), Duration::from_secs(5))
            })
        };

        // A wake without the predicate holding must not release the waiter.
        std::thread::sleep(Duration::from_millis(10));
        queue.wake_all();
        std::thread::sleep(Duration::from_millis(10));
        flag.store(true, Ordering::Relaxed);
        queue.wake_all();

        assert!(waiter.join().unwrap());
    }
}
