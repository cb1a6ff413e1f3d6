//! One-time, thread-safe construction of shared resources.
//!
//! [`LazyResource`] holds a value that is built on first use and shared by every later
//! caller. It is used for expensive clients (instance-metadata lookups) that most renders
//! never touch, and for the provider namespaces that own those clients.
//!
//! The guard is an explicit three-state machine behind a [`Mutex`]:
//!
//! ```text
//! Uninitialized --(first get)--> Initializing --(factory returns)--> Ready
//! ```
//!
//! Callers that arrive while another thread is running the factory block on a
//! [`Condvar`] until the value is ready. The factory always runs outside the lock.
//!
//! If a factory panics the state returns to `Uninitialized` and waiters are woken, so the
//! next caller runs its own factory. This matches [`std::sync::OnceLock`].

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a [`LazyResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
    Uninitialized,
    Initializing,
    Ready,
}

enum Slot<T> {
    Uninitialized,
    Initializing,
    Ready(Arc<T>),
}

/// A value constructed at most once, on first access, and shared afterwards.
///
/// `get` never fails. A factory that can fail must return a fallback value that reports
/// the failure through its own methods.
pub struct LazyResource<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> LazyResource<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Uninitialized),
            ready: Condvar::new(),
        }
    }

    /// Create a resource that is already initialized with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            slot: Mutex::new(Slot::Ready(Arc::new(value))),
            ready: Condvar::new(),
        }
    }

    /// Return the shared value, running `factory` if no value exists yet.
    ///
    /// Exactly one caller runs a factory; every caller, concurrent or later, receives a
    /// handle to the same instance.
    pub fn get<F>(&self, factory: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let mut slot = self.lock();
        loop {
            match &*slot {
                Slot::Ready(value) => return Arc::clone(value),
                Slot::Initializing => {
                    slot = self
                        .ready
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Slot::Uninitialized => break,
            }
        }
        *slot = Slot::Initializing;
        drop(slot);

        let reset = ResetOnUnwind { owner: self };
        let value = Arc::new(factory());
        std::mem::forget(reset);

        let mut slot = self.lock();
        *slot = Slot::Ready(Arc::clone(&value));
        drop(slot);
        self.ready.notify_all();
        value
    }

    /// The current lifecycle state.
    pub fn state(&self) -> LazyState {
        match &*self.lock() {
            Slot::Uninitialized => LazyState::Uninitialized,
            Slot::Initializing => LazyState::Initializing,
            Slot::Ready(_) => LazyState::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LazyState::Ready
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for LazyResource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LazyResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyResource")
            .field("state", &self.state())
            .finish()
    }
}

/// Puts the slot back to `Uninitialized` if the factory unwinds.
struct ResetOnUnwind<'a, T> {
    owner: &'a LazyResource<T>,
}

impl<T> Drop for ResetOnUnwind<'_, T> {
    fn drop(&mut self) {
        let mut slot = self.owner.lock();
        *slot = Slot::Uninitialized;
        drop(slot);
        self.owner.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_factory_runs_once_sequentially() {
        let lazy = LazyResource::new();
        let calls = AtomicUsize::new(0);

        let first = lazy.get(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            String::from("first")
        });
        let second = lazy.get(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            String::from("second")
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*second, "first");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_first_use_constructs_once() {
        const THREADS: usize = 16;

        let lazy = Arc::new(LazyResource::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let lazy = Arc::clone(&lazy);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    lazy.get(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Hold the initializing state long enough for others to queue up.
                        thread::sleep(Duration::from_millis(20));
                        i
                    })
                })
            })
            .collect();

        let values: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = &values[0];
        for value in &values {
            assert!(Arc::ptr_eq(first, value));
        }
    }

    #[test]
    fn test_state_transitions() {
        let lazy: LazyResource<u32> = LazyResource::new();
        assert_eq!(lazy.state(), LazyState::Uninitialized);
        assert!(!lazy.is_ready());

        lazy.get(|| {
            assert_eq!(lazy.state(), LazyState::Initializing);
            7
        });
        assert_eq!(lazy.state(), LazyState::Ready);
    }

    #[test]
    fn test_ready_constructor_skips_factory() {
        let lazy = LazyResource::ready(3);
        let value = lazy.get(|| panic!("factory must not run"));
        assert_eq!(*value, 3);
    }

    #[test]
    fn test_panicking_factory_allows_retry() {
        let lazy: Arc<LazyResource<u32>> = Arc::new(LazyResource::new());

        let cloned = Arc::clone(&lazy);
        let result = thread::spawn(move || cloned.get(|| panic!("boom"))).join();
        assert!(result.is_err());
        assert_eq!(lazy.state(), LazyState::Uninitialized);

        assert_eq!(*lazy.get(|| 5), 5);
    }
}
