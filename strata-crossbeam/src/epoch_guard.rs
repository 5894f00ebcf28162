//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! ```text
//! SkipList<i32, EpochGuard>
//!     │
//!     ├── every operation pins the calling thread (G::pin)
//!     └── removed nodes go to the global collector (defer_destroy)
//! ```

use std::fmt;
use std::ops::Deref;

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use strata_core::guard::{Guard, Reclaim};

/// Epoch-based memory reclamation guard.
///
/// Zero-sized: all state lives in the global epoch collector, so a list can
/// store it without losing `Send`/`Sync`. A retired node is freed only after
/// every thread pinned at retirement time has unpinned.
///
/// The collector drops retired elements on whichever thread happens to run
/// it, possibly after the list is gone. Removal therefore needs
/// `T: Send + 'static` (see [`Reclaim`]).
#[derive(Clone, Copy, Default)]
pub struct EpochGuard {}

impl EpochGuard {
    pub fn new() -> Self {
        EpochGuard {}
    }
}

/// A reference that keeps its thread pinned while alive.
pub struct EpochRef<'a, T> {
    _guard: CrossbeamGuard,
    reference: &'a T,
}

impl<'a, T> EpochRef<'a, T> {
    /// # Safety
    ///
    /// `reference` must point into a node that cannot be reclaimed while
    /// `guard` is pinned.
    pub(crate) unsafe fn new(guard: CrossbeamGuard, reference: &'a T) -> Self {
        EpochRef {
            _guard: guard,
            reference,
        }
    }

    pub fn get(&self) -> &T {
        self.reference
    }
}

impl<T> Deref for EpochRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.reference
    }
}

impl<T: fmt::Display> fmt::Display for EpochRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

impl<T: fmt::Debug> fmt::Debug for EpochRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EpochRef({:?})", self.reference)
    }
}

impl<T: Send + 'static> Reclaim<T> for EpochGuard {}

impl Guard for EpochGuard {
    type GuardedRef<'a, T: 'a> = EpochRef<'a, T>;

    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy(&self, node: *mut (), dealloc: unsafe fn(*mut ())) {
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || dealloc(node));
        }
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        let guard = epoch::pin();
        unsafe { EpochRef::new(guard, &*ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    unsafe fn drop_counter(ptr: *mut ()) {
        unsafe { drop(Box::from_raw(ptr as *mut DropCounter)) };
    }

    #[test]
    fn test_deferred_nodes_eventually_freed() {
        let drops = Arc::new(AtomicUsize::new(0));
        let guard = EpochGuard::default();

        for _ in 0..64 {
            let ptr = Box::into_raw(Box::new(DropCounter(Arc::clone(&drops))));
            unsafe { guard.defer_destroy(ptr as *mut (), drop_counter) };
        }

        // Flushing repeatedly advances the epoch and runs ready destructors.
        for _ in 0..1000 {
            if drops.load(Ordering::SeqCst) == 64 {
                break;
            }
            epoch::pin().flush();
        }
        assert_eq!(drops.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn test_epoch_ref() {
        let value = 42;
        let _guard = EpochGuard::pin();

        let guarded = unsafe { EpochGuard::make_ref(&value) };
        assert_eq!(*guarded, 42);
        assert_eq!(guarded.get(), &42);
    }

    #[test]
    fn test_epoch_ref_display() {
        let value = 42;

        let guarded = unsafe { EpochGuard::make_ref(&value) };
        assert_eq!(format!("{}", guarded), "42");
        assert_eq!(format!("{:?}", guarded), "EpochRef(42)");
    }
}
