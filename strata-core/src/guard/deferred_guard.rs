//! Deferred guard: retired nodes live until the guard itself drops.

#[cfg(debug_assertions)]
use std::collections::HashSet;
use std::ops::Deref;

use parking_lot::Mutex;

use super::{Guard, Reclaim};

/// Collects retired nodes and frees them all when dropped.
///
/// A list owns its guard, so retired nodes are released together with the
/// list. Memory grows with the number of removals; long-running workloads
/// should use an epoch-based guard instead.
///
/// Debug builds also record every retired address to catch double retirement,
/// roughly doubling the bookkeeping kept per removal.
pub struct DeferredGuard {
    retired: Mutex<Vec<RetiredNode>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct RetiredNode {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// The pointer is only dereferenced by `dealloc`, once, from `Drop`.
unsafe impl Send for RetiredNode {}

impl DeferredGuard {
    pub fn new() -> Self {
        DeferredGuard {
            retired: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of nodes waiting for release.
    pub fn retired_count(&self) -> usize {
        self.retired.lock().len()
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        for node in self.retired.get_mut().drain(..) {
            unsafe { (node.dealloc)(node.ptr) };
        }
    }
}

/// Plain reference; the owning list's guard keeps the target alive.
pub struct DeferredRef<'a, T> {
    data: &'a T,
}

impl<'a, T> DeferredRef<'a, T> {
    pub fn new(data: &'a T) -> Self {
        DeferredRef { data }
    }
}

impl<T> Deref for DeferredRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl Guard for DeferredGuard {
    type GuardedRef<'a, T: 'a> = DeferredRef<'a, T>;

    // Nothing is freed before the guard drops, so reads need no pinning.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy(&self, node: *mut (), dealloc: unsafe fn(*mut ())) {
        #[cfg(debug_assertions)]
        {
            let fresh = self.seen.lock().insert(node as usize);
            assert!(fresh, "node {:#x} retired twice", node as usize);
        }

        self.retired.lock().push(RetiredNode { ptr: node, dealloc });
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        DeferredRef::new(unsafe { &*ptr })
    }
}

// Retired elements are dropped with the list, on the thread that drops it.
impl<T> Reclaim<T> for DeferredGuard {}
