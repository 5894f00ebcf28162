//! Guard trait for memory reclamation strategies.
//!
//! Lock-free readers (`contains`, `get`, the search walk of every mutation)
//! may still hold a pointer to a node after a remover has unlinked it, so a
//! removed node cannot be freed in place. The list hands it to its guard
//! instead:
//!
//! ```text
//! SkipList<T, G: Guard>
//!     │
//!     ├── SkipList<T, DeferredGuard>   frees retired nodes when the list drops
//!     └── SkipList<T, EpochGuard>      crossbeam-epoch (strata-crossbeam)
//! ```

mod deferred_guard;

use std::ops::Deref;

pub use deferred_guard::{DeferredGuard, DeferredRef};

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. Nodes passed to `defer_destroy` are not freed while any `ReadGuard`
///    pinned before the call is alive
/// 2. `GuardedRef` keeps the referenced data valid for its lifetime
///
/// The guard stored in a list is only used to schedule destruction. Readers
/// pin per operation with [`Guard::pin`].
pub trait Guard: Sized + Default + Send + Sync {
    /// A reference that keeps its target alive while it exists.
    type GuardedRef<'a, T: 'a>: Deref<Target = T>;

    /// An active guard that protects node reads for its lifetime.
    type ReadGuard: Sized;

    /// Pin an active read guard.
    fn pin() -> Self::ReadGuard;

    /// Schedule a node for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `node` must be unlinked (unreachable by any new traversal)
    /// - `dealloc` must be the matching deallocation function for `node`
    /// - `node` must not be retired twice
    unsafe fn defer_destroy(&self, node: *mut (), dealloc: unsafe fn(*mut ()));

    /// Create a guarded reference from a raw pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must point to data that stays valid while the returned reference
    /// (and the protection it carries) is alive.
    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T>;
}

/// A guard that may take ownership of retired `T` elements.
///
/// Retired nodes are dropped by the guard, possibly on another thread and
/// after the list itself is gone, so a guard states here which element types
/// it can retire. `SkipList::remove` requires it.
pub trait Reclaim<T>: Guard {}
