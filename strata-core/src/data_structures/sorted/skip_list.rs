use std::fmt;
use std::hint;
use std::ptr;

use parking_lot::{MutexGuard, RwLock};

use crate::config::{MAX_HEIGHT, SkipListConfig, clamp_max_height, clamp_probability};
use crate::data_structures::level_generator::sample_height;
use crate::data_structures::sorted::skip_node::{SkipNode, SkipNodePtr};
use crate::error::{SkipListError, SkipListResult};
use crate::guard::{DeferredGuard, Guard, Reclaim};

pub(crate) type Tower<T> = [SkipNodePtr<T>; MAX_HEIGHT];

// =============================================================================
// SKIP LIST INVARIANTS & LOCK COUPLING
// =============================================================================
//
// Skip List Structure (sorted ascending, height = 4):
//
// Level 3:  HEAD ─────────────────────────────────────► 30 ─────────────────► NULL
// Level 2:  HEAD ──────────► 10 ─────────────────────► 30 ─────────────────► NULL
// Level 1:  HEAD ──────────► 10 ──────────► 20 ──────► 30 ─────────────────► NULL
// Level 0:  HEAD ──────────► 10 ──────────► 20 ──────► 30 ──────────► 40 ──► NULL
//
// INVARIANTS:
// 1. Every level is sorted ascending; values are unique among unmarked nodes
// 2. A node linked at level L is linked at every level below L
// 3. A node is present iff fully_linked && !marked
// 4. HEAD is never marked and spans MAX_HEIGHT levels
// 5. height only grows
//
// Readers (find, contains, find_next_lowest) never lock. Writers lock:
//
//   insert   preds[0..=top_level]                 (distinct nodes only)
//   remove   victim, then preds[0..=top_level]    (distinct nodes only)
//
// preds[0] holds the largest value and preds[top] the smallest, so locks are
// always taken in descending value order and no lock cycle can form.
//
// Adjacent levels often share a predecessor:
//
//   preds = [20, 20, 10, HEAD]   lock 20, skip, lock 10, lock HEAD
//
// The last locked node is compared by identity, never by value.
//
// VALIDATION (under the locks, after a lock-free find):
//
//   insert   !pred.marked && (succ == NULL || !succ.marked) && pred.next[L] == succ
//   remove   !pred.marked && pred.next[L] == victim
//
// A failed validation releases every lock and retries from find. It is the
// expected outcome under contention, never an error.
//
// REMOVE (mark, then unlink):
//
//   1. lock victim, set marked                -> invisible to contains()
//   2. lock + validate preds                  -> retry keeps victim locked
//   3. pred.next[L] = victim.next[L], L = top..0
//   4. retire victim through the guard        -> freed once no reader sees it
//
// =============================================================================

// ============================================================================
// ListState - scalar fields behind one reader/writer lock
// ============================================================================

pub(super) struct ListState {
    pub(super) height: usize,
    pub(super) count: usize,
    pub(super) max_height: usize,
    pub(super) probability: f64,
    pub(super) fast_mode: bool,
    pub(super) retry_limit: Option<usize>,
}

impl ListState {
    fn new(config: SkipListConfig) -> Self {
        ListState {
            height: 1,
            count: 0,
            max_height: config.max_height,
            probability: config.probability,
            fast_mode: config.fast_mode,
            retry_limit: config.retry_limit,
        }
    }

    pub(super) fn config(&self) -> SkipListConfig {
        SkipListConfig {
            probability: self.probability,
            max_height: self.max_height,
            fast_mode: self.fast_mode,
            retry_limit: self.retry_limit,
        }
    }
}

// ============================================================================
// PredecessorLocks - lock set of one validation attempt
// ============================================================================

/// Locks held on the predecessors of one insert/remove attempt.
///
/// Dropping releases them in reverse acquisition order.
struct PredecessorLocks<'a, T> {
    held: Vec<MutexGuard<'a, ()>>,
    last: SkipNodePtr<T>,
}

impl<'a, T: 'a> PredecessorLocks<'a, T> {
    fn new() -> Self {
        PredecessorLocks {
            held: Vec::with_capacity(MAX_HEIGHT),
            last: ptr::null_mut(),
        }
    }

    /// Lock `node` unless it is the node locked last.
    ///
    /// # Safety
    /// `node` must stay allocated for `'a` (the caller is pinned).
    unsafe fn lock(&mut self, node: SkipNodePtr<T>) {
        if node != self.last {
            let node_ref: &'a SkipNode<T> = unsafe { &*node };
            self.held.push(node_ref.lock());
            self.last = node;
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.held.len()
    }
}

impl<T> Drop for PredecessorLocks<'_, T> {
    fn drop(&mut self) {
        while let Some(guard) = self.held.pop() {
            drop(guard);
        }
    }
}

// ============================================================================
// SkipList - lock-coupled skip list set
// ============================================================================

/// A concurrent ordered set.
///
/// - `insert` / `remove` lock a bounded set of predecessor nodes, validate
///   and retry on conflict
/// - `contains`, `get`, `lower_bound` take no node locks
/// - removed nodes are retired through `G` (see [`Guard`])
///
/// ```
/// use strata_core::SkipList;
///
/// let list: SkipList<i32> = SkipList::new();
/// assert!(list.insert(3));
/// assert!(list.insert(1));
/// assert!(!list.insert(3));
/// assert!(list.contains(&1));
/// assert!(list.remove(&1));
/// assert_eq!(list.to_sorted_vec(), vec![3]);
/// ```
pub struct SkipList<T, G: Guard = DeferredGuard> {
    pub(super) head: SkipNodePtr<T>,
    pub(super) state: RwLock<ListState>,
    guard: G,
}

impl<T: Ord, G: Guard> SkipList<T, G> {
    /// An empty list with the default configuration
    /// (p = 0.5, fast mode, max height 30).
    pub fn new() -> Self {
        Self::with_config(SkipListConfig::default())
    }

    /// An empty list. Out-of-range parameters are clamped with a warning.
    pub fn init(probability: f64, max_height: usize, fast_mode: bool) -> Self {
        Self::with_config(SkipListConfig::new(probability, max_height, fast_mode))
    }

    pub fn with_config(config: SkipListConfig) -> Self {
        let config = config.normalized();
        SkipList {
            head: SkipNode::alloc_head(MAX_HEIGHT - 1),
            state: RwLock::new(ListState::new(config)),
            guard: G::default(),
        }
    }

    // =========================================================================
    // Scalar state
    // =========================================================================

    /// Current tower height in use (never shrinks).
    pub fn height(&self) -> usize {
        self.state.read().height
    }

    /// Number of present elements.
    pub fn len(&self) -> usize {
        self.state.read().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_height(&self) -> usize {
        self.state.read().max_height
    }

    pub fn probability(&self) -> f64 {
        self.state.read().probability
    }

    pub fn fast_mode(&self) -> bool {
        self.state.read().fast_mode
    }

    pub fn config(&self) -> SkipListConfig {
        self.state.read().config()
    }

    /// Set the ceiling for future towers, clamped to `[1, MAX_HEIGHT]`.
    /// Existing towers and `height` are left as they are.
    pub fn set_max_height(&self, max_height: usize) {
        self.state.write().max_height = clamp_max_height(max_height);
    }

    pub fn set_probability(&self, probability: f64) {
        self.state.write().probability = clamp_probability(probability);
    }

    /// Switch the level generator. Only the height distribution of later
    /// inserts changes; in-flight inserts keep the mode they sampled with.
    pub fn set_fast_mode(&self, fast_mode: bool) {
        self.state.write().fast_mode = fast_mode;
    }

    #[cfg(test)]
    pub(crate) fn guard(&self) -> &G {
        &self.guard
    }

    /// Sample a tower for a new node and raise `height` to cover it.
    /// Returns the 0-based top level.
    fn sample_top_level(&self) -> usize {
        let (probability, max_height, fast_mode) = {
            let state = self.state.read();
            (state.probability, state.max_height, state.fast_mode)
        };
        let height = sample_height(probability, max_height, fast_mode);

        if height > self.height() {
            let mut state = self.state.write();
            if height > state.height {
                state.height = height;
            }
        }

        height - 1
    }

    // =========================================================================
    // Search (lock-free)
    // =========================================================================

    /// Walk right at `level` from `pred` while the successor is below `value`.
    ///
    /// Returns `(pred, curr)` with `pred.value < value <= curr.value`
    /// (`curr` may be null).
    ///
    /// # Safety
    /// `pred` must be linked at `level` and the caller must be pinned.
    #[inline]
    unsafe fn walk_level(
        mut pred: SkipNodePtr<T>,
        level: usize,
        value: &T,
    ) -> (SkipNodePtr<T>, SkipNodePtr<T>) {
        unsafe {
            let mut curr = (*pred).next(level);
            while !curr.is_null() && (*curr).value() < value {
                pred = curr;
                curr = (*pred).next(level);
            }
            (pred, curr)
        }
    }

    /// Top-down search recording predecessor and successor at every level
    /// below the current height.
    ///
    /// Returns the highest level whose successor equals `value`. Descent always
    /// continues to level 0, since insert and remove need every pair.
    pub(crate) fn find(&self, value: &T, preds: &mut Tower<T>, succs: &mut Tower<T>) -> Option<usize> {
        let mut found = None;
        let mut pred = self.head;

        for level in (0..self.height()).rev() {
            let (level_pred, curr) = unsafe { Self::walk_level(pred, level, value) };
            pred = level_pred;

            if found.is_none() && !curr.is_null() && unsafe { (*curr).value() } == value {
                found = Some(level);
            }

            preds[level] = pred;
            succs[level] = curr;
        }

        found
    }

    /// First node whose value is `>= value`, or null.
    ///
    /// Stops at the first level that holds `value` itself. Marked and
    /// unpublished nodes are returned as found; callers filter them.
    pub(crate) fn find_next_lowest(&self, value: &T) -> SkipNodePtr<T> {
        let mut pred = self.head;
        let mut curr = ptr::null_mut();

        for level in (0..self.height()).rev() {
            (pred, curr) = unsafe { Self::walk_level(pred, level, value) };
            if !curr.is_null() && unsafe { (*curr).value() } == value {
                break;
            }
        }

        curr
    }

    /// Membership test. Takes no node locks.
    pub fn contains(&self, value: &T) -> bool {
        let _pin = G::pin();
        let mut pred = self.head;

        for level in (0..self.height()).rev() {
            let (level_pred, curr) = unsafe { Self::walk_level(pred, level, value) };
            pred = level_pred;

            if !curr.is_null() {
                let node = unsafe { &*curr };
                if node.value() == value {
                    return node.is_live();
                }
            }
        }

        false
    }

    /// The stored element equal to `value`.
    ///
    /// Useful when `Ord` only looks at part of `T` (a key).
    pub fn get(&self, value: &T) -> Option<G::GuardedRef<'_, T>> {
        let _pin = G::pin();
        let node = self.find_next_lowest(value);
        if node.is_null() {
            return None;
        }

        unsafe {
            let node_ref = &*node;
            if node_ref.value() == value && node_ref.is_live() {
                Some(G::make_ref(node_ref.value()))
            } else {
                None
            }
        }
    }

    /// Smallest present element `>= value`.
    pub fn lower_bound(&self, value: &T) -> Option<T>
    where
        T: Clone,
    {
        let _pin = G::pin();
        let mut node = self.find_next_lowest(value);

        while !node.is_null() {
            let node_ref = unsafe { &*node };
            if node_ref.is_live() {
                return Some(node_ref.value().clone());
            }
            node = node_ref.next(0);
        }

        None
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert `value`. Returns `false` if an equal element is present.
    ///
    /// Retries until it either links the node or finds a live duplicate.
    pub fn insert(&self, value: T) -> bool {
        matches!(self.insert_internal(value, None), Ok(true))
    }

    /// Like [`insert`](Self::insert), but makes at most
    /// [`SkipListConfig::retry_limit`] find/lock/validate attempts before
    /// reporting [`SkipListError::Contention`]. The value is dropped on error.
    pub fn try_insert(&self, value: T) -> SkipListResult<bool> {
        let retry_limit = self.state.read().retry_limit;
        self.insert_internal(value, retry_limit)
    }

    fn insert_internal(&self, value: T, retry_limit: Option<usize>) -> SkipListResult<bool> {
        let _pin = G::pin();
        let top_level = self.sample_top_level();

        let mut preds: Tower<T> = [ptr::null_mut(); MAX_HEIGHT];
        let mut succs: Tower<T> = [ptr::null_mut(); MAX_HEIGHT];
        let mut attempts = 0;

        loop {
            if retry_limit.is_some_and(|limit| attempts >= limit) {
                log::debug!("insert gave up after {} attempts", attempts);
                return Err(SkipListError::Contention { attempts });
            }
            attempts += 1;

            if let Some(found_level) = self.find(&value, &mut preds, &mut succs) {
                let existing = unsafe { &*succs[found_level] };
                if !existing.is_marked() {
                    // Published within a few stores by its inserter.
                    while !existing.is_fully_linked() {
                        hint::spin_loop();
                    }
                    return Ok(false);
                }
                // Being removed; the slot frees up once its remover unlinks it.
                continue;
            }

            let mut locks = PredecessorLocks::new();
            let mut valid = true;
            for level in 0..=top_level {
                let pred = preds[level];
                let succ = succs[level];
                unsafe {
                    locks.lock(pred);
                    valid = !(*pred).is_marked()
                        && (succ.is_null() || !(*succ).is_marked())
                        && (*pred).next(level) == succ;
                }
                if !valid {
                    break;
                }
            }

            if !valid {
                continue;
            }

            let node = SkipNode::alloc(value, top_level);
            unsafe {
                for level in 0..=top_level {
                    (*node).set_next(level, succs[level]);
                }
                for level in 0..=top_level {
                    (*preds[level]).set_next(level, node);
                }

                // Counted before publication: no remover can claim the node
                // until it is fully linked, so count never underflows.
                self.state.write().count += 1;
                (*node).set_fully_linked();
            }

            drop(locks);
            return Ok(true);
        }
    }

    // =========================================================================
    // Remove
    // =========================================================================

    #[inline]
    fn can_delete(node: &SkipNode<T>, found_level: usize) -> bool {
        node.is_fully_linked() && node.top_level() == found_level && !node.is_marked()
    }

    /// Remove `value`. Returns `false` if it was absent, not yet published, or
    /// another remover claimed it first.
    pub fn remove(&self, value: &T) -> bool
    where
        G: Reclaim<T>,
    {
        let _pin = G::pin();

        let mut preds: Tower<T> = [ptr::null_mut(); MAX_HEIGHT];
        let mut succs: Tower<T> = [ptr::null_mut(); MAX_HEIGHT];

        let mut victim: SkipNodePtr<T> = ptr::null_mut();
        let mut victim_lock: Option<MutexGuard<'_, ()>> = None;
        let mut top_level = 0;

        loop {
            let found_level = self.find(value, &mut preds, &mut succs);

            if victim_lock.is_none() {
                let Some(found_level) = found_level else {
                    return false;
                };
                let candidate = unsafe { &*succs[found_level] };
                if !Self::can_delete(candidate, found_level) {
                    return false;
                }

                let lock = candidate.lock();
                if candidate.is_marked() {
                    // Lost the race to another remover.
                    return false;
                }
                candidate.mark();

                victim = succs[found_level];
                top_level = candidate.top_level();
                victim_lock = Some(lock);
            }

            let mut locks = PredecessorLocks::new();
            let mut valid = true;
            for (level, &pred) in preds.iter().enumerate().take(top_level + 1) {
                unsafe {
                    locks.lock(pred);
                    valid = !(*pred).is_marked() && (*pred).next(level) == victim;
                }
                if !valid {
                    break;
                }
            }

            if !valid {
                // The victim stays marked and locked; nobody else can claim it.
                continue;
            }

            unsafe {
                for level in (0..=top_level).rev() {
                    (*preds[level]).set_next(level, (*victim).next(level));
                }
            }

            drop(victim_lock.take());
            drop(locks);

            self.state.write().count -= 1;

            // Readers pinned before the unlink may still hold the node.
            unsafe {
                self.guard
                    .defer_destroy(victim as *mut (), SkipNode::<T>::dealloc_erased);
            }
            return true;
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    fn for_each_live(&self, mut f: impl FnMut(&T)) {
        let _pin = G::pin();
        let mut node = unsafe { (*self.head).next(0) };

        while !node.is_null() {
            let node_ref = unsafe { &*node };
            if node_ref.is_live() {
                f(node_ref.value());
            }
            node = node_ref.next(0);
        }
    }

    /// All present elements in ascending order.
    ///
    /// Memory-safe at any time, but only a consistent snapshot when no insert
    /// or remove runs concurrently.
    pub fn to_sorted_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut values = Vec::with_capacity(self.len());
        self.for_each_live(|value| values.push(value.clone()));
        values
    }
}

impl<T: Ord, G: Guard> Default for SkipList<T, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord, G: Guard> FromIterator<T> for SkipList<T, G> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let list = Self::new();
        for value in iter {
            list.insert(value);
        }
        list
    }
}

impl<T: Ord, G: Guard> Extend<T> for SkipList<T, G> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord + fmt::Debug, G: Guard> fmt::Debug for SkipList<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        self.for_each_live(|value| {
            set.entry(value);
        });
        set.finish()
    }
}

impl<T, G: Guard> Drop for SkipList<T, G> {
    fn drop(&mut self) {
        // Retired nodes are unreachable here and belong to the guard.
        unsafe {
            debug_assert!((*self.head).is_head());
            let mut node = (*self.head).next(0);
            while !node.is_null() {
                let next = (*node).next(0);
                SkipNode::dealloc(node);
                node = next;
            }
            SkipNode::dealloc(self.head);
        }
    }
}

// Nodes are shared between threads; elements are read concurrently.
unsafe impl<T: Send + Sync, G: Guard> Send for SkipList<T, G> {}
unsafe impl<T: Send + Sync, G: Guard> Sync for SkipList<T, G> {}

// ============================================================================
// Tests
// ============================================================================
