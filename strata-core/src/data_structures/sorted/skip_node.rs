use std::alloc::{Layout, alloc, dealloc};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use parking_lot::{Mutex, MutexGuard};

pub(crate) type SkipNodePtr<T> = *mut SkipNode<T>;

// ============================================================================
// SkipNode - value, tower of forward links, lock and visibility flags
// ============================================================================

/// A skip list node with an inline tower.
///
/// Single allocation per node: the forward links are laid out directly after
/// the header, `top_level + 1` of them.
///
/// ```text
/// [ value | top_level | marked | fully_linked | lock | forward[0..=top_level] ]
/// ```
///
/// `marked` and `fully_linked` are the two visibility flags:
/// - a node is reported present only when `fully_linked && !marked`
/// - `fully_linked` is set once, after every link of the tower is installed
/// - `marked` is set once, under the node's own lock, by the single remover
///   that wins the node
///
/// The lock is taken only while forward links that touch this node are being
/// rewired. Readers never take it.
#[repr(C)]
pub(crate) struct SkipNode<T> {
    value: Option<T>,
    top_level: usize,
    marked: AtomicBool,
    fully_linked: AtomicBool,
    lock: Mutex<()>,
    // Flexible array: forward[0..=top_level] follow the header.
    forward: [AtomicPtr<SkipNode<T>>; 0],
}

impl<T> SkipNode<T> {
    fn layout(top_level: usize) -> Layout {
        let tower = Layout::array::<AtomicPtr<Self>>(top_level + 1)
            .expect("tower of at most MAX_HEIGHT links always fits a layout");
        let (layout, _) = Layout::new::<Self>()
            .extend(tower)
            .expect("node header plus tower always fits a layout");
        layout.pad_to_align()
    }

    fn alloc_raw(value: Option<T>, top_level: usize, fully_linked: bool) -> *mut Self {
        let layout = Self::layout(top_level);
        unsafe {
            let node = alloc(layout) as *mut Self;
            if node.is_null() {
                std::alloc::handle_alloc_error(layout);
            }

            ptr::write(&raw mut (*node).value, value);
            ptr::write(&raw mut (*node).top_level, top_level);
            ptr::write(&raw mut (*node).marked, AtomicBool::new(false));
            ptr::write(&raw mut (*node).fully_linked, AtomicBool::new(fully_linked));
            ptr::write(&raw mut (*node).lock, Mutex::new(()));

            let tower = (&raw mut (*node).forward) as *mut AtomicPtr<Self>;
            for level in 0..=top_level {
                ptr::write(tower.add(level), AtomicPtr::new(ptr::null_mut()));
            }

            node
        }
    }

    /// A new, unpublished node. Its links are null and `fully_linked` is false.
    pub(crate) fn alloc(value: T, top_level: usize) -> *mut Self {
        Self::alloc_raw(Some(value), top_level, false)
    }

    /// The head sentinel: no value, always fully linked.
    pub(crate) fn alloc_head(top_level: usize) -> *mut Self {
        Self::alloc_raw(None, top_level, true)
    }

    /// Free a node and drop its value.
    ///
    /// # Safety
    /// `node` must come from `alloc`/`alloc_head`, must be unreachable by every
    /// reader and must not be freed twice.
    pub(crate) unsafe fn dealloc(node: *mut Self) {
        unsafe {
            let layout = Self::layout((*node).top_level);
            ptr::drop_in_place(&raw mut (*node).value);
            dealloc(node as *mut u8, layout);
        }
    }

    /// Type-erased `dealloc` for [`Guard::defer_destroy`](crate::guard::Guard::defer_destroy).
    ///
    /// # Safety
    /// Same as `dealloc`; `node` must be a `SkipNode<T>`.
    pub(crate) unsafe fn dealloc_erased(node: *mut ()) {
        unsafe { Self::dealloc(node as *mut Self) }
    }

    #[inline]
    pub(crate) fn is_head(&self) -> bool {
        self.value.is_none()
    }

    /// The stored value.
    ///
    /// Never called on the head: searches only compare values of successors.
    #[inline]
    pub(crate) fn value(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("head sentinel has no value"),
        }
    }

    #[inline]
    pub(crate) fn top_level(&self) -> usize {
        self.top_level
    }

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mark(&self) {
        self.marked.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_fully_linked(&self) -> bool {
        self.fully_linked.load(Ordering::Acquire)
    }

    /// Publish the node to lock-free readers.
    #[inline]
    pub(crate) fn set_fully_linked(&self) {
        self.fully_linked.store(true, Ordering::Release);
    }

    /// Present for membership purposes.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.is_fully_linked() && !self.is_marked()
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    #[inline]
    fn link(&self, level: usize) -> &AtomicPtr<SkipNode<T>> {
        debug_assert!(
            level <= self.top_level,
            "level {} above tower top {}",
            level,
            self.top_level
        );
        unsafe { &*self.forward.as_ptr().add(level) }
    }

    /// Load the forward link at `level` (Acquire).
    #[inline]
    pub(crate) fn next(&self, level: usize) -> SkipNodePtr<T> {
        self.link(level).load(Ordering::Acquire)
    }

    /// Store the forward link at `level` (Release).
    #[inline]
    pub(crate) fn set_next(&self, level: usize, node: SkipNodePtr<T>) {
        self.link(level).store(node, Ordering::Release)
    }
}
