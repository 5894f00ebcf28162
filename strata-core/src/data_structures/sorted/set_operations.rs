//! Union and intersection of two lists into a fresh list.
//!
//! Both inputs are borrowed `&mut`: the merge walks them without pinning or
//! locking, so no other thread may touch them while it runs.
//!
//! ```text
//! *_simple          output towers copied from the inputs
//!                   union: tower of the contributing node (b's on ties)
//!                   intersection: the lower of the two towers
//! union/intersection   every output tower freshly sampled
//! *_with_config        same, with caller-supplied parameters
//! ```
//!
//! The output is built by appending in ascending order, keeping the last node
//! written at every level, so each element costs O(tower) link writes.

use std::cmp::Ordering;

use crate::config::{MAX_HEIGHT, SkipListConfig};
use crate::data_structures::level_generator::sample_height;
use crate::data_structures::sorted::skip_list::SkipList;
use crate::data_structures::sorted::skip_node::{SkipNode, SkipNodePtr};
use crate::guard::Guard;

/// How output towers are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TowerPolicy {
    /// Reuse the input tower.
    Inherit,
    /// Sample with the output list's parameters.
    Resample,
}

/// Appends nodes in ascending order to a list nobody else can see yet.
struct Appender<T> {
    tails: [SkipNodePtr<T>; MAX_HEIGHT],
    count: usize,
    height: usize,
}

impl<T> Appender<T> {
    fn new(head: SkipNodePtr<T>) -> Self {
        Appender {
            tails: [head; MAX_HEIGHT],
            count: 0,
            height: 1,
        }
    }

    fn push(&mut self, value: T, top_level: usize) {
        let node = SkipNode::alloc(value, top_level);
        for level in 0..=top_level {
            unsafe { (*self.tails[level]).set_next(level, node) };
            self.tails[level] = node;
        }
        unsafe { (*node).set_fully_linked() };

        self.count += 1;
        self.height = self.height.max(top_level + 1);
    }
}

/// First present node at or after `node` on level 0.
///
/// # Safety
/// `node` must be null or a node of a list the caller has exclusive access to.
unsafe fn skip_dead<T>(mut node: SkipNodePtr<T>) -> SkipNodePtr<T> {
    unsafe {
        while !node.is_null() && !(*node).is_live() {
            node = (*node).next(0);
        }
    }
    node
}

/// # Safety
/// Same as [`skip_dead`]; `node` must be non-null.
unsafe fn next_live<T>(node: SkipNodePtr<T>) -> SkipNodePtr<T> {
    unsafe { skip_dead((*node).next(0)) }
}

impl<T: Ord + Clone, G: Guard> SkipList<T, G> {
    fn first_live(&self) -> SkipNodePtr<T> {
        unsafe { skip_dead((*self.head).next(0)) }
    }

    /// First present node `>= value`. Jumps down the towers instead of walking
    /// level 0.
    fn seek(&self, value: &T) -> SkipNodePtr<T> {
        unsafe { skip_dead(self.find_next_lowest(value)) }
    }

    fn output_top_level(&self, policy: TowerPolicy, inherited: usize) -> usize {
        match policy {
            TowerPolicy::Inherit => inherited,
            TowerPolicy::Resample => {
                let state = self.state.read();
                sample_height(state.probability, state.max_height, state.fast_mode) - 1
            }
        }
    }

    fn finish(&mut self, appender: Appender<T>) {
        let state = self.state.get_mut();
        state.count = appender.count;
        state.height = appender.height;
    }

    // =========================================================================
    // Union
    // =========================================================================

    /// Every element of `a` or `b`, with freshly sampled towers.
    ///
    /// The output takes `a`'s probability and mode, and the larger of the two
    /// max heights.
    pub fn union(a: &mut Self, b: &mut Self) -> Self {
        let config = SkipListConfig {
            max_height: a.max_height().max(b.max_height()),
            ..a.config()
        };
        Self::merge_union(config, TowerPolicy::Resample, a, b)
    }

    /// Every element of `a` or `b`, keeping the towers of the input nodes.
    pub fn union_simple(a: &mut Self, b: &mut Self) -> Self {
        Self::merge_union(SkipListConfig::default(), TowerPolicy::Inherit, a, b)
    }

    /// Every element of `a` or `b`, with towers sampled from `config`.
    ///
    /// `config.max_height` is raised to cover both inputs.
    pub fn union_with_config(config: SkipListConfig, a: &mut Self, b: &mut Self) -> Self {
        let config = config.normalized();
        let config = SkipListConfig {
            max_height: config.max_height.max(a.max_height()).max(b.max_height()),
            ..config
        };
        Self::merge_union(config, TowerPolicy::Resample, a, b)
    }

    fn merge_union(config: SkipListConfig, policy: TowerPolicy, a: &Self, b: &Self) -> Self {
        let mut result = Self::with_config(config);
        let mut appender = Appender::new(result.head);

        let mut a_node = a.first_live();
        let mut b_node = b.first_live();

        loop {
            let source = match (a_node.is_null(), b_node.is_null()) {
                (true, true) => break,
                (false, true) => {
                    let node = a_node;
                    a_node = unsafe { next_live(a_node) };
                    node
                }
                (true, false) => {
                    let node = b_node;
                    b_node = unsafe { next_live(b_node) };
                    node
                }
                (false, false) => {
                    let ordering = unsafe { (*a_node).value().cmp((*b_node).value()) };
                    match ordering {
                        Ordering::Less => {
                            let node = a_node;
                            a_node = unsafe { next_live(a_node) };
                            node
                        }
                        Ordering::Greater => {
                            let node = b_node;
                            b_node = unsafe { next_live(b_node) };
                            node
                        }
                        Ordering::Equal => {
                            // One output node for the pair; b's copy wins.
                            let node = b_node;
                            a_node = unsafe { next_live(a_node) };
                            b_node = unsafe { next_live(b_node) };
                            node
                        }
                    }
                }
            };

            let source = unsafe { &*source };
            let top_level = result.output_top_level(policy, source.top_level());
            appender.push(source.value().clone(), top_level);
        }

        log::trace!(
            "union of {} and {} elements produced {}",
            a.len(),
            b.len(),
            appender.count
        );
        result.finish(appender);
        result
    }

    // =========================================================================
    // Intersection
    // =========================================================================

    /// Elements present in both `a` and `b`, with freshly sampled towers.
    ///
    /// The output takes `a`'s probability and mode. Its max height covers the
    /// current heights of both inputs.
    pub fn intersection(a: &mut Self, b: &mut Self) -> Self {
        let config = SkipListConfig {
            max_height: a.max_height().max(a.height()).max(b.height()),
            ..a.config()
        };
        Self::merge_intersection(config, TowerPolicy::Resample, a, b)
    }

    /// Elements present in both `a` and `b`; each output node gets the lower
    /// of the two input towers.
    pub fn intersection_simple(a: &mut Self, b: &mut Self) -> Self {
        Self::merge_intersection(SkipListConfig::default(), TowerPolicy::Inherit, a, b)
    }

    /// Elements present in both `a` and `b`, with towers sampled from `config`.
    ///
    /// `config.max_height` is raised to cover the current heights of both
    /// inputs.
    pub fn intersection_with_config(config: SkipListConfig, a: &mut Self, b: &mut Self) -> Self {
        let config = config.normalized();
        let config = SkipListConfig {
            max_height: config.max_height.max(a.height()).max(b.height()),
            ..config
        };
        Self::merge_intersection(config, TowerPolicy::Resample, a, b)
    }

    fn merge_intersection(config: SkipListConfig, policy: TowerPolicy, a: &Self, b: &Self) -> Self {
        let mut result = Self::with_config(config);
        let mut appender = Appender::new(result.head);

        let mut a_node = a.first_live();
        let mut b_node = b.first_live();

        while !a_node.is_null() && !b_node.is_null() {
            let (a_ref, b_ref) = unsafe { (&*a_node, &*b_node) };

            match a_ref.value().cmp(b_ref.value()) {
                Ordering::Equal => {
                    let inherited = a_ref.top_level().min(b_ref.top_level());
                    let top_level = result.output_top_level(policy, inherited);
                    appender.push(a_ref.value().clone(), top_level);

                    a_node = unsafe { next_live(a_node) };
                    b_node = unsafe { next_live(b_node) };
                }
                // Skip the lagging side straight to the other's value.
                Ordering::Less => a_node = a.seek(b_ref.value()),
                Ordering::Greater => b_node = b.seek(a_ref.value()),
            }
        }

        log::trace!(
            "intersection of {} and {} elements produced {}",
            a.len(),
            b.len(),
            appender.count
        );
        result.finish(appender);
        result
    }
}
