//! Sorted set implementation.
//!
//! The list is parameterized by a guard type `G: Guard` that determines how
//! removed nodes are reclaimed:
//!
//! - `DeferredGuard`: frees retired nodes when the list drops
//! - `EpochGuard`: epoch-based reclamation (crossbeam-epoch, strata-crossbeam)

mod set_operations;
pub mod skip_list;
pub(crate) mod skip_node;

pub use skip_list::SkipList;
