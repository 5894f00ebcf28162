//! Epoch-based reclamation for strata skip lists.
//!
//! Provides `EpochGuard`, an implementation of the `Guard` trait on top of
//! crossbeam-epoch. Removed nodes are freed once every thread pinned at the
//! time of removal has moved on, instead of when the list drops.
//!
//! ```
//! use strata_core::SkipList;
//! use strata_crossbeam::EpochGuard;
//!
//! let list: SkipList<i32, EpochGuard> = SkipList::new();
//! list.insert(42);
//! assert_eq!(list.get(&42).map(|v| *v), Some(42));
//! ```

pub mod epoch_guard;

pub use epoch_guard::{EpochGuard, EpochRef};
