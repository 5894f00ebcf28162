//! Concurrent ordered set built on a lock-coupled skip list.
//!
//! ```text
//! SkipList<T, G: Guard>
//!     insert / remove     per-node locks on predecessors, validate, retry
//!     contains / get      lock-free walk, pinned through G
//!     union / intersection   merge two exclusively borrowed lists
//! ```

pub mod common_tests;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod guard;

pub use config::{DEFAULT_PROBABILITY, MAX_HEIGHT, MIN_PROBABILITY, SkipListConfig};
pub use data_structures::SkipList;
pub use error::{SkipListError, SkipListResult};
pub use guard::{DeferredGuard, DeferredRef, Guard, Reclaim};
