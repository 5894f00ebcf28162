//! Data structures.
//!
//! - [`sorted`] - lock-coupled skip list set and its set combinators
//! - [`level_generator`] - random tower heights

pub mod level_generator;
pub mod sorted;

pub use sorted::SkipList;
