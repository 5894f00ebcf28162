//! Random tower heights for new nodes.
//!
//! Two interchangeable strategies:
//!
//! ```text
//! fast mode      one 30-bit random mask, height = trailing zeros + 1
//!                geometric with p = 0.5, a single RNG call
//! variable mode  Bernoulli trials with the configured probability,
//!                one RNG call per extra level
//! ```
//!
//! Both return a height in `[1, max_height]`.

use crate::config::MAX_HEIGHT;

const HEIGHT_MASK: u32 = (1 << MAX_HEIGHT) - 1;

/// Sample a tower height (1-based) for a new node.
#[inline]
pub fn sample_height(probability: f64, max_height: usize, fast_mode: bool) -> usize {
    let max_height = max_height.clamp(1, MAX_HEIGHT);
    if fast_mode {
        fast_height(max_height)
    } else {
        variable_height(probability, max_height)
    }
}

/// Counting trailing zeros of a uniform mask reproduces consecutive coin
/// tosses: bit 0 set is height 1 (1/2), bits 0..1 clear and bit 1 set is
/// height 2 (1/4), and so on. The guard bit caps an all-zero mask at
/// `MAX_HEIGHT + 1` before clamping.
#[inline]
fn fast_height(max_height: usize) -> usize {
    let mask = (fastrand::u32(..) & HEIGHT_MASK) | (1 << MAX_HEIGHT);
    let height = mask.trailing_zeros() as usize + 1;
    height.min(max_height)
}

#[inline]
fn variable_height(probability: f64, max_height: usize) -> usize {
    let mut height = 1;
    while height < max_height && fastrand::f64() < probability {
        height += 1;
    }
    height
}
