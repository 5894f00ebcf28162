//! Skip list construction parameters.
//!
//! Every list carries a [`SkipListConfig`]. Out-of-range values are never
//! fatal: [`SkipListConfig::normalized`] clamps them to the nearest safe value
//! and logs a warning. Callers that prefer a hard failure can run
//! [`SkipListConfig::validate`] first.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SkipListError;

/// Structural maximum tower height shared by every list.
pub const MAX_HEIGHT: usize = 30;

/// Lowest success probability accepted by the variable-height generator.
pub const MIN_PROBABILITY: f64 = 0.01;

/// Success probability used when none (or a negative one) is given.
pub const DEFAULT_PROBABILITY: f64 = 0.5;

/// Parameters of a skip list.
///
/// ```text
/// probability  success probability of each coin toss (variable mode only)
/// max_height   ceiling on the tower height of new nodes, 1..=30
/// fast_mode    one random draw per height with p = 0.5 instead of coin tosses
/// retry_limit  find/lock/validate attempts `try_insert` may make (None = unbounded)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SkipListConfig {
    pub probability: f64,
    pub max_height: usize,
    pub fast_mode: bool,
    pub retry_limit: Option<usize>,
}

impl Default for SkipListConfig {
    fn default() -> Self {
        SkipListConfig {
            probability: DEFAULT_PROBABILITY,
            max_height: MAX_HEIGHT,
            fast_mode: true,
            retry_limit: None,
        }
    }
}

impl SkipListConfig {
    pub fn new(probability: f64, max_height: usize, fast_mode: bool) -> Self {
        SkipListConfig {
            probability,
            max_height,
            fast_mode,
            retry_limit: None,
        }
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_max_height(mut self, max_height: usize) -> Self {
        self.max_height = max_height;
        self
    }

    pub fn with_fast_mode(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }

    pub fn with_retry_limit(mut self, retry_limit: usize) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }

    /// Strict check. Returns the first parameter that `normalized` would change.
    pub fn validate(&self) -> Result<(), SkipListError> {
        if self.probability.is_nan() || self.probability < MIN_PROBABILITY || self.probability > 1.0 {
            return Err(SkipListError::InvalidConfig {
                reason: format!(
                    "probability {} outside [{}, 1.0]",
                    self.probability, MIN_PROBABILITY
                ),
            });
        }
        if self.max_height == 0 || self.max_height > MAX_HEIGHT {
            return Err(SkipListError::InvalidConfig {
                reason: format!("max height {} outside [1, {}]", self.max_height, MAX_HEIGHT),
            });
        }
        Ok(())
    }

    /// Clamp every parameter into its supported range.
    ///
    /// A negative (or NaN) probability falls back to [`DEFAULT_PROBABILITY`];
    /// anything else is clamped to `[MIN_PROBABILITY, 1.0]`. The max height is
    /// clamped to `[1, MAX_HEIGHT]`.
    pub fn normalized(self) -> Self {
        SkipListConfig {
            probability: clamp_probability(self.probability),
            max_height: clamp_max_height(self.max_height),
            ..self
        }
    }
}

pub(crate) fn clamp_probability(probability: f64) -> f64 {
    if probability.is_nan() || probability < 0.0 {
        log::warn!(
            "probability {} is negative, using {} instead",
            probability,
            DEFAULT_PROBABILITY
        );
        return DEFAULT_PROBABILITY;
    }

    let clamped = probability.clamp(MIN_PROBABILITY, 1.0);
    if clamped != probability {
        log::warn!("probability {} clamped to {}", probability, clamped);
    }
    clamped
}

pub(crate) fn clamp_max_height(max_height: usize) -> usize {
    let clamped = max_height.clamp(1, MAX_HEIGHT);
    if clamped != max_height {
        log::warn!(
            "max height {} is not supported, using {} instead",
            max_height,
            clamped
        );
    }
    clamped
}
