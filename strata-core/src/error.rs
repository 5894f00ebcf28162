use thiserror::Error;

/// Failures reported by skip list operations.
///
/// Ordinary outcomes (missing value, duplicate insert, losing a removal race)
/// are plain `bool` results, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipListError {
    /// `try_insert` used up its attempt budget without linking or finding
    /// the value.
    #[error("insert abandoned after {attempts} attempts")]
    Contention { attempts: usize },

    #[error("invalid skip list configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type SkipListResult<T> = Result<T, SkipListError>;
