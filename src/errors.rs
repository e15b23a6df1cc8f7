use thiserror::Error;

use crate::storage::StoreError;

/// Error type that captures the dues engine failure taxonomy.
#[derive(Debug, Error)]
pub enum DuesError {
    /// Malformed input, rejected before any persistence call.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Payout or pool debit requested against an insufficient dues pool.
    #[error("insufficient dues pool: requested {requested}, available {available}")]
    InsufficientPool { requested: i64, available: i64 },
    /// Lottery draw attempted with no eligible members.
    #[error("no active members to draw a winner from")]
    EmptyRoster,
    #[error("scheme not found: {0}")]
    SchemeNotFound(String),
    /// A derived-state invariant does not hold. Treated as data corruption
    /// and surfaced rather than silently repaired.
    #[error("inconsistent ledger state: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type DuesResult<T> = Result<T, DuesError>;

impl DuesError {
    pub fn validation(message: impl Into<String>) -> Self {
        DuesError::Validation(message.into())
    }
}
