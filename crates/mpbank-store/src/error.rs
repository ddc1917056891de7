//! Store-level errors.
//!
//! Every variant except [`StoreError::PartiallyApplied`] guarantees that
//! nothing from the rejected batch was written.

use mpbank_types::MpbankError;
use thiserror::Error;

/// Errors raised by a [`crate::LedgerStore`] backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A guard op failed: expected revision or status did not match.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// A uniqueness constraint rejected an insert.
    #[error("duplicate: {reason}")]
    Duplicate { reason: String },

    /// A write referenced a row that does not exist.
    #[error("missing row: {reason}")]
    MissingRow { reason: String },

    /// A balance mutation would leave the point range.
    #[error("overflow: {reason}")]
    Overflow { reason: String },

    /// The batch itself is malformed (negative amount, illegal transition).
    #[error("invalid write: {reason}")]
    InvalidWrite { reason: String },

    /// The backend could not be reached; nothing was written.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A backend without atomic batches wrote `applied` ops and then failed.
    #[error("partially applied ({applied} of {total} ops): {reason}")]
    PartiallyApplied {
        applied: usize,
        total: usize,
        reason: String,
    },
}

impl StoreError {
    /// Whether some of the batch may have landed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartiallyApplied { .. })
    }
}

/// Store result alias.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for MpbankError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { reason } | StoreError::Duplicate { reason } => {
                Self::ConcurrentModification { reason }
            }
            StoreError::Overflow { reason } => Self::BalanceOverflow { reason },
            StoreError::Unavailable(reason) => Self::StorageUnavailable(reason),
            StoreError::MissingRow { reason } | StoreError::InvalidWrite { reason } => {
                Self::Internal(reason)
            }
            partial @ StoreError::PartiallyApplied { .. } => Self::PartialWrite(partial.to_string()),
        }
    }
}
