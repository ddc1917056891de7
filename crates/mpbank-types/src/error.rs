//! Error types for the MP bank settlement engine.
//!
//! All errors use the `MP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by class:
//! - 1xx: Validation (rejected before any mutation)
//! - 2xx: Permission (rejected before any mutation)
//! - 3xx: Not found
//! - 4xx: Conflict with current state
//! - 8xx: Storage unavailable (nothing written)
//! - 9xx: Internal / fatal inconsistency

use thiserror::Error;

use crate::{Capability, Points, TransactionId, TransactionStatus, UserId};

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Validation,
    Permission,
    NotFound,
    Conflict,
    Storage,
    Internal,
    /// A multi-step mutation was partially applied. Never retry automatically.
    Fatal,
}

/// Central error enum for all MP bank operations.
#[derive(Debug, Error)]
pub enum MpbankError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// An identifier could not be parsed.
    #[error("MP_ERR_100: Malformed {kind} identifier: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },

    /// A required request field is missing or blank.
    #[error("MP_ERR_101: Missing or invalid field `{field}`")]
    MissingField { field: &'static str },

    /// The delta is zero, unparseable, or has the wrong sign for the mode.
    #[error("MP_ERR_102: Invalid delta: {reason}")]
    InvalidDelta { reason: String },

    /// A `id:<key>` reason references a key absent from the catalog.
    #[error("MP_ERR_103: Unknown standard transaction id: {0}")]
    UnknownStandardTransaction(String),

    /// The mode is neither `mint` nor `transfer`.
    #[error("MP_ERR_104: Unknown transaction mode: {0}")]
    InvalidMode(String),

    /// The resolved sender and recipient are the same account.
    #[error("MP_ERR_105: Sender and recipient must differ")]
    SelfTransfer,

    /// Pagination parameters out of range.
    #[error("MP_ERR_106: Invalid page: {reason}")]
    InvalidPage { reason: String },

    // =================================================================
    // Permission Errors (2xx)
    // =================================================================
    /// The caller's role mask lacks the capability the action needs.
    #[error("MP_ERR_200: Missing `{capability}` role required to {action}")]
    PermissionDenied {
        capability: Capability,
        action: &'static str,
    },

    /// The creator of a transaction tried to vouch for it.
    #[error("MP_ERR_201: Cannot vouch for your own transaction")]
    SelfVouch,

    /// The recipient of a transaction tried to vouch for it.
    #[error("MP_ERR_202: Cannot vouch for a transaction you are receiving")]
    RecipientVouch,

    // =================================================================
    // Not Found (3xx)
    // =================================================================
    #[error("MP_ERR_300: User not found: {0}")]
    UserNotFound(UserId),

    #[error("MP_ERR_301: Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    // =================================================================
    // Conflict Errors (4xx)
    // =================================================================
    /// Not enough available (`total - reserved`) balance.
    #[error("MP_ERR_400: Insufficient available balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Points, available: Points },

    /// The voucher already vouched for this transaction.
    #[error("MP_ERR_401: User {voucher} already vouched for {transaction}")]
    DuplicateVouch {
        transaction: TransactionId,
        voucher: UserId,
    },

    /// Revoking twice is an error, not a no-op.
    #[error("MP_ERR_402: Transaction already revoked: {0}")]
    AlreadyRevoked(TransactionId),

    /// Vouching requires a pending transaction.
    #[error("MP_ERR_403: Transaction {id} is {status}, cannot vouch")]
    TransactionNotPending {
        id: TransactionId,
        status: TransactionStatus,
    },

    /// A status change not allowed by the lifecycle.
    #[error("MP_ERR_404: Transaction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// A racing writer changed a row between read and write.
    #[error("MP_ERR_405: Concurrent modification: {reason}")]
    ConcurrentModification { reason: String },

    #[error("MP_ERR_406: Account already exists: {0}")]
    AccountExists(UserId),

    /// A balance mutation would overflow the point range.
    #[error("MP_ERR_407: Balance overflow: {reason}")]
    BalanceOverflow { reason: String },

    // =================================================================
    // Storage (8xx)
    // =================================================================
    /// The store rejected the request without writing anything.
    #[error("MP_ERR_800: Storage unavailable: {0}")]
    StorageUnavailable(String),

    // =================================================================
    // Internal / Fatal (9xx)
    // =================================================================
    /// Unexpected internal error.
    #[error("MP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Part of a settlement step landed and part did not.
    #[error("MP_ERR_901: Partial settlement of {transaction} during {step}: {detail}")]
    PartialSettlement {
        transaction: TransactionId,
        step: &'static str,
        detail: String,
    },

    /// A reservation could not be released after a failed insert.
    #[error("MP_ERR_902: Reservation of {amount} on {user} leaked: {detail}")]
    CompensationFailed {
        user: UserId,
        amount: Points,
        detail: String,
    },

    /// The ledger audit found balances that do not match the ledger.
    #[error("MP_ERR_903: Ledger invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("MP_ERR_904: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("MP_ERR_905: Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("MP_ERR_906: I/O error: {0}")]
    Io(String),

    /// The store reported a batch that landed only in part, outside any
    /// settlement step that could name the transaction.
    #[error("MP_ERR_907: Store applied a batch partially: {0}")]
    PartialWrite(String),
}

impl MpbankError {
    /// The coarse class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidIdentifier { .. }
            | Self::MissingField { .. }
            | Self::InvalidDelta { .. }
            | Self::UnknownStandardTransaction(_)
            | Self::InvalidMode(_)
            | Self::SelfTransfer
            | Self::InvalidPage { .. } => ErrorClass::Validation,
            Self::PermissionDenied { .. } | Self::SelfVouch | Self::RecipientVouch => {
                ErrorClass::Permission
            }
            Self::UserNotFound(_) | Self::TransactionNotFound(_) => ErrorClass::NotFound,
            Self::InsufficientBalance { .. }
            | Self::DuplicateVouch { .. }
            | Self::AlreadyRevoked(_)
            | Self::TransactionNotPending { .. }
            | Self::InvalidTransition { .. }
            | Self::ConcurrentModification { .. }
            | Self::AccountExists(_)
            | Self::BalanceOverflow { .. } => ErrorClass::Conflict,
            Self::StorageUnavailable(_) => ErrorClass::Storage,
            Self::Internal(_) | Self::Configuration(_) | Self::Serialization(_) | Self::Io(_) => {
                ErrorClass::Internal
            }
            Self::PartialSettlement { .. }
            | Self::CompensationFailed { .. }
            | Self::InvariantViolation { .. }
            | Self::PartialWrite(_) => ErrorClass::Fatal,
        }
    }

    /// Whether the caller may retry (with corrected input or later).
    /// Guaranteed: no ledger mutation happened.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.class(), ErrorClass::Internal | ErrorClass::Fatal)
    }

    /// Whether the ledger may be inconsistent and needs an operator.
    #[must_use]
    pub fn requires_operator(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MpbankError>;

impl From<std::io::Error> for MpbankError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MpbankError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
