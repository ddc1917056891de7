//! Transaction model and lifecycle.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  quorum reached  ┌────────┐
//!   │ PENDING ├─────────────────▶│ ACTIVE │
//!   └────┬────┘                  └───┬────┘
//!        │ revoke                    │ revoke
//!        ▼                           ▼
//!   ┌──────────────────────────────────────┐
//!   │               REVOKED                │
//!   └──────────────────────────────────────┘
//! ```
//!
//! A transaction created with zero required vouches starts ACTIVE.
//! REVOKED is terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MpbankError, Points, Result, TransactionId, UserId};

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Waiting for vouch quorum. A pending transfer holds a reservation.
    Pending,
    /// Balance effect applied.
    Active,
    /// Reversed by an operator. Terminal.
    Revoked,
}

impl TransactionStatus {
    /// Can a transaction move from this status to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Active) | (Self::Pending | Self::Active, Self::Revoked)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        *self == Self::Revoked
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

/// The two transaction shapes, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Mint,
    Transfer,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mint => write!(f, "mint"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// Transaction shape. A sender exists exactly when the shape is a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    /// New MPs for the recipient.
    Mint,
    /// MPs moved from `sender` to the recipient.
    Transfer { sender: UserId },
}

impl TransactionKind {
    #[must_use]
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Self::Mint => TransactionType::Mint,
            Self::Transfer { .. } => TransactionType::Transfer,
        }
    }

    #[must_use]
    pub fn sender(&self) -> Option<UserId> {
        match self {
            Self::Mint => None,
            Self::Transfer { sender } => Some(*sender),
        }
    }
}

/// Who revoked a transaction, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_by: UserId,
    pub revoked_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// A ledger row.
///
/// Everything except `status` and `revocation` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub recipient: UserId,
    /// Magnitude of the balance effect. Always positive for a transfer; a
    /// negative mint is a penalty that debits the recipient.
    pub delta: Points,
    /// Free text, or `id:<key>` for a standard transaction.
    pub reason: String,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,
    pub required_vouches: u32,
    /// Populated only once the status is `Revoked`.
    pub revocation: Option<Revocation>,
}

impl Transaction {
    #[must_use]
    pub fn sender(&self) -> Option<UserId> {
        self.kind.sender()
    }

    #[must_use]
    pub fn transaction_type(&self) -> TransactionType {
        self.kind.transaction_type()
    }

    /// Whether `user` appears on either side of this transaction.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.recipient == user || self.sender() == Some(user)
    }

    /// Move PENDING|ACTIVE → REVOKED and record who did it.
    ///
    /// # Errors
    /// Returns `InvalidTransition` if the transaction is already revoked.
    pub fn mark_revoked(&mut self, revocation: Revocation) -> Result<()> {
        self.transition(TransactionStatus::Revoked)?;
        self.revocation = Some(revocation);
        Ok(())
    }

    fn transition(&mut self, target: TransactionStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(MpbankError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }
}
