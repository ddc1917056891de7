//! Write batches: the unit of atomicity offered by a store.
//!
//! A batch is an ordered list of row mutations and guards. A conforming
//! backend applies either every op or none; guards fail the whole batch
//! when the row they inspect has moved since it was read.

use mpbank_types::{
    Account, Points, Revocation, Transaction, TransactionId, TransactionStatus, UserId, Vouch,
};

/// A single row mutation or guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert a new account row. Fails with `Duplicate` if it exists.
    OpenAccount(Account),
    /// `total += amount`.
    Credit { user: UserId, amount: Points },
    /// `total -= amount`. No floor: totals may go negative.
    Debit { user: UserId, amount: Points },
    /// `reserved += amount`, only if the row is still at `expected_revision`.
    Reserve {
        user: UserId,
        amount: Points,
        expected_revision: u64,
    },
    /// `reserved -= amount`.
    Release { user: UserId, amount: Points },
    /// Insert a ledger row. Fails with `Duplicate` if the id exists.
    InsertTransaction(Transaction),
    /// Guard: the transaction must currently have `status`.
    RequireStatus {
        id: TransactionId,
        status: TransactionStatus,
    },
    /// Guard: the transaction must currently have exactly `count` vouches.
    RequireVouchCount { id: TransactionId, count: u32 },
    /// Compare-and-swap on the status column, optionally recording a revocation.
    TransitionStatus {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
        revocation: Option<Revocation>,
    },
    /// Insert a vouch. Fails with `Duplicate` on a repeated (transaction, voucher) pair.
    InsertVouch(Vouch),
}

impl WriteOp {
    #[must_use]
    pub fn credit(user: UserId, amount: Points) -> Self {
        Self::Credit { user, amount }
    }

    #[must_use]
    pub fn debit(user: UserId, amount: Points) -> Self {
        Self::Debit { user, amount }
    }

    #[must_use]
    pub fn reserve(user: UserId, amount: Points, expected_revision: u64) -> Self {
        Self::Reserve {
            user,
            amount,
            expected_revision,
        }
    }

    #[must_use]
    pub fn release(user: UserId, amount: Points) -> Self {
        Self::Release { user, amount }
    }

    /// PENDING → ACTIVE.
    #[must_use]
    pub fn activate(id: TransactionId) -> Self {
        Self::TransitionStatus {
            id,
            from: TransactionStatus::Pending,
            to: TransactionStatus::Active,
            revocation: None,
        }
    }

    /// `from` → REVOKED, recording who revoked it.
    #[must_use]
    pub fn revoke(id: TransactionId, from: TransactionStatus, revocation: Revocation) -> Self {
        Self::TransitionStatus {
            id,
            from,
            to: TransactionStatus::Revoked,
            revocation: Some(revocation),
        }
    }

    /// Short tag for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAccount(_) => "open_account",
            Self::Credit { .. } => "credit",
            Self::Debit { .. } => "debit",
            Self::Reserve { .. } => "reserve",
            Self::Release { .. } => "release",
            Self::InsertTransaction(_) => "insert_transaction",
            Self::RequireStatus { .. } => "require_status",
            Self::RequireVouchCount { .. } => "require_vouch_count",
            Self::TransitionStatus { .. } => "transition_status",
            Self::InsertVouch(_) => "insert_vouch",
        }
    }
}

/// Ordered ops committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch holding a single op.
    #[must_use]
    pub fn single(op: WriteOp) -> Self {
        Self { ops: vec![op] }
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = WriteOp>) -> &mut Self {
        self.ops.extend(ops);
        self
    }

    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Op names joined for log fields, e.g. `"insert_transaction,credit"`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.ops.iter().map(WriteOp::name).collect::<Vec<_>>().join(",")
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
