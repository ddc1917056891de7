//! Balance effects of a ledger row.
//!
//! | status  | type     | apply                              | reverse                           |
//! |---------|----------|------------------------------------|-----------------------------------|
//! | active  | transfer | debit S, release S, credit R       | debit R, credit S                 |
//! | active  | mint     | credit R (debit R if negative)     | debit R (credit R if negative)    |
//! | pending | transfer | (reserved at create)               | release S                         |
//! | pending | mint     | (nothing)                          | (nothing)                         |
//!
//! Applying and then reversing leaves every `(total, reserved)` pair exactly
//! where it was before the row was created.

use mpbank_store::WriteOp;
use mpbank_types::{Points, Transaction, TransactionKind, TransactionStatus, UserId};

/// Move `user`'s total by a signed `delta`.
fn adjust(user: UserId, delta: Points) -> WriteOp {
    if delta < 0 {
        WriteOp::debit(user, delta.saturating_neg())
    } else {
        WriteOp::credit(user, delta)
    }
}

/// Ops that move a transaction's points into place.
///
/// For a transfer this also consumes the sender's reservation.
#[must_use]
pub fn settlement_ops(tx: &Transaction) -> Vec<WriteOp> {
    match tx.kind {
        TransactionKind::Mint => vec![adjust(tx.recipient, tx.delta)],
        TransactionKind::Transfer { sender } => vec![
            WriteOp::debit(sender, tx.delta),
            WriteOp::release(sender, tx.delta),
            WriteOp::credit(tx.recipient, tx.delta),
        ],
    }
}

/// Ops that undo whatever `tx` has done so far, or `None` if it is
/// already revoked.
#[must_use]
pub fn reversal_ops(tx: &Transaction) -> Option<Vec<WriteOp>> {
    let ops = match (tx.status, tx.kind) {
        (TransactionStatus::Revoked, _) => return None,
        (TransactionStatus::Active, TransactionKind::Transfer { sender }) => vec![
            WriteOp::debit(tx.recipient, tx.delta),
            WriteOp::credit(sender, tx.delta),
        ],
        (TransactionStatus::Active, TransactionKind::Mint) => {
            vec![adjust(tx.recipient, tx.delta.saturating_neg())]
        }
        (TransactionStatus::Pending, TransactionKind::Transfer { sender }) => {
            vec![WriteOp::release(sender, tx.delta)]
        }
        (TransactionStatus::Pending, TransactionKind::Mint) => Vec::new(),
    };
    Some(ops)
}
