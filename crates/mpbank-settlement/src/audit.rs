//! Ledger audit: recompute every balance from the ledger and compare.
//!
//! For each account the ledger implies
//!
//! ```text
//! total    = ∑ active mints to U + ∑ active transfers to U − ∑ active transfers from U
//! reserved = ∑ pending transfers from U
//! ```
//!
//! Revoked rows contribute nothing, because revocation reverses exactly
//! what the row had applied. Accounts start at zero and only move through
//! ledger rows, so any mismatch means a write landed without its
//! counterpart.
//!
//! The audit reads accounts and transactions as two separate statements and
//! is only meaningful when no writes are in flight.

use std::collections::HashMap;

use mpbank_store::LedgerStore;
use mpbank_types::{
    MpbankError, Points, Result, Transaction, TransactionKind, TransactionStatus, UserId,
};
use serde::{Deserialize, Serialize};

/// Totals observed by a clean audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub accounts_checked: usize,
    pub transactions_checked: usize,
    /// `∑ total` over all accounts; equals the net of active mints.
    pub total_supply: i128,
    /// `∑ reserved` over all accounts.
    pub total_reserved: i128,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Expected {
    total: i128,
    reserved: i128,
}

/// Recomputes balances from the ledger.
#[derive(Debug, Default)]
pub struct LedgerAudit {
    expected: HashMap<UserId, Expected>,
    transactions: usize,
}

impl LedgerAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one ledger row into the expected balances.
    pub fn record(&mut self, tx: &Transaction) {
        self.transactions += 1;
        let delta = i128::from(tx.delta);
        match (tx.status, tx.kind) {
            (TransactionStatus::Active, TransactionKind::Mint) => {
                self.expected.entry(tx.recipient).or_default().total += delta;
            }
            (TransactionStatus::Active, TransactionKind::Transfer { sender }) => {
                self.expected.entry(tx.recipient).or_default().total += delta;
                self.expected.entry(sender).or_default().total -= delta;
            }
            (TransactionStatus::Pending, TransactionKind::Transfer { sender }) => {
                self.expected.entry(sender).or_default().reserved += delta;
            }
            (TransactionStatus::Pending, TransactionKind::Mint)
            | (TransactionStatus::Revoked, _) => {}
        }
    }

    /// Compare expectations against stored balances.
    ///
    /// `balances` is `user → (total, reserved)` for every account.
    ///
    /// # Errors
    /// `InvariantViolation` naming the first mismatching account, a negative
    /// reservation, or a ledger row referencing an account that does not exist.
    pub fn verify(&self, balances: &HashMap<UserId, (Points, Points)>) -> Result<AuditReport> {
        let mut report = AuditReport {
            accounts_checked: balances.len(),
            transactions_checked: self.transactions,
            ..AuditReport::default()
        };

        for user in self.expected.keys() {
            if !balances.contains_key(user) {
                return Err(MpbankError::InvariantViolation {
                    reason: format!("ledger references missing account {user}"),
                });
            }
        }

        for (user, &(total, reserved)) in balances {
            if reserved < 0 {
                return Err(MpbankError::InvariantViolation {
                    reason: format!("account {user}: reserved is negative ({reserved})"),
                });
            }
            let expected = self.expected.get(user).copied().unwrap_or_default();
            let actual = Expected {
                total: i128::from(total),
                reserved: i128::from(reserved),
            };
            if expected != actual {
                return Err(MpbankError::InvariantViolation {
                    reason: format!(
                        "account {user}: ledger implies total {} reserved {}, stored total {total} reserved {reserved}",
                        expected.total, expected.reserved
                    ),
                });
            }
            report.total_supply += actual.total;
            report.total_reserved += actual.reserved;
        }

        Ok(report)
    }

    /// Read the whole store and verify it.
    ///
    /// # Errors
    /// Storage errors from the reads, or `InvariantViolation`.
    pub fn run<S: LedgerStore + ?Sized>(store: &S) -> Result<AuditReport> {
        let mut audit = Self::new();
        for tx in store.transactions().map_err(MpbankError::from)? {
            audit.record(&tx);
        }
        let balances = store
            .accounts()
            .map_err(MpbankError::from)?
            .into_iter()
            .map(|a| (a.user_id, (a.balance.total, a.balance.reserved)))
            .collect::<HashMap<_, _>>();
        audit.verify(&balances)
    }
}
