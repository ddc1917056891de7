//! Transaction Ledger: durable record of every transaction and its status.

use mpbank_types::{Transaction, TransactionId, UserId};

use crate::{LedgerStore, Page, StoreResult};

/// Read access to ledger rows.
///
/// Status writes are compare-and-swap ops ([`crate::WriteOp::activate`],
/// [`crate::WriteOp::revoke`]) committed in the same batch as the balance
/// effect they make durable.
pub struct TransactionLedger<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> TransactionLedger<'a, S> {
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn get(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        self.store.transaction(id)
    }

    /// Rows where `user` is recipient or sender, newest first.
    pub fn involving(&self, user: UserId, page: Page) -> StoreResult<Vec<Transaction>> {
        self.store.transactions_involving(user, page)
    }

    pub fn all(&self) -> StoreResult<Vec<Transaction>> {
        self.store.transactions()
    }
}
