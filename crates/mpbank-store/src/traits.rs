//! The store abstraction the settlement engine runs against.

use std::sync::Arc;

use mpbank_types::{Account, Transaction, TransactionId, UserId, Vouch};
use serde::{Deserialize, Serialize};

use crate::{StoreResult, WriteBatch};

/// Limit/offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    #[must_use]
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

/// Persistent relational store backing the bank.
///
/// Reads are individual statements. Writes go through [`LedgerStore::commit`];
/// a backend must either apply the whole batch or report which part landed
/// via [`crate::StoreError::PartiallyApplied`].
pub trait LedgerStore: Send + Sync {
    /// Fetch one account row.
    fn account(&self, user: UserId) -> StoreResult<Option<Account>>;

    /// Every account row, in no particular order.
    fn accounts(&self) -> StoreResult<Vec<Account>>;

    /// Fetch one ledger row.
    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>>;

    /// Every ledger row, in no particular order.
    fn transactions(&self) -> StoreResult<Vec<Transaction>>;

    /// Rows where `user` is recipient or sender, newest first.
    fn transactions_involving(&self, user: UserId, page: Page) -> StoreResult<Vec<Transaction>>;

    /// Vouches for one transaction in insertion order.
    fn vouches(&self, id: TransactionId) -> StoreResult<Vec<Vouch>>;

    /// Number of vouches for one transaction.
    fn vouch_count(&self, id: TransactionId) -> StoreResult<u32>;

    /// Apply a batch of writes.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

impl<S: LedgerStore + ?Sized> LedgerStore for Arc<S> {
    fn account(&self, user: UserId) -> StoreResult<Option<Account>> {
        (**self).account(user)
    }

    fn accounts(&self) -> StoreResult<Vec<Account>> {
        (**self).accounts()
    }

    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        (**self).transaction(id)
    }

    fn transactions(&self) -> StoreResult<Vec<Transaction>> {
        (**self).transactions()
    }

    fn transactions_involving(&self, user: UserId, page: Page) -> StoreResult<Vec<Transaction>> {
        (**self).transactions_involving(user, page)
    }

    fn vouches(&self, id: TransactionId) -> StoreResult<Vec<Vouch>> {
        (**self).vouches(id)
    }

    fn vouch_count(&self, id: TransactionId) -> StoreResult<u32> {
        (**self).vouch_count(id)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        (**self).commit(batch)
    }
}
