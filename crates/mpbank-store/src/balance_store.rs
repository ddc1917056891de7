//! Balance Store: the four per-account primitives.
//!
//! Each primitive is a single-row mutation. None of them checks that the
//! account can afford it; callers verify `available >= amount` before a
//! reservation and pin the revision they verified against.

use mpbank_types::{Account, AccountBalance, Points, UserId};

use crate::{LedgerStore, StoreError, StoreResult, WriteBatch, WriteOp};

/// Typed access to account balances.
pub struct BalanceStore<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> BalanceStore<'a, S> {
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fetch an account row.
    pub fn account(&self, user: UserId) -> StoreResult<Option<Account>> {
        self.store.account(user)
    }

    /// Fetch just the balance, treating a missing row as an error.
    pub fn balance(&self, user: UserId) -> StoreResult<AccountBalance> {
        self.store
            .account(user)?
            .map(|row| row.balance)
            .ok_or_else(|| StoreError::MissingRow {
                reason: format!("account {user}"),
            })
    }

    /// Insert a fresh zero-balance account.
    pub fn open(&self, account: Account) -> StoreResult<()> {
        self.store.commit(WriteBatch::single(WriteOp::OpenAccount(account)))
    }

    /// `total += amount` as its own statement.
    pub fn credit(&self, user: UserId, amount: Points) -> StoreResult<()> {
        self.store.commit(WriteBatch::single(WriteOp::credit(user, amount)))
    }

    /// `total -= amount` as its own statement.
    pub fn debit(&self, user: UserId, amount: Points) -> StoreResult<()> {
        self.store.commit(WriteBatch::single(WriteOp::debit(user, amount)))
    }

    /// `reserved += amount` if the row is still at `expected_revision`.
    pub fn reserve(&self, user: UserId, amount: Points, expected_revision: u64) -> StoreResult<()> {
        self.store
            .commit(WriteBatch::single(WriteOp::reserve(user, amount, expected_revision)))
    }

    /// `reserved -= amount` as its own statement.
    pub fn release(&self, user: UserId, amount: Points) -> StoreResult<()> {
        self.store.commit(WriteBatch::single(WriteOp::release(user, amount)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn primitives_mutate_one_row_each() {
        let store = MemoryStore::new();
        let balances = BalanceStore::new(&store);
        let user = UserId::new();
        balances.open(Account::open(user, "Grace")).unwrap();

        balances.credit(user, 80).unwrap();
        balances.reserve(user, 30, 1).unwrap();
        assert_eq!(
            balances.balance(user).unwrap(),
            AccountBalance {
                total: 80,
                reserved: 30
            }
        );
        assert_eq!(balances.balance(user).unwrap().available(), 50);

        balances.release(user, 30).unwrap();
        balances.debit(user, 80).unwrap();
        assert!(balances.balance(user).unwrap().is_zero());
        assert_eq!(balances.account(user).unwrap().unwrap().revision, 4);
    }

    #[test]
    fn primitives_do_not_enforce_available() {
        // The affordability check belongs to the caller.
        let store = MemoryStore::new();
        let balances = BalanceStore::new(&store);
        let user = UserId::new();
        balances.open(Account::open(user, "Grace")).unwrap();

        balances.debit(user, 10).unwrap();
        assert_eq!(balances.balance(user).unwrap().total, -10);
    }

    #[test]
    fn missing_account_is_reported() {
        let store = MemoryStore::new();
        let balances = BalanceStore::new(&store);
        let err = balances.balance(UserId::new()).unwrap_err();
        assert!(matches!(err, StoreError::MissingRow { .. }));
        assert!(balances.credit(UserId::new(), 1).is_err());
    }
}
