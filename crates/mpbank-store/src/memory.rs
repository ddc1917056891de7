//! In-memory store for tests, demos and single-process deployments.
//!
//! Each batch is staged against a snapshot of the rows it touches and only
//! written back once every op has succeeded, all under one write lock. That
//! gives serializable batches: a guard op sees exactly the state the batch
//! will commit on top of.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mpbank_types::{Account, Points, Transaction, TransactionId, UserId, Vouch};
use parking_lot::RwLock;

use crate::{LedgerStore, Page, StoreError, StoreResult, WriteBatch, WriteOp};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<UserId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    /// Insertion order is the vouch order.
    vouches: Vec<Vouch>,
    vouch_keys: HashSet<(TransactionId, UserId)>,
}

/// Rows modified by an in-flight batch, layered over the committed tables.
struct Staging<'a> {
    base: &'a Tables,
    accounts: HashMap<UserId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    vouches: Vec<Vouch>,
}

impl<'a> Staging<'a> {
    fn new(base: &'a Tables) -> Self {
        Self {
            base,
            accounts: HashMap::new(),
            transactions: HashMap::new(),
            vouches: Vec::new(),
        }
    }

    fn account_mut(&mut self, user: UserId) -> StoreResult<&mut Account> {
        match self.accounts.entry(user) {
            Entry::Occupied(row) => Ok(row.into_mut()),
            Entry::Vacant(slot) => {
                let row = self.base.accounts.get(&user).cloned().ok_or_else(|| {
                    StoreError::MissingRow {
                        reason: format!("account {user}"),
                    }
                })?;
                Ok(slot.insert(row))
            }
        }
    }

    fn transaction_mut(&mut self, id: TransactionId) -> StoreResult<&mut Transaction> {
        match self.transactions.entry(id) {
            Entry::Occupied(row) => Ok(row.into_mut()),
            Entry::Vacant(slot) => {
                let row = self.base.transactions.get(&id).cloned().ok_or_else(|| {
                    StoreError::MissingRow {
                        reason: format!("transaction {id}"),
                    }
                })?;
                Ok(slot.insert(row))
            }
        }
    }

    fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions
            .get(&id)
            .or_else(|| self.base.transactions.get(&id))
    }

    fn vouch_count(&self, id: TransactionId) -> usize {
        let committed = self
            .base
            .vouches
            .iter()
            .filter(|v| v.transaction_id == id)
            .count();
        committed + self.vouches.iter().filter(|v| v.transaction_id == id).count()
    }

    fn apply(&mut self, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::OpenAccount(account) => {
                let user = account.user_id;
                if self.accounts.contains_key(&user) || self.base.accounts.contains_key(&user) {
                    return Err(StoreError::Duplicate {
                        reason: format!("account {user} already exists"),
                    });
                }
                self.accounts.insert(user, account);
            }
            WriteOp::Credit { user, amount } => {
                check_amount("credit", amount)?;
                let row = self.account_mut(user)?;
                row.balance.total = checked(row.balance.total.checked_add(amount), "credit", user)?;
                row.revision += 1;
            }
            WriteOp::Debit { user, amount } => {
                check_amount("debit", amount)?;
                let row = self.account_mut(user)?;
                row.balance.total = checked(row.balance.total.checked_sub(amount), "debit", user)?;
                row.revision += 1;
            }
            WriteOp::Reserve {
                user,
                amount,
                expected_revision,
            } => {
                check_amount("reserve", amount)?;
                let row = self.account_mut(user)?;
                if row.revision != expected_revision {
                    return Err(StoreError::Conflict {
                        reason: format!(
                            "account {user} at revision {}, expected {expected_revision}",
                            row.revision
                        ),
                    });
                }
                row.balance.reserved =
                    checked(row.balance.reserved.checked_add(amount), "reserve", user)?;
                row.revision += 1;
            }
            WriteOp::Release { user, amount } => {
                check_amount("release", amount)?;
                let row = self.account_mut(user)?;
                row.balance.reserved =
                    checked(row.balance.reserved.checked_sub(amount), "release", user)?;
                row.revision += 1;
            }
            WriteOp::InsertTransaction(tx) => {
                if self.transaction(tx.id).is_some() {
                    return Err(StoreError::Duplicate {
                        reason: format!("transaction {} already exists", tx.id),
                    });
                }
                self.transactions.insert(tx.id, tx);
            }
            WriteOp::RequireStatus { id, status } => {
                let row = self.transaction(id).ok_or_else(|| StoreError::MissingRow {
                    reason: format!("transaction {id}"),
                })?;
                if row.status != status {
                    return Err(StoreError::Conflict {
                        reason: format!("transaction {id} is {}, expected {status}", row.status),
                    });
                }
            }
            WriteOp::RequireVouchCount { id, count } => {
                let current = self.vouch_count(id);
                if u32::try_from(current).ok() != Some(count) {
                    return Err(StoreError::Conflict {
                        reason: format!("transaction {id} has {current} vouches, expected {count}"),
                    });
                }
            }
            WriteOp::TransitionStatus {
                id,
                from,
                to,
                revocation,
            } => {
                if !from.can_transition_to(to) {
                    return Err(StoreError::InvalidWrite {
                        reason: format!("illegal transition {from} -> {to} for {id}"),
                    });
                }
                let row = self.transaction_mut(id)?;
                if row.status != from {
                    return Err(StoreError::Conflict {
                        reason: format!("transaction {id} is {}, expected {from}", row.status),
                    });
                }
                row.status = to;
                if revocation.is_some() {
                    row.revocation = revocation;
                }
            }
            WriteOp::InsertVouch(vouch) => {
                if self.transaction(vouch.transaction_id).is_none() {
                    return Err(StoreError::MissingRow {
                        reason: format!("transaction {}", vouch.transaction_id),
                    });
                }
                let key = vouch.key();
                let staged = self.vouches.iter().any(|v| v.key() == key);
                if staged || self.base.vouch_keys.contains(&key) {
                    return Err(StoreError::Duplicate {
                        reason: format!(
                            "vouch by {} for {} already exists",
                            vouch.voucher, vouch.transaction_id
                        ),
                    });
                }
                self.vouches.push(vouch);
            }
        }
        Ok(())
    }
}

fn check_amount(op: &str, amount: Points) -> StoreResult<()> {
    if amount < 0 {
        return Err(StoreError::InvalidWrite {
            reason: format!("{op} of negative amount {amount}"),
        });
    }
    Ok(())
}

fn checked(value: Option<Points>, op: &str, user: UserId) -> StoreResult<Points> {
    value.ok_or_else(|| StoreError::Overflow {
        reason: format!("{op} on account {user}"),
    })
}

/// Thread-safe in-memory [`LedgerStore`] with all-or-nothing batches.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl LedgerStore for MemoryStore {
    fn account(&self, user: UserId) -> StoreResult<Option<Account>> {
        Ok(self.tables.read().accounts.get(&user).cloned())
    }

    fn accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(self.tables.read().accounts.values().cloned().collect())
    }

    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        Ok(self.tables.read().transactions.get(&id).cloned())
    }

    fn transactions(&self) -> StoreResult<Vec<Transaction>> {
        Ok(self.tables.read().transactions.values().cloned().collect())
    }

    fn transactions_involving(&self, user: UserId, page: Page) -> StoreResult<Vec<Transaction>> {
        let tables = self.tables.read();
        let mut rows: Vec<&Transaction> = tables
            .transactions
            .values()
            .filter(|tx| tx.involves(user))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    fn vouches(&self, id: TransactionId) -> StoreResult<Vec<Vouch>> {
        Ok(self
            .tables
            .read()
            .vouches
            .iter()
            .filter(|v| v.transaction_id == id)
            .cloned()
            .collect())
    }

    fn vouch_count(&self, id: TransactionId) -> StoreResult<u32> {
        let count = self
            .tables
            .read()
            .vouches
            .iter()
            .filter(|v| v.transaction_id == id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let ops = batch.describe();
        let mut tables = self.tables.write();

        let (accounts, transactions, vouches) = {
            let mut staging = Staging::new(&tables);
            for op in batch.into_ops() {
                staging.apply(op)?;
            }
            (staging.accounts, staging.transactions, staging.vouches)
        };

        tables.accounts.extend(accounts);
        tables.transactions.extend(transactions);
        for vouch in vouches {
            tables.vouch_keys.insert(vouch.key());
            tables.vouches.push(vouch);
        }

        tracing::trace!(ops = %ops, "batch committed");
        Ok(())
    }
}
