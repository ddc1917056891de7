//! Vouch Registry: append-only `(transaction, voucher)` endorsements.
//!
//! The uniqueness constraint lives in the store, so a repeated vouch fails
//! atomically no matter how many requests race.

use mpbank_types::{TransactionId, TransactionStatus, Vouch};

use crate::{LedgerStore, StoreResult, WriteBatch, WriteOp};

/// Records and counts vouches.
pub struct VouchRegistry<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> VouchRegistry<'a, S> {
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Insert a vouch, guarded on its transaction still being pending and
    /// still holding `seen` vouches. `then` commits in the same batch, so
    /// an activation lands with the vouch that earned it or not at all.
    ///
    /// # Errors
    /// - `Duplicate` if this voucher already vouched for the transaction
    /// - `Conflict` if the transaction left the pending state or another
    ///   vouch landed since `seen` was read
    pub fn record(
        &self,
        vouch: Vouch,
        seen: u32,
        then: impl IntoIterator<Item = WriteOp>,
    ) -> StoreResult<()> {
        let id = vouch.transaction_id;
        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::RequireStatus {
                id,
                status: TransactionStatus::Pending,
            })
            .push(WriteOp::RequireVouchCount { id, count: seen })
            .push(WriteOp::InsertVouch(vouch))
            .extend(then);
        self.store.commit(batch)
    }

    /// Current number of vouches. Never decreases.
    pub fn count(&self, transaction_id: TransactionId) -> StoreResult<u32> {
        self.store.vouch_count(transaction_id)
    }

    /// Vouches in the order they were recorded.
    pub fn list(&self, transaction_id: TransactionId) -> StoreResult<Vec<Vouch>> {
        self.store.vouches(transaction_id)
    }
}

/// Whether `count` vouches satisfy a requirement of `required`.
#[must_use]
pub fn has_quorum(count: u32, required: u32) -> bool {
    count >= required
}
