//! Vouch records: one member's endorsement of a pending mint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TransactionId, UserId, VouchId};

/// An append-only endorsement. At most one exists per
/// `(transaction_id, voucher)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vouch {
    pub id: VouchId,
    pub transaction_id: TransactionId,
    pub voucher: UserId,
    pub vouched_at: DateTime<Utc>,
}

impl Vouch {
    #[must_use]
    pub fn new(transaction_id: TransactionId, voucher: UserId) -> Self {
        Self {
            id: VouchId::new(),
            transaction_id,
            voucher,
            vouched_at: Utc::now(),
        }
    }

    /// The uniqueness key enforced by the vouch registry.
    #[must_use]
    pub fn key(&self) -> (TransactionId, UserId) {
        (self.transaction_id, self.voucher)
    }
}
