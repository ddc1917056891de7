//! Balance tracking types for the MP reservation model.
//!
//! Every account has a `total` (cumulative credits minus debits) and a
//! `reserved` amount earmarked against pending outgoing transfers. Funds
//! that may be committed to a new transfer are `total - reserved`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Amount of MPs. Signed: a `total` may legally go negative after revocations.
pub type Points = i64;

/// The balance record of a single account.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountBalance {
    /// Cumulative credits minus debits and reversals.
    pub total: Points,
    /// Earmarked against pending outgoing transfers.
    pub reserved: Points,
}

impl AccountBalance {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Funds not yet earmarked (`total - reserved`).
    #[must_use]
    pub fn available(&self) -> Points {
        self.total.saturating_sub(self.reserved)
    }

    /// Whether a reservation of `amount` may be approved right now.
    #[must_use]
    pub fn can_reserve(&self, amount: Points) -> bool {
        amount >= 0 && self.available() >= amount
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.total == 0 && self.reserved == 0
    }
}

/// An account row: identity, display name, balance, and an optimistic
/// revision counter bumped by every balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    pub display_name: String,
    pub balance: AccountBalance,
    /// Incremented on every balance mutation; compare-and-swap target.
    pub revision: u64,
    pub opened_at: DateTime<Utc>,
}

impl Account {
    /// A freshly opened account with a zero balance.
    #[must_use]
    pub fn open(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            balance: AccountBalance::new(),
            revision: 0,
            opened_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_default_is_zero() {
        let entry = AccountBalance::default();
        assert_eq!(entry.total, 0);
        assert_eq!(entry.reserved, 0);
        assert!(entry.is_zero());
    }

    #[test]
    fn available_subtracts_reserved() {
        let entry = AccountBalance {
            total: 50,
            reserved: 30,
        };
        assert_eq!(entry.available(), 20);
        assert!(entry.can_reserve(20));
        assert!(!entry.can_reserve(21));
    }

    #[test]
    fn negative_total_has_negative_available() {
        let entry = AccountBalance {
            total: -5,
            reserved: 0,
        };
        assert_eq!(entry.available(), -5);
        assert!(!entry.can_reserve(1));
    }

    #[test]
    fn open_account_starts_empty() {
        let account = Account::open(UserId::new(), "Ada Lovelace");
        assert!(account.balance.is_zero());
        assert_eq!(account.revision, 0);
    }
}
