//! Read-side shapes returned by the engine.

use mpbank_types::{Transaction, UserId};
use serde::{Deserialize, Serialize};

/// Which way points flowed relative to the user the listing was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// Outgoing when `viewer` sent the transfer; incoming otherwise.
    #[must_use]
    pub fn of(tx: &Transaction, viewer: UserId) -> Self {
        if tx.sender() == Some(viewer) {
            Self::Outgoing
        } else {
            Self::Incoming
        }
    }
}

/// A ledger row enriched for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub vouch_count: u32,
    pub creator_name: String,
    pub recipient_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub direction: Direction,
}

/// Result of a successful vouch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VouchOutcome {
    pub vouch_count: u32,
    pub required: u32,
    /// This vouch is the one that moved the transaction to active.
    pub activated: bool,
}
