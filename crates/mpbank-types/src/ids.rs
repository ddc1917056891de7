//! Globally unique identifiers used throughout the MP bank.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting, so a
//! later transaction always sorts after an earlier one created by the same
//! process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MpbankError;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Unique identifier for a community member / account holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = MpbankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| MpbankError::InvalidIdentifier {
                kind: "user",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Globally unique transaction identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = MpbankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let raw = raw.strip_prefix("tx:").unwrap_or(raw);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| MpbankError::InvalidIdentifier {
                kind: "transaction",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// VouchId
// ---------------------------------------------------------------------------

/// Unique identifier for a single vouch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct VouchId(pub Uuid);

impl VouchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for VouchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VouchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vouch:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
