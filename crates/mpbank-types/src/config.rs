//! Bank configuration: the metadata document loaded once at startup.
//!
//! The JSON shape matches the bank metadata file:
//!
//! ```json
//! {
//!   "roles": { "0": "access_platform", "1": "transfer_mt" },
//!   "standardTransactions": { "cleanup": ["Park cleanup", 25] },
//!   "vouchThresholds": [{ "minAbsDelta": 100, "requiredVouches": 2 }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CAPABILITY_BITS, MpbankError, Points, Result, constants};

/// One row of the vouch threshold table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VouchThreshold {
    /// Mints whose magnitude is at least this need `required_vouches`.
    pub min_abs_delta: Points,
    pub required_vouches: u32,
}

/// A catalog entry: display name and signed delta.
///
/// Serialized as a two-element array `["name", delta]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardTransaction(pub String, pub Points);

impl StandardTransaction {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn delta(&self) -> Points {
        self.1
    }
}

/// Bank-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankConfig {
    /// Bit position → role name. Informational; checked against the
    /// built-in capability table by [`BankConfig::validate`].
    #[serde(default)]
    pub roles: BTreeMap<u32, String>,
    /// Catalog of standard transactions keyed by id.
    #[serde(default)]
    pub standard_transactions: BTreeMap<String, StandardTransaction>,
    /// Vouch requirements for mints. Order does not matter.
    #[serde(default)]
    pub vouch_thresholds: Vec<VouchThreshold>,
    /// Gate mint creation behind the `create_mt` role.
    #[serde(default)]
    pub mint_requires_create_role: bool,
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,
    #[serde(default = "max_page_limit")]
    pub max_page_limit: usize,
}

fn default_page_limit() -> usize {
    constants::DEFAULT_PAGE_LIMIT
}

fn max_page_limit() -> usize {
    constants::MAX_PAGE_LIMIT
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            roles: BTreeMap::new(),
            standard_transactions: BTreeMap::new(),
            vouch_thresholds: Vec::new(),
            mint_requires_create_role: false,
            default_page_limit: constants::DEFAULT_PAGE_LIMIT,
            max_page_limit: constants::MAX_PAGE_LIMIT,
        }
    }
}

impl BankConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MpbankError::Configuration(format!("invalid bank config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Builder-style helper for tests and embedders.
    #[must_use]
    pub fn with_threshold(mut self, min_abs_delta: Points, required_vouches: u32) -> Self {
        self.vouch_thresholds.push(VouchThreshold {
            min_abs_delta,
            required_vouches,
        });
        self
    }

    /// Builder-style helper adding a catalog entry.
    #[must_use]
    pub fn with_standard_transaction(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        delta: Points,
    ) -> Self {
        self.standard_transactions
            .insert(key.into(), StandardTransaction(name.into(), delta));
        self
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns [`MpbankError::Configuration`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        for threshold in &self.vouch_thresholds {
            if threshold.min_abs_delta < 0 {
                return Err(MpbankError::Configuration(format!(
                    "vouch threshold minAbsDelta must be non-negative, got {}",
                    threshold.min_abs_delta
                )));
            }
        }

        for (key, entry) in &self.standard_transactions {
            if key.trim().is_empty() {
                return Err(MpbankError::Configuration(
                    "standard transaction with empty id".to_string(),
                ));
            }
            if entry.delta() == 0 {
                return Err(MpbankError::Configuration(format!(
                    "standard transaction `{key}` has a zero delta"
                )));
            }
        }

        if self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit {
            return Err(MpbankError::Configuration(format!(
                "page limits out of order: default {} / max {}",
                self.default_page_limit, self.max_page_limit
            )));
        }

        for (bit, name) in &self.roles {
            let mismatch = CAPABILITY_BITS
                .iter()
                .find(|(cap, expected)| cap.name() == name && expected != bit);
            if let Some((cap, expected)) = mismatch {
                return Err(MpbankError::Configuration(format!(
                    "role `{cap}` configured at bit {bit}, built-in table uses bit {expected}"
                )));
            }
        }

        Ok(())
    }
}
