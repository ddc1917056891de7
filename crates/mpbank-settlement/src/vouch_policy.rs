//! Vouch policy: how many distinct vouches a mint needs.
//!
//! ```text
//! required(|delta|) = max { t.required_vouches : |delta| >= t.min_abs_delta }, or 0
//! ```
//!
//! Taking the max over every matching row makes the table order irrelevant
//! and the result monotonic in `|delta|`.

use mpbank_types::{BankConfig, Points, VouchThreshold};

/// Immutable threshold table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VouchPolicy {
    thresholds: Vec<VouchThreshold>,
}

impl VouchPolicy {
    #[must_use]
    pub fn new(thresholds: impl Into<Vec<VouchThreshold>>) -> Self {
        Self {
            thresholds: thresholds.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &BankConfig) -> Self {
        Self::new(config.vouch_thresholds.clone())
    }

    /// Vouches required for a mint of `delta` (sign ignored).
    #[must_use]
    pub fn required_vouches(&self, delta: Points) -> u32 {
        let magnitude = delta.checked_abs().unwrap_or(Points::MAX);
        self.thresholds
            .iter()
            .filter(|t| magnitude >= t.min_abs_delta)
            .map(|t| t.required_vouches)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn thresholds(&self) -> &[VouchThreshold] {
        &self.thresholds
    }
}
