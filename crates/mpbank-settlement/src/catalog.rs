//! Standard-transaction catalog, frozen at startup.

use std::collections::BTreeMap;

use mpbank_types::{BankConfig, MpbankError, Result, StandardTransaction, constants};

/// Immutable `key → (name, delta)` lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardCatalog {
    entries: BTreeMap<String, StandardTransaction>,
}

impl StandardCatalog {
    #[must_use]
    pub fn new(entries: BTreeMap<String, StandardTransaction>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn from_config(config: &BankConfig) -> Self {
        Self::new(config.standard_transactions.clone())
    }

    /// Look up an entry by bare key.
    ///
    /// # Errors
    /// Returns `UnknownStandardTransaction` for a missing key; there is no
    /// default entry.
    pub fn resolve(&self, key: &str) -> Result<&StandardTransaction> {
        self.entries
            .get(key)
            .ok_or_else(|| MpbankError::UnknownStandardTransaction(key.to_string()))
    }

    /// The reason string stored on the ledger for `key`.
    #[must_use]
    pub fn reason_for(key: &str) -> String {
        format!("{}{key}", constants::CATALOG_REASON_PREFIX)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StandardTransaction)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StandardCatalog {
        StandardCatalog::from_config(
            &BankConfig::default()
                .with_standard_transaction("cleanup", "Park cleanup", 25)
                .with_standard_transaction("late", "Late to meeting", -5),
        )
    }

    #[test]
    fn resolves_known_keys() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("cleanup").unwrap().delta(), 25);
        assert_eq!(catalog.resolve("late").unwrap().name(), "Late to meeting");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn missing_key_is_a_validation_error() {
        let err = catalog().resolve("bogus").unwrap_err();
        assert!(matches!(err, MpbankError::UnknownStandardTransaction(ref k) if k == "bogus"));
        assert_eq!(err.class(), mpbank_types::ErrorClass::Validation);
    }

    #[test]
    fn stored_reason_keeps_prefix() {
        assert_eq!(StandardCatalog::reason_for("cleanup"), "id:cleanup");
    }

    #[test]
    fn iterates_in_key_order() {
        let cat = catalog();
        let keys: Vec<&str> = cat.iter().map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(keys, vec!["cleanup", "late"]);
    }
}
