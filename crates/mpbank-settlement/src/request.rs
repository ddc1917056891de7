//! Create requests and the caller identity they run under.
//!
//! A request names either a catalog entry (`id:<key>`, delta taken from the
//! catalog) or a free-text reason with an explicit delta. Parsing is pure:
//! nothing here reads the store.

use std::str::FromStr;

use mpbank_types::{MpbankError, Points, Result, RoleMask, UserId, constants};
use serde::{Deserialize, Serialize};

use crate::catalog::StandardCatalog;

/// Who is asking, and what their role mask allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user: UserId,
    pub roles: RoleMask,
}

impl Caller {
    #[must_use]
    pub fn new(user: UserId, roles: RoleMask) -> Self {
        Self { user, roles }
    }
}

/// Mint creates points; transfer moves them between two accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Mint,
    Transfer,
}

impl FromStr for Mode {
    type Err = MpbankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "mint" => Ok(Self::Mint),
            "transfer" => Ok(Self::Transfer),
            other => Err(MpbankError::InvalidMode(other.to_string())),
        }
    }
}

/// Where the reason and delta come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ReasonSpec {
    /// A catalog key without the `id:` prefix.
    Standard { key: String },
    /// Free text with an explicit signed delta.
    Custom { reason: String, delta: Points },
}

/// A validated create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub mode: Mode,
    pub reason: ReasonSpec,
}

impl CreateRequest {
    #[must_use]
    pub fn mint(reason: impl Into<String>, delta: Points) -> Self {
        Self {
            mode: Mode::Mint,
            reason: ReasonSpec::Custom {
                reason: reason.into(),
                delta,
            },
        }
    }

    #[must_use]
    pub fn transfer(reason: impl Into<String>, delta: Points) -> Self {
        Self {
            mode: Mode::Transfer,
            reason: ReasonSpec::Custom {
                reason: reason.into(),
                delta,
            },
        }
    }

    #[must_use]
    pub fn standard(mode: Mode, key: impl Into<String>) -> Self {
        Self {
            mode,
            reason: ReasonSpec::Standard { key: key.into() },
        }
    }

    /// Parse raw form fields.
    ///
    /// - `mode`: `mint` (default when absent) or `transfer`
    /// - `reason`: required; `id:<key>` selects a catalog entry and ignores `delta`
    /// - `delta`: required for custom reasons, a non-negative integer
    /// - `negative`: flips the sign of a custom delta
    ///
    /// # Errors
    /// `InvalidMode`, `MissingField`, or `InvalidDelta`.
    pub fn parse(
        mode: Option<&str>,
        reason: Option<&str>,
        delta: Option<&str>,
        negative: bool,
    ) -> Result<Self> {
        let mode = match mode.map(str::trim).filter(|m| !m.is_empty()) {
            Some(raw) => raw.parse()?,
            None => Mode::default(),
        };

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(MpbankError::MissingField { field: "reason" })?;

        if let Some(key) = reason.strip_prefix(constants::CATALOG_REASON_PREFIX) {
            if key.is_empty() {
                return Err(MpbankError::UnknownStandardTransaction(String::new()));
            }
            return Ok(Self::standard(mode, key));
        }

        let raw = delta
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(MpbankError::MissingField { field: "delta" })?;
        let magnitude: Points = raw.parse().map_err(|_| MpbankError::InvalidDelta {
            reason: format!("{raw:?} is not an integer"),
        })?;
        if magnitude < 0 {
            return Err(MpbankError::InvalidDelta {
                reason: "use the negative flag instead of a signed delta".to_string(),
            });
        }
        let delta = if negative { -magnitude } else { magnitude };

        Ok(Self {
            mode,
            reason: ReasonSpec::Custom {
                reason: reason.to_string(),
                delta,
            },
        })
    }

    /// The ledger reason and signed delta this request resolves to.
    ///
    /// # Errors
    /// `UnknownStandardTransaction` for a missing catalog key, `MissingField`
    /// for a blank custom reason, `InvalidDelta` for a zero delta.
    pub fn resolve(&self, catalog: &StandardCatalog) -> Result<(String, Points)> {
        let (reason, delta) = match &self.reason {
            ReasonSpec::Standard { key } => {
                let entry = catalog.resolve(key)?;
                (StandardCatalog::reason_for(key), entry.delta())
            }
            ReasonSpec::Custom { reason, delta } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(MpbankError::MissingField { field: "reason" });
                }
                (reason.to_string(), *delta)
            }
        };

        if delta == 0 {
            return Err(MpbankError::InvalidDelta {
                reason: "delta must be non-zero".to_string(),
            });
        }
        Ok((reason, delta))
    }
}

#[cfg(test)]
mod tests {
    use mpbank_types::BankConfig;

    use super::*;

    fn catalog() -> StandardCatalog {
        StandardCatalog::from_config(
            &BankConfig::default().with_standard_transaction("cleanup", "Park cleanup", 25),
        )
    }

    #[test]
    fn mode_defaults_to_mint() {
        let req = CreateRequest::parse(None, Some("helped"), Some("10"), false).unwrap();
        assert_eq!(req.mode, Mode::Mint);
        let req = CreateRequest::parse(Some(""), Some("helped"), Some("10"), false).unwrap();
        assert_eq!(req.mode, Mode::Mint);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = CreateRequest::parse(Some("gift"), Some("x"), Some("1"), false).unwrap_err();
        assert!(matches!(err, MpbankError::InvalidMode(ref m) if m == "gift"));
    }

    #[test]
    fn negative_flag_flips_sign() {
        let req = CreateRequest::parse(Some("transfer"), Some("lunch"), Some("30"), true).unwrap();
        assert_eq!(req, CreateRequest::transfer("lunch", -30));
    }

    #[test]
    fn catalog_reason_ignores_delta_field() {
        let req = CreateRequest::parse(None, Some("id:cleanup"), Some("garbage"), true).unwrap();
        assert_eq!(req, CreateRequest::standard(Mode::Mint, "cleanup"));
        let (reason, delta) = req.resolve(&catalog()).unwrap();
        assert_eq!(reason, "id:cleanup");
        assert_eq!(delta, 25);
    }

    #[test]
    fn unknown_catalog_key_fails_on_resolve() {
        let req = CreateRequest::parse(None, Some("id:nope"), None, false).unwrap();
        assert!(matches!(
            req.resolve(&catalog()),
            Err(MpbankError::UnknownStandardTransaction(_))
        ));
    }

    #[test]
    fn missing_fields() {
        assert!(matches!(
            CreateRequest::parse(None, None, Some("1"), false),
            Err(MpbankError::MissingField { field: "reason" })
        ));
        assert!(matches!(
            CreateRequest::parse(None, Some("  "), Some("1"), false),
            Err(MpbankError::MissingField { field: "reason" })
        ));
        assert!(matches!(
            CreateRequest::parse(None, Some("x"), None, false),
            Err(MpbankError::MissingField { field: "delta" })
        ));
    }

    #[test]
    fn malformed_delta() {
        assert!(matches!(
            CreateRequest::parse(None, Some("x"), Some("ten"), false),
            Err(MpbankError::InvalidDelta { .. })
        ));
        assert!(matches!(
            CreateRequest::parse(None, Some("x"), Some("-4"), false),
            Err(MpbankError::InvalidDelta { .. })
        ));
    }

    #[test]
    fn zero_delta_fails_on_resolve() {
        let req = CreateRequest::parse(None, Some("x"), Some("0"), false).unwrap();
        assert!(matches!(req.resolve(&catalog()), Err(MpbankError::InvalidDelta { .. })));
    }

    #[test]
    fn custom_reason_is_trimmed() {
        let req = CreateRequest::mint("  fixed the fence ", 5);
        let (reason, _) = req.resolve(&catalog()).unwrap();
        assert_eq!(reason, "fixed the fence");
    }
}
