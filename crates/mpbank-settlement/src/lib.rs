//! # mpbank-settlement
//!
//! **Settlement engine** for the MP community currency: the only component
//! allowed to move balances on behalf of a transaction.
//!
//! ## Architecture
//!
//! 1. **VouchPolicy**: maps a mint's magnitude to the vouches it needs
//! 2. **StandardCatalog**: immutable `id:<key>` → (name, delta) table
//! 3. **CreateRequest**: parses and validates what the caller asked for
//! 4. **effects**: the exact balance ops for applying or reversing a row
//! 5. **SettlementEngine**: create / vouch / revoke / list
//! 6. **LedgerAudit**: recomputes balances from the ledger and compares
//!
//! ## Lifecycle
//!
//! ```text
//! create ─┬─ transfer: reserve(rev) → [insert ACTIVE + debit/release/credit]
//!         │                └─ insert fails → release (once)
//!         └─ mint: required = policy(|delta|)
//!                ├─ 0  → [insert ACTIVE + credit]
//!                └─ >0 → [insert PENDING] ── vouch × N ──▶ [PENDING→ACTIVE + credit]
//! revoke: [require status + reversal ops + status→REVOKED]
//! ```
//!
//! Every bracketed group is one atomic [`mpbank_store::WriteBatch`].

pub mod audit;
pub mod catalog;
pub mod effects;
pub mod engine;
pub mod request;
pub mod telemetry;
pub mod view;
pub mod vouch_policy;

pub use audit::{AuditReport, LedgerAudit};
pub use catalog::StandardCatalog;
pub use engine::SettlementEngine;
pub use request::{Caller, CreateRequest, Mode, ReasonSpec};
pub use view::{Direction, TransactionView, VouchOutcome};
pub use vouch_policy::VouchPolicy;
