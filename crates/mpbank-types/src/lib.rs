//! # mpbank-types
//!
//! Shared types, errors, and configuration for the **MP bank** settlement
//! engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`TransactionId`], [`VouchId`]
//! - **Roles**: [`Capability`], [`RoleMask`]
//! - **Balance model**: [`AccountBalance`], [`Account`], [`Points`]
//! - **Transaction model**: [`Transaction`], [`TransactionKind`], [`TransactionStatus`], [`Revocation`]
//! - **Vouch model**: [`Vouch`]
//! - **Configuration**: [`BankConfig`], [`VouchThreshold`], [`StandardTransaction`]
//! - **Errors**: [`MpbankError`] with `MP_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod roles;
pub mod transaction;
pub mod vouch;

pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use roles::*;
pub use transaction::*;
pub use vouch::*;

// Constants are accessed via `mpbank_types::constants::FOO`
// (not re-exported to avoid name collisions).
