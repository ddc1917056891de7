//! # mpbank-store
//!
//! **Persistence seam** between the settlement engine and whatever relational
//! store backs the bank.
//!
//! ## Architecture
//!
//! - **LedgerStore**: the trait a backend implements: point reads plus
//!   [`LedgerStore::commit`] of a [`WriteBatch`]
//! - **WriteBatch**: ordered [`WriteOp`]s, including guard ops (expected
//!   revision, expected status) that make read-then-write sequences
//!   serializable without holding a lock across calls
//! - **MemoryStore**: in-process backend that applies each batch
//!   all-or-nothing under one write lock
//! - **BalanceStore** / **VouchRegistry** / **TransactionLedger**: typed
//!   facades used by the engine
//!
//! ```text
//! engine → BalanceStore.reserve(rev) ─┐
//!        → TransactionLedger.get()    ├─▶ LedgerStore.commit(WriteBatch)
//!        → VouchRegistry.record()  ───┘
//! ```

pub mod balance_store;
pub mod batch;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod traits;
pub mod vouch_registry;

pub use balance_store::BalanceStore;
pub use batch::{WriteBatch, WriteOp};
pub use error::{StoreError, StoreResult};
pub use ledger::TransactionLedger;
pub use memory::MemoryStore;
pub use traits::{LedgerStore, Page};
pub use vouch_registry::{VouchRegistry, has_quorum};
