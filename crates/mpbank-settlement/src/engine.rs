//! The settlement engine.
//!
//! Holds no mutable state of its own. Every state change is one atomic
//! [`WriteBatch`] whose guard ops (revision pin on reserve, status CAS on
//! activate/revoke, pending guard on vouch) make racing requests serialize:
//! the loser sees a conflict and nothing it wrote survives.
//!
//! Transfer creation is the one flow that spans two batches (reserve, then
//! insert + apply). If the second batch fails without writing anything, the
//! reservation is released exactly once; if that release fails too, the
//! error is fatal and names the leaked amount.

use std::collections::HashMap;

use chrono::Utc;
use mpbank_store::{
    BalanceStore, LedgerStore, Page, StoreError, TransactionLedger, VouchRegistry, WriteBatch,
    WriteOp, has_quorum,
};
use mpbank_types::{
    Account, AccountBalance, BankConfig, Capability, MpbankError, Points, Result, Revocation,
    Transaction, TransactionId, TransactionKind, TransactionStatus, UserId, Vouch, constants,
};

use crate::audit::{AuditReport, LedgerAudit};
use crate::catalog::StandardCatalog;
use crate::effects;
use crate::request::{Caller, CreateRequest, Mode};
use crate::view::{Direction, TransactionView, VouchOutcome};
use crate::vouch_policy::VouchPolicy;

/// Creates, vouches, revokes, and lists MP transactions.
pub struct SettlementEngine<S> {
    store: S,
    config: BankConfig,
    policy: VouchPolicy,
    catalog: StandardCatalog,
}

impl<S: LedgerStore> SettlementEngine<S> {
    /// Build an engine over `store`.
    ///
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(store: S, config: BankConfig) -> Result<Self> {
        config.validate()?;
        let policy = VouchPolicy::from_config(&config);
        let catalog = StandardCatalog::from_config(&config);
        tracing::info!(
            thresholds = policy.thresholds().len(),
            standard_transactions = catalog.len(),
            mint_requires_create_role = config.mint_requires_create_role,
            "Settlement engine ready"
        );
        Ok(Self {
            store,
            config,
            policy,
            catalog,
        })
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    #[must_use]
    pub fn policy(&self) -> &VouchPolicy {
        &self.policy
    }

    #[must_use]
    pub fn catalog(&self) -> &StandardCatalog {
        &self.catalog
    }

    fn balances(&self) -> BalanceStore<'_, S> {
        BalanceStore::new(&self.store)
    }

    fn ledger(&self) -> TransactionLedger<'_, S> {
        TransactionLedger::new(&self.store)
    }

    fn registry(&self) -> VouchRegistry<'_, S> {
        VouchRegistry::new(&self.store)
    }

    // ── Accounts ────────────────────────────────────────────────────

    /// Open a zero-balance account.
    ///
    /// # Errors
    /// `AccountExists` if `user` already has one.
    pub fn open_account(&self, user: UserId, display_name: impl Into<String>) -> Result<Account> {
        let account = Account::open(user, display_name);
        match self.balances().open(account.clone()) {
            Ok(()) => {}
            Err(StoreError::Duplicate { .. }) => return Err(MpbankError::AccountExists(user)),
            Err(err) => return Err(err.into()),
        }
        tracing::info!(user = %user, name = %account.display_name, "Account opened");
        Ok(account)
    }

    /// Current `(total, reserved)` for `user`.
    ///
    /// # Errors
    /// `UserNotFound` if no account exists.
    pub fn balance(&self, user: UserId) -> Result<AccountBalance> {
        Ok(self.require_account(user)?.balance)
    }

    /// Accounts ordered by total, highest first.
    ///
    /// # Errors
    /// `InvalidPage` for a zero limit or one above the configured maximum.
    pub fn top_accounts(&self, limit: usize) -> Result<Vec<Account>> {
        self.check_limit(limit)?;
        let mut accounts = self.store.accounts()?;
        accounts.sort_by(|a, b| {
            b.balance
                .total
                .cmp(&a.balance.total)
                .then(a.user_id.cmp(&b.user_id))
        });
        accounts.truncate(limit);
        Ok(accounts)
    }

    fn require_account(&self, user: UserId) -> Result<Account> {
        self.balances()
            .account(user)?
            .ok_or(MpbankError::UserNotFound(user))
    }

    // ── Create ──────────────────────────────────────────────────────

    /// Create a mint or transfer for `recipient`.
    ///
    /// Mints that meet a vouch threshold start pending; everything else
    /// is applied immediately.
    ///
    /// # Errors
    /// Validation, permission, `UserNotFound`, `InsufficientBalance`,
    /// `ConcurrentModification` when the sender's balance moved between the
    /// availability check and the reservation, or a fatal error when the
    /// store left a partial write behind.
    pub fn create(
        &self,
        caller: &Caller,
        recipient: UserId,
        request: &CreateRequest,
    ) -> Result<Transaction> {
        let (reason, delta) = request.resolve(&self.catalog)?;
        match request.mode {
            Mode::Mint => self.create_mint(caller, recipient, reason, delta),
            Mode::Transfer => self.create_transfer(caller, recipient, reason, delta),
        }
    }

    fn create_mint(
        &self,
        caller: &Caller,
        recipient: UserId,
        reason: String,
        delta: Points,
    ) -> Result<Transaction> {
        if self.config.mint_requires_create_role && !caller.roles.has(Capability::Create) {
            return Err(MpbankError::PermissionDenied {
                capability: Capability::Create,
                action: "mint MPs",
            });
        }
        // A negative mint is a penalty. Its magnitude must be representable.
        if delta.checked_neg().is_none() {
            return Err(MpbankError::InvalidDelta {
                reason: format!("mint delta {delta} is out of range"),
            });
        }
        self.require_account(recipient)?;

        let required_vouches = self.policy.required_vouches(delta);
        let status = if required_vouches == 0 {
            TransactionStatus::Active
        } else {
            TransactionStatus::Pending
        };
        let tx = Transaction {
            id: TransactionId::new(),
            recipient,
            delta,
            reason,
            kind: TransactionKind::Mint,
            created_by: caller.user,
            created_at: Utc::now(),
            status,
            required_vouches,
            revocation: None,
        };

        let mut batch = WriteBatch::single(WriteOp::InsertTransaction(tx.clone()));
        if status == TransactionStatus::Active {
            batch.extend(effects::settlement_ops(&tx));
        }
        self.store
            .commit(batch)
            .map_err(|err| settlement_error(tx.id, "create", err))?;

        tracing::info!(
            tx = %tx.id,
            kind = %tx.transaction_type(),
            recipient = %tx.recipient,
            delta = tx.delta,
            status = %tx.status,
            required_vouches,
            "Transaction created"
        );
        Ok(tx)
    }

    fn create_transfer(
        &self,
        caller: &Caller,
        recipient: UserId,
        reason: String,
        delta: Points,
    ) -> Result<Transaction> {
        if !caller.roles.has(Capability::Transfer) {
            return Err(MpbankError::PermissionDenied {
                capability: Capability::Transfer,
                action: "transfer MPs",
            });
        }

        // A negative delta asks the nominal recipient to pay the caller.
        let (sender, recipient, amount) = if delta < 0 {
            let amount = delta.checked_neg().ok_or_else(|| MpbankError::InvalidDelta {
                reason: format!("{delta} cannot be negated"),
            })?;
            (recipient, caller.user, amount)
        } else {
            (caller.user, recipient, delta)
        };
        if sender == recipient {
            return Err(MpbankError::SelfTransfer);
        }

        let sender_account = self.require_account(sender)?;
        self.require_account(recipient)?;

        let available = sender_account.balance.available();
        if !sender_account.balance.can_reserve(amount) {
            return Err(MpbankError::InsufficientBalance {
                needed: amount,
                available,
            });
        }

        // Pinned to the revision the availability check read.
        match self.balances().reserve(sender, amount, sender_account.revision) {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => {
                return Err(MpbankError::ConcurrentModification {
                    reason: format!("balance of {sender} changed during transfer; retry"),
                });
            }
            Err(err) => return Err(err.into()),
        }

        let tx = Transaction {
            id: TransactionId::new(),
            recipient,
            delta: amount,
            reason,
            kind: TransactionKind::Transfer { sender },
            created_by: caller.user,
            created_at: Utc::now(),
            status: TransactionStatus::Active,
            required_vouches: 0,
            revocation: None,
        };

        let mut batch = WriteBatch::single(WriteOp::InsertTransaction(tx.clone()));
        batch.extend(effects::settlement_ops(&tx));

        if let Err(err) = self.store.commit(batch) {
            if err.is_partial() {
                return Err(settlement_error(tx.id, "create", err));
            }
            return Err(self.compensate_reservation(sender, amount, err));
        }

        tracing::info!(
            tx = %tx.id,
            kind = %tx.transaction_type(),
            sender = %sender,
            recipient = %tx.recipient,
            delta = tx.delta,
            status = %tx.status,
            "Transaction created"
        );
        Ok(tx)
    }

    /// Undo a reservation whose transaction never landed.
    fn compensate_reservation(&self, user: UserId, amount: Points, cause: StoreError) -> MpbankError {
        tracing::warn!(
            user = %user,
            amount,
            cause = %cause,
            "Transfer insert failed; releasing reservation"
        );
        match self.balances().release(user, amount) {
            Ok(()) => cause.into(),
            Err(release_err) => {
                tracing::error!(
                    user = %user,
                    amount,
                    cause = %cause,
                    release_error = %release_err,
                    "Reservation leaked: compensating release failed"
                );
                MpbankError::CompensationFailed {
                    user,
                    amount,
                    detail: format!("insert failed ({cause}); release failed ({release_err})"),
                }
            }
        }
    }

    // ── Vouch ───────────────────────────────────────────────────────

    /// Endorse a pending transaction. The vouch that reaches quorum also
    /// activates it and applies its balance effect, in one batch.
    ///
    /// # Errors
    /// `PermissionDenied`, `TransactionNotFound`, `TransactionNotPending`,
    /// `SelfVouch`, `RecipientVouch`, `DuplicateVouch`, `StorageUnavailable`
    /// with nothing written, or a fatal error if the batch was partially
    /// written.
    pub fn vouch(&self, caller: &Caller, id: TransactionId) -> Result<VouchOutcome> {
        if !caller.roles.has(Capability::Vouch) {
            return Err(MpbankError::PermissionDenied {
                capability: Capability::Vouch,
                action: "vouch for transactions",
            });
        }
        let tx = self.transaction(id)?;
        if tx.status != TransactionStatus::Pending {
            return Err(MpbankError::TransactionNotPending {
                id,
                status: tx.status,
            });
        }
        if caller.user == tx.created_by {
            return Err(MpbankError::SelfVouch);
        }
        if caller.user == tx.recipient {
            return Err(MpbankError::RecipientVouch);
        }

        // Each retry means another vouch landed, and at most
        // `required_vouches` can land before the status leaves pending.
        for _ in 0..=tx.required_vouches {
            let seen = self.registry().count(id)?;
            let vouch_count = seen.saturating_add(1);
            let activating = has_quorum(vouch_count, tx.required_vouches);
            let activation = if activating {
                let mut ops = vec![WriteOp::activate(id)];
                ops.extend(effects::settlement_ops(&tx));
                ops
            } else {
                Vec::new()
            };

            match self
                .registry()
                .record(Vouch::new(id, caller.user), seen, activation)
            {
                Ok(()) => {}
                Err(StoreError::Duplicate { .. }) => {
                    return Err(MpbankError::DuplicateVouch {
                        transaction: id,
                        voucher: caller.user,
                    });
                }
                Err(StoreError::Conflict { .. }) => {
                    let status = self.transaction(id)?.status;
                    if status != TransactionStatus::Pending {
                        return Err(MpbankError::TransactionNotPending { id, status });
                    }
                    tracing::debug!(tx = %id, seen, "Vouch count moved, recounting");
                    continue;
                }
                Err(err) => {
                    let step = if activating { "activate" } else { "vouch" };
                    return Err(settlement_error(id, step, err));
                }
            }

            tracing::debug!(
                tx = %id,
                voucher = %caller.user,
                vouch_count,
                required = tx.required_vouches,
                "Vouch recorded"
            );
            if activating {
                tracing::info!(
                    tx = %id,
                    recipient = %tx.recipient,
                    delta = tx.delta,
                    vouch_count,
                    "Transaction activated"
                );
            }
            return Ok(VouchOutcome {
                vouch_count,
                required: tx.required_vouches,
                activated: activating,
            });
        }

        Err(MpbankError::ConcurrentModification {
            reason: format!("vouch count for {id} kept moving"),
        })
    }

    /// Vouches for a transaction in the order they were recorded.
    ///
    /// # Errors
    /// `TransactionNotFound` for an unknown id.
    pub fn vouches(&self, id: TransactionId) -> Result<Vec<Vouch>> {
        self.transaction(id)?;
        Ok(self.registry().list(id)?)
    }

    // ── Revoke ──────────────────────────────────────────────────────

    /// Revoke a pending or active transaction, exactly undoing its
    /// balance effect. A blank `reason` is stored as none.
    ///
    /// # Errors
    /// `PermissionDenied`, `TransactionNotFound`, `AlreadyRevoked`,
    /// `ConcurrentModification` if the row changed status mid-request, or a
    /// fatal error if the reversal was partially written.
    pub fn revoke(
        &self,
        caller: &Caller,
        id: TransactionId,
        reason: Option<&str>,
    ) -> Result<Transaction> {
        if !caller.roles.has(Capability::Revoke) {
            return Err(MpbankError::PermissionDenied {
                capability: Capability::Revoke,
                action: "revoke transactions",
            });
        }
        let mut tx = self.transaction(id)?;
        let reversal = effects::reversal_ops(&tx).ok_or(MpbankError::AlreadyRevoked(id))?;

        let revocation = Revocation {
            revoked_by: caller.user,
            revoked_at: Utc::now(),
            reason: reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        };
        let from = tx.status;

        let mut batch = WriteBatch::single(WriteOp::RequireStatus { id, status: from });
        batch
            .extend(reversal)
            .push(WriteOp::revoke(id, from, revocation.clone()));

        match self.store.commit(batch) {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => {
                let now = self.transaction(id)?.status;
                if now == TransactionStatus::Revoked {
                    return Err(MpbankError::AlreadyRevoked(id));
                }
                return Err(MpbankError::ConcurrentModification {
                    reason: format!("{id} moved from {from} to {now} during revoke; retry"),
                });
            }
            Err(err) => return Err(settlement_error(id, "revoke", err)),
        }

        tx.mark_revoked(revocation)?;
        tracing::info!(
            tx = %id,
            kind = %tx.transaction_type(),
            from = %from,
            revoked_by = %caller.user,
            delta = tx.delta,
            "Transaction revoked"
        );
        Ok(tx)
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Fetch one transaction.
    ///
    /// # Errors
    /// `TransactionNotFound` for an unknown id.
    pub fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.ledger()
            .get(id)?
            .ok_or(MpbankError::TransactionNotFound(id))
    }

    /// Transactions where `user` is recipient or sender, newest first,
    /// enriched with names, vouch counts, and direction.
    ///
    /// `limit` defaults to the configured page size.
    ///
    /// # Errors
    /// `UserNotFound`, or `InvalidPage` for a limit outside `1..=max`.
    pub fn list_transactions(
        &self,
        user: UserId,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<TransactionView>> {
        let limit = limit.unwrap_or(self.config.default_page_limit);
        self.check_limit(limit)?;
        self.require_account(user)?;

        let rows = self.ledger().involving(user, Page::new(limit, offset))?;
        let mut names: HashMap<UserId, String> = HashMap::new();
        let mut views = Vec::with_capacity(rows.len());

        for tx in rows {
            let vouch_count = self.registry().count(tx.id)?;
            let creator_name = self.display_name(&mut names, tx.created_by)?;
            let recipient_name = self.display_name(&mut names, tx.recipient)?;
            let sender_name = match tx.sender() {
                Some(sender) => Some(self.display_name(&mut names, sender)?),
                None => None,
            };
            let direction = Direction::of(&tx, user);
            views.push(TransactionView {
                transaction: tx,
                vouch_count,
                creator_name,
                recipient_name,
                sender_name,
                direction,
            });
        }
        Ok(views)
    }

    fn display_name(&self, cache: &mut HashMap<UserId, String>, user: UserId) -> Result<String> {
        if let Some(name) = cache.get(&user) {
            return Ok(name.clone());
        }
        let name = self
            .balances()
            .account(user)?
            .map_or_else(|| constants::UNKNOWN_NAME.to_string(), |a| a.display_name);
        cache.insert(user, name.clone());
        Ok(name)
    }

    fn check_limit(&self, limit: usize) -> Result<()> {
        if limit == 0 || limit > self.config.max_page_limit {
            return Err(MpbankError::InvalidPage {
                reason: format!(
                    "limit {limit} outside 1..={}",
                    self.config.max_page_limit
                ),
            });
        }
        Ok(())
    }

    /// Recompute balances from the ledger and compare against the store.
    ///
    /// # Errors
    /// `InvariantViolation` on any mismatch.
    pub fn audit(&self) -> Result<AuditReport> {
        let report = LedgerAudit::run(&self.store).inspect_err(|err| {
            tracing::error!(error = %err, "Ledger audit failed");
        })?;
        tracing::info!(
            accounts = report.accounts_checked,
            transactions = report.transactions_checked,
            total_supply = %report.total_supply,
            "Ledger audit passed"
        );
        Ok(report)
    }
}

/// Map a failed settlement batch, escalating partial writes to fatal.
fn settlement_error(transaction: TransactionId, step: &'static str, err: StoreError) -> MpbankError {
    if err.is_partial() {
        tracing::error!(
            tx = %transaction,
            step,
            error = %err,
            "Settlement batch partially applied"
        );
        return MpbankError::PartialSettlement {
            transaction,
            step,
            detail: err.to_string(),
        };
    }
    err.into()
}
