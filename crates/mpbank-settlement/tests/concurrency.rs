//! # Concurrency and Failure Tests
//!
//! Racing requests must serialize through the store's guarded batches:
//!
//! | Race                           | Guard                          | Outcome                       |
//! |--------------------------------|--------------------------------|-------------------------------|
//! | two transfers, one sender      | reserve pinned to revision     | no overspend                  |
//! | N vouches crossing quorum      | vouch-count pin, status CAS    | applied exactly once          |
//! | N revokes of one row           | status CAS + require-status    | reversed exactly once         |
//! | one voucher, N requests        | (transaction, voucher) unique  | counted once                  |
//!
//! Failure paths use a store wrapper that rejects or half-applies chosen
//! batches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use mpbank_settlement::{Caller, CreateRequest, Mode, SettlementEngine, telemetry};
use mpbank_store::{LedgerStore, MemoryStore, Page, StoreError, StoreResult, WriteBatch, WriteOp};
use mpbank_types::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const WORKERS: usize = 8;

fn everyone(user: UserId) -> Caller {
    Caller::new(
        user,
        RoleMask::of(&[Capability::Transfer, Capability::Vouch, Capability::Revoke]),
    )
}

fn engine(config: BankConfig) -> Arc<SettlementEngine<MemoryStore>> {
    telemetry::init_for_tests();
    Arc::new(SettlementEngine::new(MemoryStore::new(), config).unwrap())
}

fn open<S: LedgerStore>(engine: &SettlementEngine<S>, name: &str) -> UserId {
    let id = UserId::new();
    engine.open_account(id, name).unwrap();
    id
}

fn mint<S: LedgerStore>(engine: &SettlementEngine<S>, to: UserId, amount: Points) -> Transaction {
    engine
        .create(&everyone(UserId::new()), to, &CreateRequest::mint("seed", amount))
        .unwrap()
}

// ── Races ───────────────────────────────────────────────────────────

#[test]
fn racing_transfers_cannot_double_spend() {
    let engine = engine(BankConfig::default());
    let sender = open(&engine, "Sender");
    mint(&engine, sender, 50);
    let recipients: Vec<UserId> = (0..WORKERS).map(|i| open(&engine, &format!("R{i}"))).collect();

    let handles: Vec<_> = recipients
        .into_iter()
        .map(|to| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine.create(&everyone(sender), to, &CreateRequest::transfer("race", 30))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "only one 30-point transfer fits in 50");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                MpbankError::InsufficientBalance { .. } | MpbankError::ConcurrentModification { .. }
            ),
            "unexpected error: {err}"
        );
        assert!(err.is_recoverable());
    }
    assert_eq!(engine.balance(sender).unwrap(), AccountBalance { total: 20, reserved: 0 });
    engine.audit().unwrap();
}

#[test]
fn retried_transfers_all_land_when_funds_suffice() {
    let engine = engine(BankConfig::default());
    let sender = open(&engine, "Sender");
    mint(&engine, sender, 95);
    let recipient = open(&engine, "Recipient");

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                loop {
                    match engine.create(
                        &everyone(sender),
                        recipient,
                        &CreateRequest::transfer("split", 10),
                    ) {
                        Err(MpbankError::ConcurrentModification { .. }) => thread::yield_now(),
                        other => return other,
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(engine.balance(sender).unwrap(), AccountBalance { total: 15, reserved: 0 });
    assert_eq!(engine.balance(recipient).unwrap().total, 80);
    engine.audit().unwrap();
}

#[test]
fn racing_vouches_apply_quorum_once() {
    let engine = engine(BankConfig::default().with_threshold(100, 3));
    let recipient = open(&engine, "Recipient");
    let tx = mint(&engine, recipient, 150);
    assert_eq!(tx.status, TransactionStatus::Pending);
    let vouchers: Vec<UserId> = (0..WORKERS).map(|i| open(&engine, &format!("V{i}"))).collect();

    let handles: Vec<_> = vouchers
        .into_iter()
        .map(|v| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.vouch(&everyone(v), tx.id))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let activations = results
        .iter()
        .filter(|r| matches!(r, Ok(outcome) if outcome.activated))
        .count();
    assert_eq!(activations, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                MpbankError::TransactionNotPending { status: TransactionStatus::Active, .. }
            ),
            "unexpected error: {err}"
        );
    }
    assert_eq!(engine.balance(recipient).unwrap().total, 150);
    // Activation commits with the third vouch; later ones see it active.
    assert_eq!(engine.vouches(tx.id).unwrap().len(), 3);
    engine.audit().unwrap();
}

#[test]
fn racing_revokes_reverse_once() {
    let engine = engine(BankConfig::default());
    let (a, b) = (open(&engine, "A"), open(&engine, "B"));
    mint(&engine, a, 60);
    let tx = engine
        .create(&everyone(a), b, &CreateRequest::transfer("rent", 40))
        .unwrap();

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.revoke(&everyone(UserId::new()), tx.id, None))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, MpbankError::AlreadyRevoked(_)), "unexpected error: {err}");
    }
    assert_eq!(engine.balance(a).unwrap().total, 60);
    assert_eq!(engine.balance(b).unwrap().total, 0);
    engine.audit().unwrap();
}

#[test]
fn one_voucher_racing_itself_counts_once() {
    let engine = engine(BankConfig::default().with_threshold(100, 5));
    let recipient = open(&engine, "Recipient");
    let voucher = open(&engine, "Voucher");
    let tx = mint(&engine, recipient, 500);

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.vouch(&everyone(voucher), tx.id))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, MpbankError::DuplicateVouch { .. }))
    );
    assert_eq!(engine.vouches(tx.id).unwrap().len(), 1);
}

// ── Injected store failures ─────────────────────────────────────────

/// Wraps a [`MemoryStore`] and fails selected batches.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    /// Reject any batch that inserts a transaction.
    fail_inserts: AtomicBool,
    /// Reject standalone releases.
    fail_releases: AtomicBool,
    /// Reject any batch that changes a transaction's status.
    fail_transitions: AtomicBool,
    /// Apply all but the last op of any status-transition batch, then report it.
    half_apply_transitions: AtomicBool,
}

impl LedgerStore for FlakyStore {
    fn account(&self, user: UserId) -> StoreResult<Option<Account>> {
        self.inner.account(user)
    }

    fn accounts(&self) -> StoreResult<Vec<Account>> {
        self.inner.accounts()
    }

    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        self.inner.transaction(id)
    }

    fn transactions(&self) -> StoreResult<Vec<Transaction>> {
        self.inner.transactions()
    }

    fn transactions_involving(&self, user: UserId, page: Page) -> StoreResult<Vec<Transaction>> {
        self.inner.transactions_involving(user, page)
    }

    fn vouches(&self, id: TransactionId) -> StoreResult<Vec<Vouch>> {
        self.inner.vouches(id)
    }

    fn vouch_count(&self, id: TransactionId) -> StoreResult<u32> {
        self.inner.vouch_count(id)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let ops = batch.ops();
        if self.fail_inserts.load(Ordering::SeqCst)
            && ops.iter().any(|op| matches!(op, WriteOp::InsertTransaction(_)))
        {
            return Err(StoreError::Unavailable("injected insert failure".into()));
        }
        if self.fail_releases.load(Ordering::SeqCst)
            && matches!(ops, [WriteOp::Release { .. }])
        {
            return Err(StoreError::Unavailable("injected release failure".into()));
        }
        let transitions = ops
            .iter()
            .any(|op| matches!(op, WriteOp::TransitionStatus { .. }));
        if transitions && self.fail_transitions.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected transition failure".into()));
        }
        if transitions && self.half_apply_transitions.load(Ordering::SeqCst) {
            let total = ops.len();
            let head: WriteBatch = ops[..total - 1].iter().cloned().collect();
            self.inner.commit(head)?;
            return Err(StoreError::PartiallyApplied {
                applied: total - 1,
                total,
                reason: "injected crash".into(),
            });
        }
        self.inner.commit(batch)
    }
}

fn flaky_engine(config: BankConfig) -> SettlementEngine<FlakyStore> {
    telemetry::init_for_tests();
    SettlementEngine::new(FlakyStore::default(), config).unwrap()
}

#[test]
fn failed_insert_releases_the_reservation() {
    let engine = flaky_engine(BankConfig::default());
    let (a, b) = (open(&engine, "A"), open(&engine, "B"));
    mint(&engine, a, 50);
    let rows_before = engine.store().transactions().unwrap().len();
    engine.store().fail_inserts.store(true, Ordering::SeqCst);

    let err = engine
        .create(&everyone(a), b, &CreateRequest::transfer("x", 30))
        .unwrap_err();

    assert!(matches!(err, MpbankError::StorageUnavailable(_)));
    assert!(err.is_recoverable());
    assert_eq!(engine.balance(a).unwrap(), AccountBalance { total: 50, reserved: 0 });
    assert_eq!(engine.balance(b).unwrap().total, 0);
    assert_eq!(engine.store().transactions().unwrap().len(), rows_before);
    engine.audit().unwrap();
}

#[test]
fn failed_compensation_is_fatal_and_names_the_leak() {
    let engine = flaky_engine(BankConfig::default());
    let (a, b) = (open(&engine, "A"), open(&engine, "B"));
    mint(&engine, a, 50);
    engine.store().fail_inserts.store(true, Ordering::SeqCst);
    engine.store().fail_releases.store(true, Ordering::SeqCst);

    let err = engine
        .create(&everyone(a), b, &CreateRequest::transfer("x", 30))
        .unwrap_err();

    assert!(
        matches!(err, MpbankError::CompensationFailed { user, amount: 30, .. } if user == a)
    );
    assert_eq!(err.class(), ErrorClass::Fatal);
    assert!(err.requires_operator());
    assert!(!err.is_recoverable());
    assert_eq!(engine.balance(a).unwrap().reserved, 30);
    assert!(matches!(
        engine.audit(),
        Err(MpbankError::InvariantViolation { .. })
    ));
}

#[test]
fn failed_activation_leaves_no_vouch_behind() {
    let engine = flaky_engine(BankConfig::default().with_threshold(100, 1));
    let recipient = open(&engine, "Recipient");
    let voucher = open(&engine, "Voucher");
    let tx = mint(&engine, recipient, 200);
    engine.store().fail_transitions.store(true, Ordering::SeqCst);

    let err = engine.vouch(&everyone(voucher), tx.id).unwrap_err();

    assert!(matches!(err, MpbankError::StorageUnavailable(_)));
    assert!(err.is_recoverable());
    assert!(engine.vouches(tx.id).unwrap().is_empty());
    assert_eq!(engine.transaction(tx.id).unwrap().status, TransactionStatus::Pending);
    assert_eq!(engine.balance(recipient).unwrap().total, 0);
    engine.audit().unwrap();

    // Retrying the same vouch once the store recovers activates it.
    engine.store().fail_transitions.store(false, Ordering::SeqCst);
    let outcome = engine.vouch(&everyone(voucher), tx.id).unwrap();
    assert!(outcome.activated);
    assert_eq!(outcome.vouch_count, 1);
    assert_eq!(engine.balance(recipient).unwrap().total, 200);
    engine.audit().unwrap();
}

#[test]
fn half_applied_activation_is_fatal() {
    let engine = flaky_engine(BankConfig::default().with_threshold(100, 1));
    let recipient = open(&engine, "Recipient");
    let voucher = open(&engine, "Voucher");
    let tx = mint(&engine, recipient, 200);
    engine.store().half_apply_transitions.store(true, Ordering::SeqCst);

    let err = engine.vouch(&everyone(voucher), tx.id).unwrap_err();

    assert!(matches!(
        err,
        MpbankError::PartialSettlement { step: "activate", transaction, .. } if transaction == tx.id
    ));
    assert_eq!(err.class(), ErrorClass::Fatal);
    // Status flipped, credit never landed.
    assert_eq!(engine.transaction(tx.id).unwrap().status, TransactionStatus::Active);
    assert_eq!(engine.balance(recipient).unwrap().total, 0);
    assert!(engine.audit().is_err());
}

#[test]
fn half_applied_revoke_is_fatal() {
    let engine = flaky_engine(BankConfig::default());
    let recipient = open(&engine, "Recipient");
    let tx = mint(&engine, recipient, 40);
    engine.store().half_apply_transitions.store(true, Ordering::SeqCst);

    let err = engine
        .revoke(&everyone(UserId::new()), tx.id, None)
        .unwrap_err();

    assert!(matches!(err, MpbankError::PartialSettlement { step: "revoke", .. }));
    assert!(err.requires_operator());
}

// ── Randomized history ──────────────────────────────────────────────

#[test]
fn random_histories_keep_the_ledger_consistent() {
    let mut rng = StdRng::seed_from_u64(0x6d70_6261_6e6b);
    let engine = engine(
        BankConfig::default()
            .with_threshold(50, 1)
            .with_threshold(200, 3)
            .with_standard_transaction("chores", "Chores", 15),
    );
    let users: Vec<UserId> = (0..6).map(|i| open(&*engine, &format!("U{i}"))).collect();
    let mut pending: Vec<TransactionId> = Vec::new();
    let mut settled: Vec<TransactionId> = Vec::new();

    for step in 0..500 {
        let actor = *users.choose(&mut rng).unwrap();
        let other = *users.choose(&mut rng).unwrap();
        let caller = everyone(actor);

        let result: Result<()> = match rng.gen_range(0..6) {
            0 => {
                let delta = rng.gen_range(1..300);
                let delta = if rng.gen_bool(0.2) { -delta } else { delta };
                engine.create(&caller, other, &CreateRequest::mint("work", delta))
                .map(|tx| match tx.status {
                    TransactionStatus::Pending => pending.push(tx.id),
                    _ => settled.push(tx.id),
                })
            }
            1 => engine
                .create(&caller, other, &CreateRequest::standard(Mode::Mint, "chores"))
                .map(|tx| settled.push(tx.id)),
            2 => {
                let delta = rng.gen_range(1..60);
                let delta = if rng.gen_bool(0.3) { -delta } else { delta };
                engine
                    .create(&caller, other, &CreateRequest::transfer("trade", delta))
                    .map(|tx| settled.push(tx.id))
            }
            3 | 4 => {
                let picked = pending.choose(&mut rng).copied();
                match picked {
                    Some(id) => engine.vouch(&caller, id).map(|outcome| {
                        if outcome.activated {
                            pending.retain(|p| *p != id);
                            settled.push(id);
                        }
                    }),
                    None => Ok(()),
                }
            }
            _ => {
                let pool = if rng.gen_bool(0.5) { &pending } else { &settled };
                let picked = pool.choose(&mut rng).copied();
                match picked {
                    Some(id) => engine.revoke(&caller, id, Some("random")).map(|_| {
                        pending.retain(|p| *p != id);
                    }),
                    None => Ok(()),
                }
            }
        };

        if let Err(err) = result {
            assert!(err.is_recoverable(), "step {step}: {err}");
        }
        for user in &users {
            assert!(engine.balance(*user).unwrap().reserved >= 0, "step {step}");
        }
        engine.audit().unwrap_or_else(|err| panic!("step {step}: {err}"));
    }

    let report = engine.audit().unwrap();
    assert_eq!(report.total_reserved, 0);
    assert_eq!(report.transactions_checked, engine.store().transactions().unwrap().len());
}
