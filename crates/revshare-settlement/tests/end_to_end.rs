//! End-to-end settlement tests across ledger, pricing and settlement.
//!
//! These tests exercise the full purchase lifecycle:
//! quote (advisory) -> payment confirmation -> settlement -> audit trail
//!
//! They verify that the pieces hold together under redelivery, concurrent
//! confirmations racing for the last shares, full buyouts, and a store that
//! never lets a commit through.

use std::sync::{Arc, Barrier};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use revshare_ledger::{
    AuditTrail, CommitResult, LedgerStore, LedgerWrite, MemoryStore, PurchaseIntentValidator,
    ShareLedger,
};
use revshare_pricing::{PricingEngine, PricingTier};
use revshare_settlement::{SettlementProcessor, ShareConservation};
use revshare_types::*;

/// Helper: one store shared by the quote path and the settlement path.
struct Harness {
    store: Arc<MemoryStore>,
    ledger: ShareLedger,
    validator: PurchaseIntentValidator,
    processor: SettlementProcessor,
}

impl Harness {
    fn new() -> Self {
        Self::with_pricing(PricingEngine::standard())
    }

    fn with_pricing(pricing: PricingEngine) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ledger = ShareLedger::new(store.clone());
        let share_cap = pricing.max_shares();
        let validator = PurchaseIntentValidator::new(ledger.clone(), pricing);
        let processor = SettlementProcessor::new(ledger.clone(), SettlementConfig::default())
            .expect("default config is valid")
            .with_share_cap(share_cap);
        Self {
            store,
            ledger,
            validator,
            processor,
        }
    }

    fn sold(&self, app: &str) -> u32 {
        self.ledger
            .get_or_init(&AppId::new(app))
            .expect("ledger readable")
            .total_shares_sold
    }

    fn assert_conserved(&self, app: &str) {
        ShareConservation::new(self.ledger.clone())
            .with_share_cap(self.processor.share_cap())
            .verify(&AppId::new(app))
            .expect("share conservation should hold");
    }
}

/// Store that accepts reads but reports every commit as a lost race.
struct AlwaysConflicting {
    inner: MemoryStore,
}

impl LedgerStore for AlwaysConflicting {
    fn load_app(&self, app_id: &AppId) -> Result<Option<Versioned<AppRevenueRecord>>> {
        self.inner.load_app(app_id)
    }

    fn insert_app_if_absent(&self, record: AppRevenueRecord) -> Result<Versioned<AppRevenueRecord>> {
        self.inner.insert_app_if_absent(record)
    }

    fn commit(
        &self,
        _app_id: &AppId,
        expected_version: u64,
        _write: LedgerWrite,
    ) -> Result<CommitResult> {
        Ok(CommitResult::Conflict {
            expected: expected_version,
            actual: expected_version + 1,
        })
    }

    fn find_settlement(
        &self,
        session_id: &PaymentSessionId,
        intent_id: &PaymentIntentId,
    ) -> Result<Option<PriorSettlement>> {
        self.inner.find_settlement(session_id, intent_id)
    }

    fn shares_for_app(&self, app_id: &AppId) -> Result<Vec<ShareRecord>> {
        self.inner.shares_for_app(app_id)
    }

    fn shares_for_user(&self, user_id: &UserId) -> Result<Vec<ShareRecord>> {
        self.inner.shares_for_user(user_id)
    }

    fn transactions_for_app(&self, app_id: &AppId) -> Result<Vec<TransactionLogEntry>> {
        self.inner.transactions_for_app(app_id)
    }

    fn transactions_for_user(&self, user_id: &UserId) -> Result<Vec<TransactionLogEntry>> {
        self.inner.transactions_for_user(user_id)
    }

    fn quarantine_for_app(&self, app_id: &AppId) -> Result<Vec<QuarantineRecord>> {
        self.inner.quarantine_for_app(app_id)
    }

    fn quarantine_for_user(&self, user_id: &UserId) -> Result<Vec<QuarantineRecord>> {
        self.inner.quarantine_for_user(user_id)
    }

    fn unresolved_quarantine(&self) -> Result<Vec<QuarantineRecord>> {
        self.inner.unresolved_quarantine()
    }
}

// =============================================================================
// Test: Quote then settle, the happy path
// =============================================================================
#[test]
fn e2e_quote_then_settle() {
    let h = Harness::new();
    let app = AppId::new("todo");

    let quote = h
        .validator
        .quote_named(&app, Some("Todo Pro"), PurchaseType::Share, 12)
        .expect("quote should succeed");
    assert_eq!(quote.price_cents, 10 * 1_000 + 2 * 2_500);
    assert_eq!(quote.description, "12% revenue share of \"Todo Pro\" (Shares #1-12)");

    let mut confirmation = PaymentConfirmation::dummy_shares("todo", "alice", quote.shares_count);
    confirmation.amount_paid_cents = quote.price_cents;
    let outcome = h.processor.settle(&confirmation).expect("settle");
    assert_eq!(outcome.state, SettlementState::Committed);

    let info = h.validator.share_info(&app).expect("share info");
    assert_eq!(info.shares_sold, 12);
    assert_eq!(info.shares_remaining, 37);
    assert_eq!(info.current_price_cents, Some(2_500));
    assert!(!info.full_app_available);
    assert_eq!(info.holder_count, 1);

    let log = AuditTrail::new(h.store.clone())
        .transactions_for_user(&UserId::new("alice"))
        .expect("audit");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].amount_cents, 15_000);
    h.assert_conserved("todo");
}

// =============================================================================
// Test: A ladder longer than the standard one is honored everywhere
// =============================================================================
#[test]
fn e2e_custom_ladder_cap_flows_through() {
    let pricing = PricingEngine::with_ladder(vec![PricingTier::new(1, 60, 1_000)], 50_000)
        .expect("single-tier ladder is valid");
    let h = Harness::with_pricing(pricing);
    let app = AppId::new("todo");

    let quote = h
        .validator
        .quote(&app, PurchaseType::Share, 55)
        .expect("55 shares fit under a 60-share cap");
    assert_eq!(quote.shares_count, 55);

    let outcome = h
        .processor
        .settle(&PaymentConfirmation::dummy_shares("todo", "alice", 55))
        .expect("settle");
    assert_eq!(outcome.state, SettlementState::Committed);

    let info = h.validator.share_info(&app).expect("share info");
    assert_eq!(info.max_shares, 60);
    assert_eq!(info.shares_sold, 55);
    assert_eq!(info.shares_remaining, 5);
    assert_eq!(info.current_price_cents, Some(1_000));
    h.assert_conserved("todo");

    // One past the cap is quarantined, not committed.
    let outcome = h
        .processor
        .settle(&PaymentConfirmation::dummy_shares("todo", "bob", 6))
        .expect("settle");
    assert_eq!(outcome.state, SettlementState::Quarantined);
    assert_eq!(h.sold("todo"), 55);

    let outcome = h
        .processor
        .settle(&PaymentConfirmation::dummy_shares("todo", "bob", 5))
        .expect("settle");
    assert_eq!(outcome.state, SettlementState::Committed);
    assert_eq!(h.validator.share_info(&app).expect("share info").shares_remaining, 0);
    h.assert_conserved("todo");
}

// =============================================================================
// Test: Redelivered confirmation settles once
// =============================================================================
#[test]
fn e2e_redelivery_is_idempotent() {
    let h = Harness::new();
    let confirmation = PaymentConfirmation::dummy_with_session("todo", "alice", 4, "cs_redeliver");

    let outcomes: Vec<_> = (0..5)
        .map(|_| h.processor.settle(&confirmation).expect("settle"))
        .collect();

    assert!(outcomes.iter().all(SettlementOutcome::is_committed));
    assert!(!outcomes[0].replayed);
    assert!(outcomes[1..].iter().all(|o| o.replayed));
    assert_eq!(h.sold("todo"), 4, "counter must move once");
    assert_eq!(h.store.shares_for_app(&AppId::new("todo")).unwrap().len(), 1);
    assert_eq!(h.store.transactions_for_app(&AppId::new("todo")).unwrap().len(), 1);
    h.assert_conserved("todo");
}

// =============================================================================
// Test: Concurrent redelivery of the same payment
// =============================================================================
#[test]
fn e2e_concurrent_redelivery_settles_once() {
    let h = Arc::new(Harness::new());
    let barrier = Arc::new(Barrier::new(4));
    let confirmation = PaymentConfirmation::dummy_with_session("todo", "alice", 3, "cs_race");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let h = h.clone();
            let barrier = barrier.clone();
            let confirmation = confirmation.clone();
            thread::spawn(move || {
                barrier.wait();
                h.processor.settle(&confirmation).expect("settle")
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

    assert!(outcomes.iter().all(SettlementOutcome::is_committed));
    assert_eq!(outcomes.iter().filter(|o| !o.replayed).count(), 1);
    assert_eq!(h.sold("todo"), 3);
    h.assert_conserved("todo");
}

// =============================================================================
// Test: Two buyers race for more shares than remain
// =============================================================================
#[test]
fn e2e_race_for_last_shares_quarantines_loser() {
    let h = Arc::new(Harness::new());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|user| {
            let h = h.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let confirmation = PaymentConfirmation::dummy_shares("todo", user, 30);
                barrier.wait();
                h.processor.settle(&confirmation).expect("settle")
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| o.is_committed()).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_quarantined()).count(), 1);
    assert_eq!(h.sold("todo"), 30);

    let parked = AuditTrail::new(h.store.clone())
        .quarantine_for_app(&AppId::new("todo"))
        .unwrap();
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].attempted_shares, 30);
    assert_eq!(parked[0].current_shares_sold, 30);
    assert_eq!(parked[0].amount_paid_cents, 30_000);
    h.assert_conserved("todo");
}

// =============================================================================
// Test: Randomized concurrent load never oversells
// =============================================================================
#[test]
fn e2e_randomized_load_respects_cap() {
    let h = Arc::new(Harness::new());
    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let h = h.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(0x5eed + t as u64);
                let confirmations: Vec<_> = (0..8)
                    .map(|i| {
                        let user = format!("user-{t}-{i}");
                        if rng.gen_bool(0.05) {
                            PaymentConfirmation::dummy_full("busy", &user)
                        } else {
                            PaymentConfirmation::dummy_shares("busy", &user, rng.gen_range(1..=6))
                        }
                    })
                    .collect();
                barrier.wait();
                confirmations
                    .iter()
                    .map(|c| (c.shares_count, h.processor.settle(c).expect("settle")))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .flat_map(|t| t.join().unwrap())
        .collect();

    let committed: u32 = results
        .iter()
        .filter(|(_, o)| o.is_committed())
        .map(|(n, _)| *n)
        .sum();
    let quarantined = results.iter().filter(|(_, o)| o.is_quarantined()).count();

    assert_eq!(results.len(), threads * 8);
    assert!(results.iter().all(|(_, o)| !o.is_rejected()));
    assert!(committed <= 49, "oversold: {committed}");
    assert_eq!(h.sold("busy"), committed);
    assert_eq!(
        h.store.quarantine_for_app(&AppId::new("busy")).unwrap().len(),
        quarantined
    );
    h.assert_conserved("busy");
}

// =============================================================================
// Test: Full buyout closes the app
// =============================================================================
#[test]
fn e2e_full_buyout_then_late_share() {
    let h = Harness::new();
    let app = AppId::new("todo");

    let quote = h
        .validator
        .quote(&app, PurchaseType::Full, 1)
        .expect("full quote");
    assert_eq!(quote.price_cents, 100_000);
    assert_eq!(quote.shares_count, 49);

    let outcome = h
        .processor
        .settle(&PaymentConfirmation::dummy_full("todo", "carol"))
        .unwrap();
    assert!(outcome.is_committed());

    // A quote issued before the buyout can still turn into a payment.
    let late = h
        .processor
        .settle(&PaymentConfirmation::dummy_shares("todo", "dave", 1))
        .unwrap();
    assert!(late.is_quarantined());

    let err = h.validator.quote(&app, PurchaseType::Share, 1).unwrap_err();
    assert!(matches!(
        err,
        RevshareError::Capacity(CapacityError::FullyOwned(_))
    ));
    let info = h.validator.share_info(&app).unwrap();
    assert!(info.is_fully_owned);
    assert_eq!(info.shares_remaining, 0);
    assert_eq!(info.current_price_cents, None);
    h.assert_conserved("todo");
}

// =============================================================================
// Test: Malformed confirmation is rejected and leaves no trace
// =============================================================================
#[test]
fn e2e_rejected_confirmation_writes_nothing() {
    let h = Harness::new();
    let mut confirmation = PaymentConfirmation::dummy_shares("todo", "alice", 2);
    confirmation.payment_intent_id = PaymentIntentId::new("");

    let outcome = h.processor.settle(&confirmation).unwrap();
    assert_eq!(outcome.state, SettlementState::Rejected);
    assert!(outcome.share_record_id.is_none());
    assert!(h.store.unresolved_quarantine().unwrap().is_empty());
    assert_eq!(h.store.app_count().unwrap(), 0);
}

// =============================================================================
// Test: Endless conflicts surface as retryable contention
// =============================================================================
#[test]
fn e2e_contention_exhausts_attempts() {
    let store = Arc::new(AlwaysConflicting {
        inner: MemoryStore::new(),
    });
    let config = SettlementConfig {
        max_attempts: 3,
        backoff_base_ms: 1,
        backoff_max_ms: 2,
    };
    let processor = SettlementProcessor::new(ShareLedger::new(store.clone()), config).unwrap();

    let err = processor
        .settle(&PaymentConfirmation::dummy_shares("hot", "alice", 1))
        .unwrap_err();
    match &err {
        RevshareError::Contention { app_id, attempts } => {
            assert_eq!(app_id.as_str(), "hot");
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected contention, got {other}"),
    }
    assert!(err.is_retryable());
    assert!(store.shares_for_app(&AppId::new("hot")).unwrap().is_empty());
}
