//! Settlement of confirmed payments.
//!
//! Money has already been captured by the time a confirmation arrives, and
//! the processor may deliver it more than once. Settlement therefore:
//! 1. Rejects confirmations missing required fields (not retried)
//! 2. Returns the prior outcome if the payment ids were already recorded
//! 3. Re-validates capacity against the live ledger record
//! 4. Commits share record + counter + log entry together, or quarantines
//! 5. Retries version conflicts with backoff, then reports contention
//!
//! Capacity can never be reserved across the payment processor, so an
//! over-cap confirmation is parked in quarantine for a human to refund
//! instead of being forced into the ledger.

use chrono::{DateTime, Utc};
use revshare_ledger::{CommitResult, LedgerWrite, ShareLedger};
use revshare_types::{
    AppRevenueRecord, PaymentConfirmation, PriorSettlement, PurchaseType, QuarantineId,
    QuarantineKind, QuarantineRecord, Result, RevshareError, SettlementConfig, SettlementOutcome,
    ShareRecord, ShareRecordId, TransactionId, TransactionKind, TransactionLogEntry, constants,
};

/// Decide what a confirmation does to an app record. Pure: the same record
/// and confirmation always yield the same kind of write.
#[must_use]
pub fn plan_settlement(
    record: &AppRevenueRecord,
    confirmation: &PaymentConfirmation,
    share_cap: u32,
    now: DateTime<Utc>,
) -> LedgerWrite {
    let sold = record.total_shares_sold;
    let is_full = confirmation.purchase_type == PurchaseType::Full;
    let over_cap = sold
        .checked_add(confirmation.shares_count)
        .is_none_or(|total| total > share_cap);

    if record.is_fully_owned || (is_full && sold > 0) || over_cap {
        return LedgerWrite::Quarantine(QuarantineRecord {
            id: QuarantineId::new(),
            kind: QuarantineKind::Oversold,
            app_id: confirmation.app_id.clone(),
            user_id: confirmation.user_id.clone(),
            payment_session_id: confirmation.payment_session_id.clone(),
            payment_intent_id: confirmation.payment_intent_id.clone(),
            attempted_shares: confirmation.shares_count,
            current_shares_sold: sold,
            amount_paid_cents: confirmation.amount_paid_cents,
            created_at: now,
            resolved: false,
        });
    }

    let mut next = record.clone();
    next.total_shares_sold = sold + confirmation.shares_count;
    next.is_fully_owned |= is_full;
    next.updated_at = now;
    next.last_purchase_at = Some(now);

    let share = ShareRecord {
        id: ShareRecordId::for_payment(&confirmation.app_id, &confirmation.payment_session_id),
        app_id: confirmation.app_id.clone(),
        app_name: confirmation.display_name().to_string(),
        user_id: confirmation.user_id.clone(),
        shares_owned: confirmation.shares_count,
        total_paid_cents: confirmation.amount_paid_cents,
        purchase_type: confirmation.purchase_type,
        payment_session_id: confirmation.payment_session_id.clone(),
        payment_intent_id: confirmation.payment_intent_id.clone(),
        purchased_at: now,
    };

    let entry = TransactionLogEntry {
        id: TransactionId::new(),
        kind: TransactionKind::from(confirmation.purchase_type),
        app_id: confirmation.app_id.clone(),
        user_id: confirmation.user_id.clone(),
        shares_count: confirmation.shares_count,
        amount_cents: confirmation.amount_paid_cents,
        currency: confirmation.currency.clone(),
        payment_session_id: confirmation.payment_session_id.clone(),
        payment_intent_id: confirmation.payment_intent_id.clone(),
        created_at: now,
    };

    LedgerWrite::Settle {
        record: next,
        share,
        entry,
    }
}

/// Commits confirmed payments into the share ledger.
#[derive(Clone)]
pub struct SettlementProcessor {
    ledger: ShareLedger,
    config: SettlementConfig,
    share_cap: u32,
}

impl SettlementProcessor {
    /// # Errors
    /// Returns [`RevshareError::Configuration`] if the retry policy is invalid.
    pub fn new(ledger: ShareLedger, config: SettlementConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger,
            config,
            share_cap: constants::MAX_SHARES,
        })
    }

    /// Override the share cap (must match the pricing ladder in use).
    #[must_use]
    pub fn with_share_cap(mut self, share_cap: u32) -> Self {
        self.share_cap = share_cap;
        self
    }

    #[must_use]
    pub fn share_cap(&self) -> u32 {
        self.share_cap
    }

    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Settle one confirmation.
    ///
    /// Committed, quarantined and rejected confirmations all return `Ok`:
    /// the caller should acknowledge them. Only failures worth redelivering
    /// come back as `Err`.
    ///
    /// # Errors
    /// - `Contention` if concurrent writers kept winning for every attempt
    /// - `Persistence` if the store failed
    pub fn settle(&self, confirmation: &PaymentConfirmation) -> Result<SettlementOutcome> {
        let missing = confirmation.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(
                app_id = %confirmation.app_id,
                session = %confirmation.payment_session_id,
                missing = ?missing,
                "Settlement rejected: confirmation missing required fields"
            );
            return Ok(SettlementOutcome::rejected(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        if let Some(prior) = self
            .ledger
            .store()
            .find_settlement(&confirmation.payment_session_id, &confirmation.payment_intent_id)?
        {
            tracing::info!(
                app_id = %confirmation.app_id,
                session = %confirmation.payment_session_id,
                prior = ?prior,
                "Settlement replayed: payment already recorded"
            );
            return Ok(SettlementOutcome::replay(prior, 0));
        }

        let app_id = &confirmation.app_id;
        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            let outcome = self.ledger.conditional_update(app_id, |record| {
                Ok(plan_settlement(record, confirmation, self.share_cap, Utc::now()))
            })?;

            match (outcome.result, outcome.written) {
                (CommitResult::Applied { version }, Some(PriorSettlement::Committed(id))) => {
                    tracing::info!(
                        app_id = %app_id,
                        user = %confirmation.user_id,
                        purchase_type = %confirmation.purchase_type,
                        shares = confirmation.shares_count,
                        amount_cents = confirmation.amount_paid_cents,
                        share_record = %id,
                        version,
                        attempt,
                        "Settlement committed"
                    );
                    return Ok(SettlementOutcome::committed(id, attempt));
                }
                (CommitResult::Applied { .. }, Some(PriorSettlement::Quarantined(id))) => {
                    tracing::error!(
                        app_id = %app_id,
                        user = %confirmation.user_id,
                        session = %confirmation.payment_session_id,
                        intent = %confirmation.payment_intent_id,
                        attempted_shares = confirmation.shares_count,
                        amount_paid_cents = confirmation.amount_paid_cents,
                        quarantine = %id,
                        "CRITICAL: oversell detected, paid settlement quarantined for manual review"
                    );
                    return Ok(SettlementOutcome::quarantined(id, attempt));
                }
                (CommitResult::Applied { .. }, None) => {
                    return Err(RevshareError::Internal(format!(
                        "settlement for {app_id} applied a write that records nothing"
                    )));
                }
                (CommitResult::Duplicate(prior), _) => {
                    tracing::info!(
                        app_id = %app_id,
                        session = %confirmation.payment_session_id,
                        prior = ?prior,
                        attempt,
                        "Settlement replayed: concurrent delivery already recorded"
                    );
                    return Ok(SettlementOutcome::replay(prior, attempt));
                }
                (CommitResult::Conflict { expected, actual }, _) => {
                    tracing::warn!(
                        app_id = %app_id,
                        attempt,
                        max_attempts,
                        expected,
                        actual,
                        "Settlement conflicted with a concurrent writer"
                    );
                    if attempt < max_attempts {
                        std::thread::sleep(self.config.backoff_for(attempt));
                    }
                }
            }
        }

        tracing::error!(
            app_id = %app_id,
            session = %confirmation.payment_session_id,
            attempts = max_attempts,
            "Settlement gave up on contention; delivery must be retried"
        );
        Err(RevshareError::Contention {
            app_id: app_id.clone(),
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use revshare_ledger::{AuditTrail, LedgerStore, MemoryStore};
    use revshare_types::*;

    use super::*;

    fn processor() -> (Arc<MemoryStore>, SettlementProcessor) {
        let store = Arc::new(MemoryStore::new());
        let ledger = ShareLedger::new(store.clone());
        let processor = SettlementProcessor::new(ledger, SettlementConfig::default()).unwrap();
        (store, processor)
    }

    fn total_sold(store: &MemoryStore, app: &str) -> u32 {
        store
            .load_app(&AppId::new(app))
            .unwrap()
            .map_or(0, |v| v.value.total_shares_sold)
    }

    #[test]
    fn plan_commits_within_cap() {
        let record = AppRevenueRecord::new(AppId::new("todo"));
        let confirmation = PaymentConfirmation::dummy_shares("todo", "alice", 49);
        let write = plan_settlement(&record, &confirmation, 49, Utc::now());
        let LedgerWrite::Settle { record: next, share, entry } = write else {
            panic!("expected a settle write");
        };
        assert_eq!(next.total_shares_sold, 49);
        assert!(!next.is_fully_owned);
        assert!(next.last_purchase_at.is_some());
        assert_eq!(share.shares_owned, 49);
        assert_eq!(share.app_name, "todo");
        assert_eq!(entry.kind, TransactionKind::SharePurchase);
        assert_eq!(entry.currency, "usd");
    }

    #[test]
    fn plan_quarantines_over_cap() {
        let mut record = AppRevenueRecord::new(AppId::new("todo"));
        record.total_shares_sold = 45;
        let confirmation = PaymentConfirmation::dummy_shares("todo", "bob", 5);
        let LedgerWrite::Quarantine(q) = plan_settlement(&record, &confirmation, 49, Utc::now())
        else {
            panic!("expected a quarantine write");
        };
        assert_eq!(q.kind, QuarantineKind::Oversold);
        assert_eq!(q.attempted_shares, 5);
        assert_eq!(q.current_shares_sold, 45);
        assert_eq!(q.amount_paid_cents, 5_000);
        assert!(!q.resolved);
    }

    #[test]
    fn plan_quarantines_buyout_after_partial_and_sales_after_buyout() {
        let mut record = AppRevenueRecord::new(AppId::new("todo"));
        record.total_shares_sold = 1;
        let full = PaymentConfirmation::dummy_full("todo", "carol");
        assert!(matches!(
            plan_settlement(&record, &full, 49, Utc::now()),
            LedgerWrite::Quarantine(_)
        ));

        let mut owned = AppRevenueRecord::new(AppId::new("todo"));
        owned.total_shares_sold = 10;
        owned.is_fully_owned = true;
        let share = PaymentConfirmation::dummy_shares("todo", "dave", 1);
        assert!(matches!(
            plan_settlement(&owned, &share, 49, Utc::now()),
            LedgerWrite::Quarantine(_)
        ));
    }

    #[test]
    fn settle_commits_and_logs() {
        let (store, processor) = processor();
        let confirmation = PaymentConfirmation::dummy_shares("todo", "alice", 3);
        let outcome = processor.settle(&confirmation).unwrap();

        assert!(outcome.is_committed());
        assert!(!outcome.replayed);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.share_record_id,
            Some(ShareRecordId::for_payment(
                &confirmation.app_id,
                &confirmation.payment_session_id
            ))
        );
        assert_eq!(total_sold(&store, "todo"), 3);
        assert_eq!(store.shares_for_user(&UserId::new("alice")).unwrap().len(), 1);
        assert_eq!(store.transactions_for_app(&AppId::new("todo")).unwrap().len(), 1);
    }

    #[test]
    fn redelivery_is_a_no_op() {
        let (store, processor) = processor();
        let confirmation = PaymentConfirmation::dummy_with_session("todo", "alice", 2, "cs_dup");

        let first = processor.settle(&confirmation).unwrap();
        let second = processor.settle(&confirmation).unwrap();

        assert!(first.is_committed());
        assert!(second.is_committed());
        assert!(second.replayed);
        assert_eq!(first.share_record_id, second.share_record_id);
        assert_eq!(total_sold(&store, "todo"), 2);
        assert_eq!(store.shares_for_app(&AppId::new("todo")).unwrap().len(), 1);
        assert_eq!(store.transactions_for_app(&AppId::new("todo")).unwrap().len(), 1);
    }

    #[test]
    fn oversell_is_quarantined_not_failed() {
        let (store, processor) = processor();
        processor
            .settle(&PaymentConfirmation::dummy_shares("todo", "alice", 45))
            .unwrap();
        let outcome = processor
            .settle(&PaymentConfirmation::dummy_shares("todo", "bob", 5))
            .unwrap();

        assert!(outcome.is_quarantined());
        assert_eq!(total_sold(&store, "todo"), 45);
        let audit = AuditTrail::new(store.clone());
        let parked = audit.unresolved_quarantine().unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].attempted_shares, 5);
        assert_eq!(parked[0].current_shares_sold, 45);
    }

    #[test]
    fn quarantined_redelivery_replays_quarantine() {
        let (store, processor) = processor();
        processor
            .settle(&PaymentConfirmation::dummy_shares("todo", "alice", 49))
            .unwrap();
        let late = PaymentConfirmation::dummy_with_session("todo", "bob", 1, "cs_late");

        let first = processor.settle(&late).unwrap();
        let second = processor.settle(&late).unwrap();
        assert!(first.is_quarantined());
        assert!(second.is_quarantined());
        assert!(second.replayed);
        assert_eq!(first.quarantine_id, second.quarantine_id);
        assert_eq!(store.quarantine_for_app(&AppId::new("todo")).unwrap().len(), 1);
    }

    #[test]
    fn full_buyout_marks_fully_owned() {
        let (store, processor) = processor();
        let outcome = processor
            .settle(&PaymentConfirmation::dummy_full("todo", "carol"))
            .unwrap();
        assert!(outcome.is_committed());

        let record = store.load_app(&AppId::new("todo")).unwrap().unwrap().value;
        assert!(record.is_fully_owned);
        assert_eq!(record.total_shares_sold, 49);
        let log = store.transactions_for_app(&AppId::new("todo")).unwrap();
        assert_eq!(log[0].kind, TransactionKind::FullPurchase);
    }

    #[test]
    fn missing_fields_are_rejected_without_writes() {
        let (store, processor) = processor();
        let mut confirmation = PaymentConfirmation::dummy_shares("todo", "", 1);
        confirmation.payment_session_id = PaymentSessionId::new("");

        let outcome = processor.settle(&confirmation).unwrap();
        assert!(outcome.is_rejected());
        let reason = outcome.rejection_reason.unwrap();
        assert!(reason.contains("user_id"));
        assert!(reason.contains("payment_session_id"));
        assert_eq!(store.app_count().unwrap(), 0);
    }

    #[test]
    fn invalid_retry_policy_rejected() {
        let ledger = ShareLedger::new(Arc::new(MemoryStore::new()));
        let config = SettlementConfig {
            max_attempts: 0,
            ..SettlementConfig::default()
        };
        assert!(matches!(
            SettlementProcessor::new(ledger, config),
            Err(RevshareError::Configuration(_))
        ));
    }

    #[test]
    fn custom_share_cap_applies() {
        let store = Arc::new(MemoryStore::new());
        let processor =
            SettlementProcessor::new(ShareLedger::new(store), SettlementConfig::default())
                .unwrap()
                .with_share_cap(5);
        assert!(
            processor
                .settle(&PaymentConfirmation::dummy_shares("tiny", "alice", 5))
                .unwrap()
                .is_committed()
        );
        assert!(
            processor
                .settle(&PaymentConfirmation::dummy_shares("tiny", "bob", 1))
                .unwrap()
                .is_quarantined()
        );
    }
}
