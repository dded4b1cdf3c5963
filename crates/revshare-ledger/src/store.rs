//! Ledger storage.
//!
//! [`LedgerStore`] is the persistence seam: versioned app records plus the
//! write-once share records, transaction log and quarantine queue. Every
//! mutation of an app record is a compare-and-commit against the version the
//! caller read, and everything a single commit writes becomes visible at
//! once or not at all.
//!
//! Payment session and intent identifiers are unique across share records
//! and quarantine records. A commit that would reuse one is refused with
//! [`CommitResult::Duplicate`], which is what makes redelivered payment
//! confirmations harmless.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use revshare_types::{
    AppId, AppRevenueRecord, PaymentIntentId, PaymentSessionId, PriorSettlement,
    QuarantineRecord, Result, RevshareError, ShareRecord, ShareRecordId, TransactionLogEntry,
    UserId, Versioned,
};

/// A set of effects committed together against one app record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// Admit a purchase: new app state, its share record and audit entry.
    Settle {
        record: AppRevenueRecord,
        share: ShareRecord,
        entry: TransactionLogEntry,
    },
    /// Park a paid purchase without touching the app record.
    Quarantine(QuarantineRecord),
    /// Replace administrative fields of the app record.
    Amend(AppRevenueRecord),
}

impl LedgerWrite {
    /// The settlement this write records, if it records one.
    #[must_use]
    pub fn settlement_ref(&self) -> Option<PriorSettlement> {
        match self {
            Self::Settle { share, .. } => Some(PriorSettlement::Committed(share.id)),
            Self::Quarantine(record) => Some(PriorSettlement::Quarantined(record.id)),
            Self::Amend(_) => None,
        }
    }

    fn payment_ids(&self) -> Option<(&PaymentSessionId, &PaymentIntentId)> {
        match self {
            Self::Settle { share, .. } => {
                Some((&share.payment_session_id, &share.payment_intent_id))
            }
            Self::Quarantine(record) => {
                Some((&record.payment_session_id, &record.payment_intent_id))
            }
            Self::Amend(_) => None,
        }
    }
}

/// Result of a compare-and-commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// Written; the app record is now at `version`.
    Applied { version: u64 },
    /// The app record moved since it was read. Nothing was written.
    Conflict { expected: u64, actual: u64 },
    /// The payment identifiers are already recorded. Nothing was written.
    Duplicate(PriorSettlement),
}

/// Persistence capability injected into the ledger components.
pub trait LedgerStore: Send + Sync {
    /// Current versioned record for an app, if one exists.
    fn load_app(&self, app_id: &AppId) -> Result<Option<Versioned<AppRevenueRecord>>>;

    /// Insert `record` at version 1 unless a record already exists for its
    /// app. Returns whichever record is stored afterwards.
    fn insert_app_if_absent(&self, record: AppRevenueRecord) -> Result<Versioned<AppRevenueRecord>>;

    /// Apply `write` only if the app record is still at `expected_version`.
    fn commit(&self, app_id: &AppId, expected_version: u64, write: LedgerWrite)
    -> Result<CommitResult>;

    /// What, if anything, was already recorded for these payment identifiers.
    fn find_settlement(
        &self,
        session_id: &PaymentSessionId,
        intent_id: &PaymentIntentId,
    ) -> Result<Option<PriorSettlement>>;

    fn shares_for_app(&self, app_id: &AppId) -> Result<Vec<ShareRecord>>;

    fn shares_for_user(&self, user_id: &UserId) -> Result<Vec<ShareRecord>>;

    fn transactions_for_app(&self, app_id: &AppId) -> Result<Vec<TransactionLogEntry>>;

    fn transactions_for_user(&self, user_id: &UserId) -> Result<Vec<TransactionLogEntry>>;

    fn quarantine_for_app(&self, app_id: &AppId) -> Result<Vec<QuarantineRecord>>;

    fn quarantine_for_user(&self, user_id: &UserId) -> Result<Vec<QuarantineRecord>>;

    fn unresolved_quarantine(&self) -> Result<Vec<QuarantineRecord>>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    apps: HashMap<AppId, Versioned<AppRevenueRecord>>,
    shares: HashMap<ShareRecordId, ShareRecord>,
    transactions: Vec<TransactionLogEntry>,
    quarantine: Vec<QuarantineRecord>,
    /// Uniqueness indexes over payment identifiers.
    by_session: HashMap<PaymentSessionId, PriorSettlement>,
    by_intent: HashMap<PaymentIntentId, PriorSettlement>,
}

impl StoreState {
    fn find(
        &self,
        session_id: &PaymentSessionId,
        intent_id: &PaymentIntentId,
    ) -> Option<PriorSettlement> {
        self.by_session
            .get(session_id)
            .or_else(|| self.by_intent.get(intent_id))
            .copied()
    }

    fn index(
        &mut self,
        session_id: &PaymentSessionId,
        intent_id: &PaymentIntentId,
        settlement: PriorSettlement,
    ) {
        self.by_session.insert(session_id.clone(), settlement);
        self.by_intent.insert(intent_id.clone(), settlement);
    }
}

/// In-process [`LedgerStore`].
///
/// A single `RwLock` guards all collections, so a commit's effects are
/// observed together. Versions are tracked per app; commits for different
/// apps never conflict with each other.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

fn poisoned<T>(_: PoisonError<T>) -> RevshareError {
    RevshareError::Persistence("ledger store lock poisoned".to_string())
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of app records stored.
    pub fn app_count(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poisoned)?.apps.len())
    }
}

impl LedgerStore for MemoryStore {
    fn load_app(&self, app_id: &AppId) -> Result<Option<Versioned<AppRevenueRecord>>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.apps.get(app_id).cloned())
    }

    fn insert_app_if_absent(&self, record: AppRevenueRecord) -> Result<Versioned<AppRevenueRecord>> {
        let mut state = self.state.write().map_err(poisoned)?;
        let stored = state
            .apps
            .entry(record.app_id.clone())
            .or_insert_with(|| Versioned::initial(record));
        Ok(stored.clone())
    }

    fn commit(
        &self,
        app_id: &AppId,
        expected_version: u64,
        write: LedgerWrite,
    ) -> Result<CommitResult> {
        let mut state = self.state.write().map_err(poisoned)?;

        let actual = state
            .apps
            .get(app_id)
            .map(|slot| slot.version)
            .ok_or_else(|| {
                RevshareError::Internal(format!("commit against uninitialised app {app_id}"))
            })?;
        if actual != expected_version {
            return Ok(CommitResult::Conflict {
                expected: expected_version,
                actual,
            });
        }

        if let Some((session_id, intent_id)) = write.payment_ids() {
            if let Some(prior) = state.find(session_id, intent_id) {
                return Ok(CommitResult::Duplicate(prior));
            }
        }

        match write {
            LedgerWrite::Settle {
                record,
                share,
                entry,
            } => {
                if record.app_id != *app_id || share.app_id != *app_id {
                    return Err(RevshareError::Internal(format!(
                        "settlement for {} committed against app {app_id}",
                        share.app_id
                    )));
                }
                if state.shares.contains_key(&share.id) {
                    return Ok(CommitResult::Duplicate(PriorSettlement::Committed(share.id)));
                }

                let settlement = PriorSettlement::Committed(share.id);
                state.index(&share.payment_session_id, &share.payment_intent_id, settlement);
                state.shares.insert(share.id, share);
                state.transactions.push(entry);
                Ok(CommitResult::Applied {
                    version: Self::replace_record(&mut state, app_id, record)?,
                })
            }
            LedgerWrite::Quarantine(record) => {
                let settlement = PriorSettlement::Quarantined(record.id);
                state.index(&record.payment_session_id, &record.payment_intent_id, settlement);
                state.quarantine.push(record);
                Ok(CommitResult::Applied {
                    version: expected_version,
                })
            }
            LedgerWrite::Amend(record) => {
                if record.app_id != *app_id {
                    return Err(RevshareError::Internal(format!(
                        "amendment for {} committed against app {app_id}",
                        record.app_id
                    )));
                }
                Ok(CommitResult::Applied {
                    version: Self::replace_record(&mut state, app_id, record)?,
                })
            }
        }
    }

    fn find_settlement(
        &self,
        session_id: &PaymentSessionId,
        intent_id: &PaymentIntentId,
    ) -> Result<Option<PriorSettlement>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.find(session_id, intent_id))
    }

    fn shares_for_app(&self, app_id: &AppId) -> Result<Vec<ShareRecord>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .shares
            .values()
            .filter(|share| share.app_id == *app_id)
            .cloned()
            .collect())
    }

    fn shares_for_user(&self, user_id: &UserId) -> Result<Vec<ShareRecord>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .shares
            .values()
            .filter(|share| share.user_id == *user_id)
            .cloned()
            .collect())
    }

    fn transactions_for_app(&self, app_id: &AppId) -> Result<Vec<TransactionLogEntry>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .transactions
            .iter()
            .filter(|entry| entry.app_id == *app_id)
            .cloned()
            .collect())
    }

    fn transactions_for_user(&self, user_id: &UserId) -> Result<Vec<TransactionLogEntry>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .transactions
            .iter()
            .filter(|entry| entry.user_id == *user_id)
            .cloned()
            .collect())
    }

    fn quarantine_for_app(&self, app_id: &AppId) -> Result<Vec<QuarantineRecord>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .quarantine
            .iter()
            .filter(|record| record.app_id == *app_id)
            .cloned()
            .collect())
    }

    fn quarantine_for_user(&self, user_id: &UserId) -> Result<Vec<QuarantineRecord>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .quarantine
            .iter()
            .filter(|record| record.user_id == *user_id)
            .cloned()
            .collect())
    }

    fn unresolved_quarantine(&self) -> Result<Vec<QuarantineRecord>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .quarantine
            .iter()
            .filter(|record| !record.resolved)
            .cloned()
            .collect())
    }
}

impl MemoryStore {
    /// Swap in the new record and bump its version. Caller holds the write lock.
    fn replace_record(
        state: &mut StoreState,
        app_id: &AppId,
        record: AppRevenueRecord,
    ) -> Result<u64> {
        let slot = state.apps.get_mut(app_id).ok_or_else(|| {
            RevshareError::Internal(format!("app {app_id} vanished during commit"))
        })?;
        slot.version += 1;
        slot.value = record;
        Ok(slot.version)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use revshare_types::*;

    use super::*;

    fn share_write(record: &AppRevenueRecord, user: &str, shares: u32, session: &str) -> LedgerWrite {
        let app_id = record.app_id.clone();
        let session_id = PaymentSessionId::new(session);
        let intent_id = PaymentIntentId::new(format!("pi_{session}"));
        let mut next = record.clone();
        next.total_shares_sold += shares;
        LedgerWrite::Settle {
            record: next,
            share: ShareRecord {
                id: ShareRecordId::for_payment(&app_id, &session_id),
                app_id: app_id.clone(),
                app_name: app_id.to_string(),
                user_id: UserId::new(user),
                shares_owned: shares,
                total_paid_cents: u64::from(shares) * 1_000,
                purchase_type: PurchaseType::Share,
                payment_session_id: session_id.clone(),
                payment_intent_id: intent_id.clone(),
                purchased_at: Utc::now(),
            },
            entry: TransactionLogEntry {
                id: TransactionId::new(),
                kind: TransactionKind::SharePurchase,
                app_id,
                user_id: UserId::new(user),
                shares_count: shares,
                amount_cents: u64::from(shares) * 1_000,
                currency: "usd".to_string(),
                payment_session_id: session_id,
                payment_intent_id: intent_id,
                created_at: Utc::now(),
            },
        }
    }

    fn quarantine_write(app: &str, session: &str) -> LedgerWrite {
        LedgerWrite::Quarantine(QuarantineRecord {
            id: QuarantineId::new(),
            kind: QuarantineKind::Oversold,
            app_id: AppId::new(app),
            user_id: UserId::new("mallory"),
            payment_session_id: PaymentSessionId::new(session),
            payment_intent_id: PaymentIntentId::new(format!("pi_{session}")),
            attempted_shares: 10,
            current_shares_sold: 45,
            amount_paid_cents: 200_000,
            created_at: Utc::now(),
            resolved: false,
        })
    }

    #[test]
    fn insert_if_absent_keeps_first_record() {
        let store = MemoryStore::new();
        let app = AppId::new("todo");
        let first = store
            .insert_app_if_absent(AppRevenueRecord::new(app.clone()))
            .unwrap();
        assert_eq!(first.version, 1);

        let mut other = AppRevenueRecord::new(app.clone());
        other.total_shares_sold = 7;
        let second = store.insert_app_if_absent(other).unwrap();
        assert_eq!(second, first);
        assert_eq!(store.app_count().unwrap(), 1);
    }

    #[test]
    fn commit_applies_all_effects_and_bumps_version() {
        let store = MemoryStore::new();
        let app = AppId::new("todo");
        let current = store
            .insert_app_if_absent(AppRevenueRecord::new(app.clone()))
            .unwrap();

        let result = store
            .commit(&app, current.version, share_write(&current.value, "alice", 3, "cs_1"))
            .unwrap();
        assert_eq!(result, CommitResult::Applied { version: 2 });

        let stored = store.load_app(&app).unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.total_shares_sold, 3);
        assert_eq!(store.shares_for_app(&app).unwrap().len(), 1);
        assert_eq!(store.transactions_for_app(&app).unwrap().len(), 1);
        assert!(matches!(
            store
                .find_settlement(&PaymentSessionId::new("cs_1"), &PaymentIntentId::new("x"))
                .unwrap(),
            Some(PriorSettlement::Committed(_))
        ));
    }

    #[test]
    fn stale_version_conflicts_without_writing() {
        let store = MemoryStore::new();
        let app = AppId::new("todo");
        let current = store
            .insert_app_if_absent(AppRevenueRecord::new(app.clone()))
            .unwrap();
        store
            .commit(&app, 1, share_write(&current.value, "alice", 3, "cs_1"))
            .unwrap();

        let result = store
            .commit(&app, 1, share_write(&current.value, "bob", 5, "cs_2"))
            .unwrap();
        assert_eq!(result, CommitResult::Conflict { expected: 1, actual: 2 });
        assert_eq!(store.load_app(&app).unwrap().unwrap().value.total_shares_sold, 3);
        assert_eq!(store.shares_for_user(&UserId::new("bob")).unwrap().len(), 0);
    }

    #[test]
    fn reused_payment_ids_are_duplicates() {
        let store = MemoryStore::new();
        let app = AppId::new("todo");
        let current = store
            .insert_app_if_absent(AppRevenueRecord::new(app.clone()))
            .unwrap();
        store
            .commit(&app, 1, share_write(&current.value, "alice", 3, "cs_1"))
            .unwrap();

        let latest = store.load_app(&app).unwrap().unwrap();
        let result = store
            .commit(&app, latest.version, share_write(&latest.value, "alice", 3, "cs_1"))
            .unwrap();
        assert!(matches!(
            result,
            CommitResult::Duplicate(PriorSettlement::Committed(_))
        ));
        assert_eq!(store.transactions_for_user(&UserId::new("alice")).unwrap().len(), 1);
    }

    #[test]
    fn quarantine_leaves_version_and_is_indexed() {
        let store = MemoryStore::new();
        let app = AppId::new("todo");
        store
            .insert_app_if_absent(AppRevenueRecord::new(app.clone()))
            .unwrap();

        let result = store.commit(&app, 1, quarantine_write("todo", "cs_9")).unwrap();
        assert_eq!(result, CommitResult::Applied { version: 1 });
        assert_eq!(store.quarantine_for_app(&app).unwrap().len(), 1);
        assert_eq!(store.quarantine_for_user(&UserId::new("mallory")).unwrap().len(), 1);
        assert_eq!(store.unresolved_quarantine().unwrap().len(), 1);

        let again = store.commit(&app, 1, quarantine_write("todo", "cs_9")).unwrap();
        assert!(matches!(
            again,
            CommitResult::Duplicate(PriorSettlement::Quarantined(_))
        ));
        assert_eq!(store.quarantine_for_app(&app).unwrap().len(), 1);
    }

    #[test]
    fn commit_against_missing_app_is_internal_error() {
        let store = MemoryStore::new();
        let record = AppRevenueRecord::new(AppId::new("ghost"));
        let err = store
            .commit(&AppId::new("ghost"), 1, LedgerWrite::Amend(record))
            .unwrap_err();
        assert!(matches!(err, RevshareError::Internal(_)));
    }

    #[test]
    fn apps_version_independently() {
        let store = MemoryStore::new();
        let a = store
            .insert_app_if_absent(AppRevenueRecord::new(AppId::new("a")))
            .unwrap();
        let b = store
            .insert_app_if_absent(AppRevenueRecord::new(AppId::new("b")))
            .unwrap();

        store
            .commit(&AppId::new("a"), 1, share_write(&a.value, "alice", 1, "cs_a"))
            .unwrap();
        let result = store
            .commit(&AppId::new("b"), 1, share_write(&b.value, "bob", 1, "cs_b"))
            .unwrap();
        assert_eq!(result, CommitResult::Applied { version: 2 });
    }
}
