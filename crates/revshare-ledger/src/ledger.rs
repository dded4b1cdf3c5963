//! The share ledger: per-app records over an injected [`LedgerStore`].
//!
//! Reads lazily create the zero-state record for apps nobody has looked at
//! yet. Writes go through [`ShareLedger::conditional_update`], a single
//! optimistic attempt: read the versioned record, compute the write purely,
//! commit only if the version is unchanged.

use std::sync::Arc;

use chrono::Utc;
use revshare_types::{
    AppId, AppRevenueRecord, PriorSettlement, Result, RevshareError, Versioned,
};

use crate::store::{CommitResult, LedgerStore, LedgerWrite};

/// Attempts used by the administrative amend path before reporting contention.
const AMEND_MAX_ATTEMPTS: u32 = 8;

/// Result of one [`ShareLedger::conditional_update`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub result: CommitResult,
    /// Version the transition was computed against.
    pub observed_version: u64,
    /// Settlement the attempted write would record (set even on conflict).
    pub written: Option<PriorSettlement>,
}

/// Per-app ledger of share sales.
#[derive(Clone)]
pub struct ShareLedger {
    store: Arc<dyn LedgerStore>,
}

impl ShareLedger {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for audit queries and lookups.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Current record for `app_id`, creating the zero-state record on first
    /// access. Concurrent first readers all observe the same record.
    pub fn get_or_init(&self, app_id: &AppId) -> Result<AppRevenueRecord> {
        self.snapshot(app_id).map(|versioned| versioned.value)
    }

    /// Versioned read snapshot, lazily initialised. May be stale by the time
    /// the caller acts on it.
    pub fn snapshot(&self, app_id: &AppId) -> Result<Versioned<AppRevenueRecord>> {
        if app_id.is_blank() {
            return Err(RevshareError::InvalidRequest {
                reason: "app id is required".to_string(),
            });
        }
        if let Some(existing) = self.store.load_app(app_id)? {
            return Ok(existing);
        }
        let stored = self
            .store
            .insert_app_if_absent(AppRevenueRecord::new(app_id.clone()))?;
        tracing::debug!(app_id = %app_id, version = stored.version, "App revenue record initialised");
        Ok(stored)
    }

    /// One optimistic read-transition-commit attempt.
    ///
    /// `transition` must be pure: it may run again on a later attempt with a
    /// newer snapshot. A [`CommitResult::Conflict`] means nothing was written.
    pub fn conditional_update<F>(&self, app_id: &AppId, transition: F) -> Result<UpdateOutcome>
    where
        F: FnOnce(&AppRevenueRecord) -> Result<LedgerWrite>,
    {
        let current = self.snapshot(app_id)?;
        let write = transition(&current.value)?;
        let written = write.settlement_ref();
        let result = self.store.commit(app_id, current.version, write)?;
        if let CommitResult::Conflict { expected, actual } = result {
            tracing::debug!(app_id = %app_id, expected, actual, "Ledger version conflict");
        }
        Ok(UpdateOutcome {
            result,
            observed_version: current.version,
            written,
        })
    }

    /// Set the externally-controlled revenue-share flag.
    pub fn set_revenue_share_active(&self, app_id: &AppId, active: bool) -> Result<AppRevenueRecord> {
        self.amend(app_id, |record| record.revenue_share_active = active)
    }

    /// Add to the app's lifetime revenue (the app's own income, not share sales).
    pub fn record_app_revenue(&self, app_id: &AppId, revenue_cents: u64) -> Result<AppRevenueRecord> {
        self.amend(app_id, |record| {
            record.total_revenue_cents = record.total_revenue_cents.saturating_add(revenue_cents);
        })
    }

    fn amend<F>(&self, app_id: &AppId, change: F) -> Result<AppRevenueRecord>
    where
        F: Fn(&mut AppRevenueRecord),
    {
        for _ in 0..AMEND_MAX_ATTEMPTS {
            let mut amended = None;
            let outcome = self.conditional_update(app_id, |record| {
                let mut next = record.clone();
                change(&mut next);
                next.updated_at = Utc::now();
                amended = Some(next.clone());
                Ok(LedgerWrite::Amend(next))
            })?;
            match (outcome.result, amended) {
                (CommitResult::Applied { .. }, Some(record)) => return Ok(record),
                (CommitResult::Conflict { .. }, _) => std::thread::yield_now(),
                (other, _) => {
                    return Err(RevshareError::Internal(format!(
                        "unexpected amend result for {app_id}: {other:?}"
                    )));
                }
            }
        }
        Err(RevshareError::Contention {
            app_id: app_id.clone(),
            attempts: AMEND_MAX_ATTEMPTS,
        })
    }
}
