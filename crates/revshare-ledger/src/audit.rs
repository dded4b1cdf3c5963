//! Read access to the transaction log and quarantine queue.
//!
//! Both collections are append-only; settlement is the only writer. Marking
//! quarantine records resolved belongs to an external reconciliation
//! process and is not offered here.

use std::sync::Arc;

use revshare_types::{AppId, QuarantineRecord, Result, TransactionLogEntry, UserId};

use crate::store::LedgerStore;

/// Query view over the audit trail.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn LedgerStore>,
}

impl AuditTrail {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Committed settlements for an app, oldest first.
    pub fn transactions_for_app(&self, app_id: &AppId) -> Result<Vec<TransactionLogEntry>> {
        let mut entries = self.store.transactions_for_app(app_id)?;
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    /// Committed settlements paid by a user, oldest first.
    pub fn transactions_for_user(&self, user_id: &UserId) -> Result<Vec<TransactionLogEntry>> {
        let mut entries = self.store.transactions_for_user(user_id)?;
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    pub fn quarantine_for_app(&self, app_id: &AppId) -> Result<Vec<QuarantineRecord>> {
        self.store.quarantine_for_app(app_id)
    }

    pub fn quarantine_for_user(&self, user_id: &UserId) -> Result<Vec<QuarantineRecord>> {
        self.store.quarantine_for_user(user_id)
    }

    /// Quarantined settlements still awaiting manual reconciliation.
    pub fn unresolved_quarantine(&self) -> Result<Vec<QuarantineRecord>> {
        self.store.unresolved_quarantine()
    }

    /// Sum of shares across committed settlements for an app. Matches the
    /// app record's `total_shares_sold` whenever the ledger is consistent.
    pub fn committed_shares(&self, app_id: &AppId) -> Result<u32> {
        Ok(self
            .store
            .transactions_for_app(app_id)?
            .iter()
            .map(|entry| entry.shares_count)
            .sum())
    }
}
