//! Share conservation invariant checker.
//!
//! Invariants that must hold for every app after every settlement:
//! ```text
//! total_shares_sold <= share_cap
//! Σ(committed shares_count) == total_shares_sold
//! Σ(share_record.shares_owned) == total_shares_sold
//! ```
//!
//! If either breaks, the ledger and its audit trail disagree and something
//! wrote outside the settlement path (or wrote partially).

use revshare_ledger::{AuditTrail, ShareLedger};
use revshare_types::{AppId, Result, RevshareError, constants};

/// Per-app totals gathered while checking conservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareTotals {
    pub ledger_total: u32,
    pub logged_total: u32,
    pub recorded_total: u32,
}

/// Verifies the ledger counter against the audit trail.
#[derive(Clone)]
pub struct ShareConservation {
    ledger: ShareLedger,
    audit: AuditTrail,
    share_cap: u32,
}

impl ShareConservation {
    /// Checker against the standard 49-share cap.
    #[must_use]
    pub fn new(ledger: ShareLedger) -> Self {
        let audit = AuditTrail::new(ledger.store().clone());
        Self {
            ledger,
            audit,
            share_cap: constants::MAX_SHARES,
        }
    }

    /// Override the share cap (must match the pricing ladder in use).
    #[must_use]
    pub fn with_share_cap(mut self, share_cap: u32) -> Self {
        self.share_cap = share_cap;
        self
    }

    /// Gather the three totals for an app without judging them.
    pub fn totals(&self, app_id: &AppId) -> Result<ShareTotals> {
        let record = self.ledger.get_or_init(app_id)?;
        let recorded_total = self
            .ledger
            .store()
            .shares_for_app(app_id)?
            .iter()
            .map(|share| share.shares_owned)
            .sum();
        Ok(ShareTotals {
            ledger_total: record.total_shares_sold,
            logged_total: self.audit.committed_shares(app_id)?,
            recorded_total,
        })
    }

    /// # Errors
    /// Returns [`RevshareError::InvariantViolation`] if the cap is exceeded
    /// or the totals disagree.
    pub fn verify(&self, app_id: &AppId) -> Result<ShareTotals> {
        let totals = self.totals(app_id)?;
        if totals.ledger_total > self.share_cap {
            return Err(RevshareError::InvariantViolation {
                reason: format!(
                    "app {app_id}: {} shares sold exceeds cap {}",
                    totals.ledger_total, self.share_cap
                ),
            });
        }
        if totals.logged_total != totals.ledger_total || totals.recorded_total != totals.ledger_total
        {
            return Err(RevshareError::InvariantViolation {
                reason: format!(
                    "app {app_id}: ledger total {} != logged {} / recorded {}",
                    totals.ledger_total, totals.logged_total, totals.recorded_total
                ),
            });
        }
        Ok(totals)
    }
}
