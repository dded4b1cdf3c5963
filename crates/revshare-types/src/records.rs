//! Persisted ledger records.
//!
//! [`AppRevenueRecord`] is the only mutable record; everything else is
//! written once by settlement and never changed afterwards (apart from
//! the `resolved` flag on quarantine records, which belongs to external
//! reconciliation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AppId, PaymentIntentId, PaymentSessionId, QuarantineId, ShareRecordId, TransactionId, UserId,
};

/// What the buyer is paying for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseType {
    /// One or more individual revenue shares.
    Share,
    /// Outright purchase of the whole app.
    Full,
}

impl PurchaseType {
    /// Parse the wire form (`"share"` / `"full"`). Anything that isn't
    /// `"full"` is treated as a share purchase.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("full") {
            Self::Full
        } else {
            Self::Share
        }
    }
}

impl std::fmt::Display for PurchaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Share => write!(f, "share"),
            Self::Full => write!(f, "full"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppRevenueRecord
// ---------------------------------------------------------------------------

/// Per-app share counter and ownership state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRevenueRecord {
    pub app_id: AppId,
    /// Shares sold so far. Never exceeds the pricing ladder's share cap.
    pub total_shares_sold: u32,
    /// Lifetime revenue of the app itself (not share sales).
    pub total_revenue_cents: u64,
    pub is_fully_owned: bool,
    /// Set externally once revenue sharing kicks in.
    pub revenue_share_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_purchase_at: Option<DateTime<Utc>>,
}

impl AppRevenueRecord {
    /// Zero-state record for an app nobody has bought into yet.
    #[must_use]
    pub fn new(app_id: AppId) -> Self {
        let now = Utc::now();
        Self {
            app_id,
            total_shares_sold: 0,
            total_revenue_cents: 0,
            is_fully_owned: false,
            revenue_share_active: false,
            created_at: now,
            updated_at: now,
            last_purchase_at: None,
        }
    }

    /// Shares still for sale under `share_cap`. Zero once the app is fully
    /// owned.
    #[must_use]
    pub fn shares_remaining(&self, share_cap: u32) -> u32 {
        if self.is_fully_owned {
            0
        } else {
            share_cap.saturating_sub(self.total_shares_sold)
        }
    }

    /// Whether a full buyout can still be offered.
    #[must_use]
    pub fn full_buyout_available(&self) -> bool {
        self.total_shares_sold == 0 && !self.is_fully_owned
    }
}

/// A record paired with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Starts at 1 when the record is created; bumped on every write.
    pub version: u64,
    pub value: T,
}

impl<T> Versioned<T> {
    #[must_use]
    pub fn initial(value: T) -> Self {
        Self { version: 1, value }
    }
}

// ---------------------------------------------------------------------------
// ShareRecord
// ---------------------------------------------------------------------------

/// Proof of ownership created by exactly one successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: ShareRecordId,
    pub app_id: AppId,
    /// Display name captured at checkout; the app id when none was given.
    pub app_name: String,
    pub user_id: UserId,
    pub shares_owned: u32,
    pub total_paid_cents: u64,
    pub purchase_type: PurchaseType,
    pub payment_session_id: PaymentSessionId,
    pub payment_intent_id: PaymentIntentId,
    pub purchased_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// TransactionLogEntry
// ---------------------------------------------------------------------------

/// Audit classification of a committed settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SharePurchase,
    FullPurchase,
}

impl From<PurchaseType> for TransactionKind {
    fn from(purchase_type: PurchaseType) -> Self {
        match purchase_type {
            PurchaseType::Share => Self::SharePurchase,
            PurchaseType::Full => Self::FullPurchase,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharePurchase => write!(f, "share_purchase"),
            Self::FullPurchase => write!(f, "full_purchase"),
        }
    }
}

/// Append-only audit entry for every committed settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub app_id: AppId,
    pub user_id: UserId,
    pub shares_count: u32,
    pub amount_cents: u64,
    pub currency: String,
    pub payment_session_id: PaymentSessionId,
    pub payment_intent_id: PaymentIntentId,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// QuarantineRecord
// ---------------------------------------------------------------------------

/// Why a paid settlement was parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineKind {
    /// Admitting the purchase would exceed the share cap.
    Oversold,
}

impl std::fmt::Display for QuarantineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oversold => write!(f, "oversold"),
        }
    }
}

/// A confirmed, already-paid settlement the ledger refused to admit.
/// Needs manual reconciliation (typically a refund).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub id: QuarantineId,
    pub kind: QuarantineKind,
    pub app_id: AppId,
    pub user_id: UserId,
    pub payment_session_id: PaymentSessionId,
    pub payment_intent_id: PaymentIntentId,
    pub attempted_shares: u32,
    pub current_shares_sold: u32,
    pub amount_paid_cents: u64,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}
