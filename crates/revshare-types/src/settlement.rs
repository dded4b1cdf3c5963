//! Settlement input and outcome types.
//!
//! A [`PaymentConfirmation`] is what the payment processor tells us after
//! money has been captured. Settlement turns it into a
//! [`SettlementOutcome`]: **Received → Validating → {Committed |
//! Quarantined | Rejected}**.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    AppId, PaymentIntentId, PaymentSessionId, PurchaseType, QuarantineId, ShareRecordId, UserId,
    constants,
};

/// A confirmed (already paid) purchase, as delivered by the payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub app_id: AppId,
    /// Display name carried through checkout metadata, if any.
    #[serde(default)]
    pub app_name: Option<String>,
    pub user_id: UserId,
    pub purchase_type: PurchaseType,
    pub shares_count: u32,
    pub amount_paid_cents: u64,
    pub currency: String,
    pub payment_session_id: PaymentSessionId,
    pub payment_intent_id: PaymentIntentId,
}

impl PaymentConfirmation {
    /// The app's display name, falling back to its id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.app_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.app_id.as_str())
    }

    /// Names of required fields that are missing or unusable.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.app_id.is_blank() {
            missing.push("app_id");
        }
        if self.user_id.is_blank() {
            missing.push("user_id");
        }
        if self.payment_session_id.is_blank() {
            missing.push("payment_session_id");
        }
        if self.payment_intent_id.is_blank() {
            missing.push("payment_intent_id");
        }
        if self.shares_count == 0 {
            missing.push("shares_count");
        }
        missing
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl PaymentConfirmation {
    /// A share purchase with a fresh random session and intent id.
    pub fn dummy_shares(app_id: &str, user_id: &str, shares_count: u32) -> Self {
        let nonce = rand::random::<u64>();
        Self::dummy_with_session(app_id, user_id, shares_count, &format!("cs_test_{nonce:016x}"))
    }

    /// A share purchase with a caller-chosen session id (for redelivery tests).
    pub fn dummy_with_session(
        app_id: &str,
        user_id: &str,
        shares_count: u32,
        session_id: &str,
    ) -> Self {
        Self {
            app_id: AppId::new(app_id),
            app_name: None,
            user_id: UserId::new(user_id),
            purchase_type: PurchaseType::Share,
            shares_count,
            amount_paid_cents: u64::from(shares_count) * 1_000,
            currency: constants::DEFAULT_CURRENCY.to_string(),
            payment_session_id: PaymentSessionId::new(session_id),
            payment_intent_id: PaymentIntentId::new(format!("pi_{session_id}")),
        }
    }

    /// A full buyout with a fresh random session id.
    pub fn dummy_full(app_id: &str, user_id: &str) -> Self {
        let mut confirmation = Self::dummy_shares(app_id, user_id, constants::MAX_SHARES);
        confirmation.purchase_type = PurchaseType::Full;
        confirmation.amount_paid_cents = constants::FULL_APP_PRICE_CENTS;
        confirmation
    }
}

/// Terminal state of one settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementState {
    /// Ledger, share record and transaction log written together.
    Committed,
    /// Paid but not admitted; parked for manual reconciliation.
    Quarantined,
    /// Malformed confirmation; nothing written, not worth retrying.
    Rejected,
}

impl fmt::Display for SettlementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed => write!(f, "COMMITTED"),
            Self::Quarantined => write!(f, "QUARANTINED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// What was already recorded for a payment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorSettlement {
    Committed(ShareRecordId),
    Quarantined(QuarantineId),
}

/// Result of settling one [`PaymentConfirmation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub state: SettlementState,
    pub share_record_id: Option<ShareRecordId>,
    pub quarantine_id: Option<QuarantineId>,
    /// True when this delivery matched an earlier one and changed nothing.
    pub replayed: bool,
    /// Commit attempts used (0 for rejections and early replays).
    pub attempts: u32,
    /// Why the confirmation was rejected, if it was.
    pub rejection_reason: Option<String>,
}

impl SettlementOutcome {
    #[must_use]
    pub fn committed(share_record_id: ShareRecordId, attempts: u32) -> Self {
        Self {
            state: SettlementState::Committed,
            share_record_id: Some(share_record_id),
            quarantine_id: None,
            replayed: false,
            attempts,
            rejection_reason: None,
        }
    }

    #[must_use]
    pub fn quarantined(quarantine_id: QuarantineId, attempts: u32) -> Self {
        Self {
            state: SettlementState::Quarantined,
            share_record_id: None,
            quarantine_id: Some(quarantine_id),
            replayed: false,
            attempts,
            rejection_reason: None,
        }
    }

    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            state: SettlementState::Rejected,
            share_record_id: None,
            quarantine_id: None,
            replayed: false,
            attempts: 0,
            rejection_reason: Some(reason.into()),
        }
    }

    /// Outcome for a redelivery of something already settled.
    #[must_use]
    pub fn replay(prior: PriorSettlement, attempts: u32) -> Self {
        let mut outcome = match prior {
            PriorSettlement::Committed(id) => Self::committed(id, attempts),
            PriorSettlement::Quarantined(id) => Self::quarantined(id, attempts),
        };
        outcome.replayed = true;
        outcome
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == SettlementState::Committed
    }

    #[must_use]
    pub fn is_quarantined(&self) -> bool {
        self.state == SettlementState::Quarantined
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.state == SettlementState::Rejected
    }
}
