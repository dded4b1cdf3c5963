//! Capabilities the service consumes from the outside world.
//!
//! Identity, payment-event signature checking and hosted checkout all live
//! behind traits so the core never talks to a vendor SDK directly. Each
//! trait is object-safe and `Send + Sync`; the service holds them as
//! `Arc<dyn …>`.

use std::collections::BTreeMap;

use revshare_types::{
    AppId, PaymentConfirmation, PaymentIntentId, PaymentSessionId, PurchaseType, Result, UserId,
};
use serde::{Deserialize, Serialize};

/// Metadata keys attached to a checkout session and read back from the
/// completed-checkout event.
pub mod metadata_keys {
    pub const APP_ID: &str = "appId";
    pub const APP_NAME: &str = "appName";
    pub const USER_ID: &str = "userId";
    pub const USER_EMAIL: &str = "userEmail";
    pub const PURCHASE_TYPE: &str = "purchaseType";
    pub const SHARES_COUNT: &str = "sharesCount";
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A caller whose bearer token checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: UserId,
    pub email: Option<String>,
}

/// Verifies bearer tokens.
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    /// Returns [`revshare_types::AuthError::InvalidToken`] (as a
    /// `RevshareError::Auth`) when the token is not accepted.
    fn verify(&self, token: &str) -> Result<VerifiedIdentity>;
}

// ---------------------------------------------------------------------------
// Payment events
// ---------------------------------------------------------------------------

/// The checkout session carried by a completed-checkout event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedCheckout {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_total: Option<u64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CompletedCheckout {
    /// Build the settlement input from the session and its metadata.
    ///
    /// Missing identifiers come through blank so that settlement rejects
    /// them. A missing share count means one share; an unparseable one
    /// means zero, which settlement also rejects.
    #[must_use]
    pub fn to_confirmation(&self, default_currency: &str) -> PaymentConfirmation {
        let meta = |key: &str| self.metadata.get(key).map(String::as_str).unwrap_or_default();

        let shares_count = match self.metadata.get(metadata_keys::SHARES_COUNT) {
            None => 1,
            Some(raw) => raw.trim().parse().unwrap_or(0),
        };

        PaymentConfirmation {
            app_id: AppId::new(meta(metadata_keys::APP_ID)),
            app_name: self
                .metadata
                .get(metadata_keys::APP_NAME)
                .filter(|name| !name.trim().is_empty())
                .cloned(),
            user_id: UserId::new(meta(metadata_keys::USER_ID)),
            purchase_type: PurchaseType::parse_lenient(meta(metadata_keys::PURCHASE_TYPE)),
            shares_count,
            amount_paid_cents: self.amount_total.unwrap_or(0),
            currency: self
                .currency
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| default_currency.to_string()),
            payment_session_id: PaymentSessionId::new(self.id.clone()),
            payment_intent_id: PaymentIntentId::new(self.payment_intent.clone().unwrap_or_default()),
        }
    }
}

/// A payment-processor event whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub session: Option<CompletedCheckout>,
}

impl PaymentEvent {
    /// Decode an event body. For verifiers whose wire format matches.
    ///
    /// # Errors
    /// Returns [`revshare_types::RevshareError::Serialization`] on malformed JSON.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Verifies payment-event signatures and decodes the event.
pub trait PaymentEventVerifier: Send + Sync {
    /// # Errors
    /// Returns `RevshareError::PaymentSignature` when the signature does
    /// not match `secret`.
    fn verify(&self, raw_body: &[u8], signature: &str, secret: &str) -> Result<PaymentEvent>;
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// What the caller wants to buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutIntent {
    pub app_id: AppId,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default = "default_purchase_type")]
    pub purchase_type: PurchaseType,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_purchase_type() -> PurchaseType {
    PurchaseType::Share
}

fn default_quantity() -> u32 {
    1
}

/// A hosted checkout session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub description: String,
    pub amount_cents: u64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Creates hosted checkout sessions.
pub trait CheckoutProvider: Send + Sync {
    /// # Errors
    /// Returns `RevshareError::Checkout` when the provider refuses.
    fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
}
