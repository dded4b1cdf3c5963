//! The revenue-share service facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use revshare_ledger::{
    AuditTrail, LedgerStore, PurchaseIntentValidator, PurchaseQuote, ShareInfo, ShareLedger,
};
use revshare_pricing::PricingEngine;
use revshare_settlement::SettlementProcessor;
use revshare_types::{
    AppId, AuthError, PaymentConfirmation, PurchaseType, Result, RevshareError, ServiceConfig,
    SettlementOutcome, ShareRecord, UserId, constants,
};

use crate::external::{
    CheckoutIntent, CheckoutProvider, CheckoutRequest, CheckoutSession, IdentityVerifier,
    PaymentEventVerifier, VerifiedIdentity, metadata_keys,
};

/// The external capabilities a service instance talks to.
#[derive(Clone)]
pub struct Capabilities {
    pub identity: Arc<dyn IdentityVerifier>,
    pub payments: Arc<dyn PaymentEventVerifier>,
    pub checkout: Arc<dyn CheckoutProvider>,
}

/// How a payment event was handled. Every variant is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAck {
    /// Not a completed checkout; nothing to do.
    Ignored { event_type: String },
    /// Settled (committed, quarantined, or rejected).
    Settled(SettlementOutcome),
}

/// Extract the token from an `Authorization: Bearer …` header value.
///
/// # Errors
/// Returns [`AuthError::MissingCredential`] if the header is absent, uses
/// another scheme, or carries an empty token.
pub fn bearer_token(header: Option<&str>) -> std::result::Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredential)
}

/// Revenue-share operations over one ledger store.
#[derive(Clone)]
pub struct RevenueShareService {
    config: ServiceConfig,
    ledger: ShareLedger,
    validator: PurchaseIntentValidator,
    processor: SettlementProcessor,
    audit: AuditTrail,
    capabilities: Capabilities,
}

impl RevenueShareService {
    /// # Errors
    /// Returns [`RevshareError::Configuration`] if the settlement retry
    /// policy is invalid.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn LedgerStore>,
        pricing: PricingEngine,
        capabilities: Capabilities,
    ) -> Result<Self> {
        let ledger = ShareLedger::new(store.clone());
        let share_cap = pricing.max_shares();
        let processor = SettlementProcessor::new(ledger.clone(), config.settlement.clone())?
            .with_share_cap(share_cap);
        let validator = PurchaseIntentValidator::new(ledger.clone(), pricing);
        tracing::info!(
            version = constants::VERSION,
            share_cap,
            max_attempts = config.settlement.max_attempts,
            "Revenue-share service ready"
        );
        Ok(Self {
            config,
            ledger,
            validator,
            processor,
            audit: AuditTrail::new(store),
            capabilities,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The ledger, for the administrative amend path.
    #[must_use]
    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    /// The audit trail, for reconciliation of quarantined payments.
    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn get_share_info(&self, app_id: &AppId) -> Result<ShareInfo> {
        self.validator.share_info(app_id)
    }

    pub fn quote(
        &self,
        app_id: &AppId,
        purchase_type: PurchaseType,
        quantity: u32,
    ) -> Result<PurchaseQuote> {
        self.validator.quote(app_id, purchase_type, quantity)
    }

    /// Idempotent per payment session / intent id.
    pub fn settle(&self, confirmation: &PaymentConfirmation) -> Result<SettlementOutcome> {
        self.processor.settle(confirmation)
    }

    pub fn list_user_shares(&self, user_id: &UserId) -> Result<Vec<ShareRecord>> {
        self.ledger.store().shares_for_user(user_id)
    }

    /// Shares owned by the caller identified by the bearer header.
    pub fn list_shares_for_bearer(&self, authorization: Option<&str>) -> Result<Vec<ShareRecord>> {
        let identity = self.authenticate(authorization)?;
        self.list_user_shares(&identity.uid)
    }

    /// Quote the purchase for the authenticated caller and open a hosted
    /// checkout session for it.
    ///
    /// The quote is advisory: capacity is checked again when the payment
    /// event arrives.
    ///
    /// # Errors
    /// - `Auth` for a missing or rejected bearer token
    /// - `InvalidRequest` for a blank app id
    /// - `Capacity` if the purchase cannot be admitted right now
    /// - `Checkout` if the provider refuses
    pub fn create_checkout(
        &self,
        authorization: Option<&str>,
        intent: &CheckoutIntent,
        origin: Option<&str>,
    ) -> Result<CheckoutSession> {
        let identity = self.authenticate(authorization)?;
        if intent.app_id.is_blank() {
            return Err(RevshareError::InvalidRequest {
                reason: "Missing appId".to_string(),
            });
        }

        let app_name = intent.app_name.as_deref();
        let quote = self.validator.quote_named(
            &intent.app_id,
            app_name,
            intent.purchase_type,
            intent.quantity,
        )?;

        let origin = origin
            .filter(|o| !o.trim().is_empty())
            .unwrap_or(self.config.default_origin.as_str())
            .trim_end_matches('/');
        let app_id = &intent.app_id;

        let metadata = BTreeMap::from([
            (metadata_keys::APP_ID.to_string(), app_id.to_string()),
            (
                metadata_keys::APP_NAME.to_string(),
                app_name.unwrap_or(app_id.as_str()).to_string(),
            ),
            (metadata_keys::USER_ID.to_string(), identity.uid.to_string()),
            (
                metadata_keys::USER_EMAIL.to_string(),
                identity.email.clone().unwrap_or_default(),
            ),
            (
                metadata_keys::PURCHASE_TYPE.to_string(),
                quote.purchase_type.to_string(),
            ),
            (
                metadata_keys::SHARES_COUNT.to_string(),
                quote.shares_count.to_string(),
            ),
        ]);

        let request = CheckoutRequest {
            description: quote.description.clone(),
            amount_cents: quote.price_cents,
            currency: self.config.currency.clone(),
            metadata,
            success_url: format!("{origin}/apps.html?purchase=success&app={app_id}"),
            cancel_url: format!("{origin}/apps.html?purchase=cancelled&app={app_id}"),
            customer_email: identity.email.clone(),
        };

        let session = self.capabilities.checkout.create_session(&request)?;
        tracing::info!(
            app_id = %app_id,
            user = %identity.uid,
            purchase_type = %quote.purchase_type,
            shares = quote.shares_count,
            amount_cents = quote.price_cents,
            checkout_session = %session.id,
            "Checkout session created"
        );
        Ok(session)
    }

    /// Verify and settle a payment-processor event.
    ///
    /// Only `checkout.session.completed` is acted on. Committed,
    /// quarantined and rejected settlements are all acknowledged; an `Err`
    /// means the event should be redelivered (contention, persistence) or
    /// was never trusted (signature, configuration).
    pub fn handle_payment_event(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck> {
        let secret = self.config.require_webhook_secret()?;
        let signature = signature.filter(|s| !s.is_empty()).ok_or_else(|| {
            RevshareError::PaymentSignature {
                reason: "missing signature header".to_string(),
            }
        })?;

        let event = self
            .capabilities
            .payments
            .verify(raw_body, signature, secret)
            .inspect_err(|err| {
                tracing::warn!(error = %err, "Payment event failed verification");
            })?;

        if event.event_type != constants::CHECKOUT_COMPLETED_EVENT {
            tracing::debug!(event_type = %event.event_type, "Payment event ignored");
            return Ok(WebhookAck::Ignored {
                event_type: event.event_type,
            });
        }

        let session = event.session.ok_or_else(|| RevshareError::InvalidEvent {
            reason: "completed checkout event carries no session".to_string(),
        })?;
        let confirmation = session.to_confirmation(&self.config.currency);
        let outcome = self.processor.settle(&confirmation)?;
        tracing::info!(
            app_id = %confirmation.app_id,
            session = %confirmation.payment_session_id,
            state = %outcome.state,
            replayed = outcome.replayed,
            "Payment event handled"
        );
        Ok(WebhookAck::Settled(outcome))
    }

    fn authenticate(&self, authorization: Option<&str>) -> Result<VerifiedIdentity> {
        let token = bearer_token(authorization)?;
        self.capabilities.identity.verify(token)
    }
}
