//! Purchase intent validation: advisory quotes.
//!
//! The validator reads a point-in-time ledger snapshot and prices the
//! request against it. Payment completes asynchronously and out of our
//! control, so the quote can be stale by the time money arrives;
//! settlement always re-validates against the live ledger.
//!
//! ## Checks, in order
//!
//! 1. App already fully owned → `FullyOwned`
//! 2. Full buyout after any share sold → `AlreadyPartial`
//! 3. Share purchase priced by the ladder → `NoAvailability` when sold out

use revshare_pricing::{PriceLine, PricingEngine};
use revshare_types::{AppId, CapacityError, PurchaseType, Result};
use serde::{Deserialize, Serialize};

use crate::ShareLedger;

/// Advisory price for a purchase intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseQuote {
    pub app_id: AppId,
    pub purchase_type: PurchaseType,
    pub price_cents: u64,
    pub shares_count: u32,
    /// Line item text for the checkout page.
    pub description: String,
    /// Per-share prices; empty for a full buyout.
    pub breakdown: Vec<PriceLine>,
    /// Shares sold in the snapshot the quote was computed from.
    pub shares_sold_at_quote: u32,
}

/// Read-only quote computation over the ledger and the pricing ladder.
#[derive(Clone)]
pub struct PurchaseIntentValidator {
    ledger: ShareLedger,
    pricing: PricingEngine,
}

impl PurchaseIntentValidator {
    #[must_use]
    pub fn new(ledger: ShareLedger, pricing: PricingEngine) -> Self {
        Self { ledger, pricing }
    }

    #[must_use]
    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    #[must_use]
    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    /// Quote a purchase, describing it by app id.
    pub fn quote(
        &self,
        app_id: &AppId,
        purchase_type: PurchaseType,
        quantity: u32,
    ) -> Result<PurchaseQuote> {
        self.quote_named(app_id, None, purchase_type, quantity)
    }

    /// Quote a purchase, describing it by `app_name` when given.
    ///
    /// A share quantity of zero is treated as one.
    ///
    /// # Errors
    /// Returns a [`CapacityError`] when the purchase cannot be admitted
    /// against the current snapshot.
    pub fn quote_named(
        &self,
        app_id: &AppId,
        app_name: Option<&str>,
        purchase_type: PurchaseType,
        quantity: u32,
    ) -> Result<PurchaseQuote> {
        let record = self.ledger.get_or_init(app_id)?;
        let name = app_name.filter(|n| !n.trim().is_empty()).unwrap_or(app_id.as_str());
        let shares_sold = record.total_shares_sold;

        if record.is_fully_owned {
            return Err(CapacityError::FullyOwned(app_id.clone()).into());
        }

        match purchase_type {
            PurchaseType::Full => {
                if shares_sold > 0 {
                    return Err(CapacityError::AlreadyPartial {
                        app_id: app_id.clone(),
                        shares_sold,
                    }
                    .into());
                }
                let max = self.pricing.max_shares();
                Ok(PurchaseQuote {
                    app_id: app_id.clone(),
                    purchase_type,
                    price_cents: self.pricing.full_buyout_price_cents(),
                    shares_count: max,
                    description: format!("Full purchase of \"{name}\" (all {max} revenue shares)"),
                    breakdown: Vec::new(),
                    shares_sold_at_quote: shares_sold,
                })
            }
            PurchaseType::Share => {
                let quote = self.pricing.quote_shares(shares_sold, quantity.max(1))?;
                let first = shares_sold + 1;
                let description = if quote.shares_count == 1 {
                    format!("1% revenue share of \"{name}\" (Share #{first})")
                } else {
                    format!(
                        "{count}% revenue share of \"{name}\" (Shares #{first}-{last})",
                        count = quote.shares_count,
                        last = shares_sold + quote.shares_count,
                    )
                };
                Ok(PurchaseQuote {
                    app_id: app_id.clone(),
                    purchase_type,
                    price_cents: quote.total_price_cents,
                    shares_count: quote.shares_count,
                    description,
                    breakdown: quote.breakdown,
                    shares_sold_at_quote: shares_sold,
                })
            }
        }
    }
}
