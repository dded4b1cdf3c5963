//! Public share availability summary for one app.

use std::collections::HashSet;

use revshare_pricing::{TierInfo, TierSummary};
use revshare_types::{AppId, Result};
use serde::{Deserialize, Serialize};

use crate::PurchaseIntentValidator;

/// Availability and pricing snapshot. Exposes how many people hold shares,
/// never who they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub app_id: AppId,
    pub shares_sold: u32,
    pub shares_remaining: u32,
    pub max_shares: u32,
    /// Price of the next share; `None` when sold out.
    pub current_price_cents: Option<u64>,
    pub tier_info: Option<TierInfo>,
    pub pricing_tiers: Vec<TierSummary>,
    pub full_app_available: bool,
    pub full_app_price_cents: u64,
    pub is_fully_owned: bool,
    pub revenue_share_active: bool,
    pub total_revenue_cents: u64,
    pub holder_count: usize,
}

impl PurchaseIntentValidator {
    /// Availability summary. Creates the app's ledger record on first access.
    pub fn share_info(&self, app_id: &AppId) -> Result<ShareInfo> {
        let record = self.ledger().get_or_init(app_id)?;
        let pricing = self.pricing();
        let shares_sold = record.total_shares_sold;

        let holder_count = self
            .ledger()
            .store()
            .shares_for_app(app_id)?
            .into_iter()
            .map(|share| share.user_id)
            .collect::<HashSet<_>>()
            .len();

        let (current_price_cents, tier_info) = if record.is_fully_owned {
            (None, None)
        } else {
            (
                pricing.price_for_next_share(shares_sold),
                pricing.tier_info(shares_sold),
            )
        };

        Ok(ShareInfo {
            app_id: app_id.clone(),
            shares_sold,
            shares_remaining: record.shares_remaining(pricing.max_shares()),
            max_shares: pricing.max_shares(),
            current_price_cents,
            tier_info,
            pricing_tiers: pricing.tier_table(),
            full_app_available: record.full_buyout_available(),
            full_app_price_cents: pricing.full_buyout_price_cents(),
            is_fully_owned: record.is_fully_owned,
            revenue_share_active: record.revenue_share_active,
            total_revenue_cents: record.total_revenue_cents,
            holder_count,
        })
    }
}
