//! The tiered pricing ladder.
//!
//! Shares are numbered 1..=cap in sale order. Each tier covers a contiguous
//! range of share numbers at one price, and prices never go down as the
//! ladder is climbed: earlier buyers pay less.

use revshare_types::{Result, RevshareError, constants};
use serde::{Deserialize, Serialize};

use crate::display::format_dollars;

/// One rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    /// First share number in the tier (1-indexed, inclusive).
    pub min_share: u32,
    /// Last share number in the tier (inclusive).
    pub max_share: u32,
    pub price_per_share_cents: u64,
}

impl PricingTier {
    #[must_use]
    pub const fn new(min_share: u32, max_share: u32, price_per_share_cents: u64) -> Self {
        Self {
            min_share,
            max_share,
            price_per_share_cents,
        }
    }

    #[must_use]
    pub fn contains(&self, share_number: u32) -> bool {
        (self.min_share..=self.max_share).contains(&share_number)
    }
}

/// Where the next sale sits on the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierInfo {
    /// 1-indexed tier number.
    pub tier_number: usize,
    pub price_per_share_cents: u64,
    /// Shares left at this price, including the next one.
    pub shares_remaining_in_tier: u32,
    pub total_tiers: usize,
}

/// Display row for the public pricing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSummary {
    /// Share range, e.g. `"1-10"`.
    pub shares: String,
    /// Whole-dollar price, e.g. `"$10"`.
    pub price_display: String,
    pub price_cents: u64,
}

/// Pure tiered-pricing computation. Holds the ladder; no ledger state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingEngine {
    tiers: Vec<PricingTier>,
    max_shares: u32,
    full_buyout_cents: u64,
}

impl PricingEngine {
    /// The fixed production ladder: 49 shares from $10 to $200, buyout $1,000.
    #[must_use]
    pub fn standard() -> Self {
        let tiers: Vec<PricingTier> = constants::STANDARD_TIERS
            .iter()
            .map(|&(min, max, price)| PricingTier::new(min, max, price))
            .collect();
        Self {
            max_shares: constants::MAX_SHARES,
            tiers,
            full_buyout_cents: constants::FULL_APP_PRICE_CENTS,
        }
    }

    /// Build an engine from a custom ladder.
    ///
    /// The ladder must start at share 1, have no gaps or overlaps, use
    /// non-zero prices and never decrease in price. The cap is the last
    /// tier's `max_share` and may not exceed
    /// [`constants::MAX_LADDER_SHARES`].
    ///
    /// # Errors
    /// Returns [`RevshareError::InvalidLadder`] describing the first problem.
    pub fn with_ladder(tiers: Vec<PricingTier>, full_buyout_cents: u64) -> Result<Self> {
        let invalid = |reason: String| RevshareError::InvalidLadder { reason };

        let Some(last) = tiers.last() else {
            return Err(invalid("ladder has no tiers".to_string()));
        };
        let max_shares = last.max_share;
        if max_shares > constants::MAX_LADDER_SHARES {
            return Err(invalid(format!(
                "ladder cap {max_shares} exceeds the limit of {}",
                constants::MAX_LADDER_SHARES
            )));
        }

        let mut expected_min = 1;
        let mut previous_price = 0;
        for (idx, tier) in tiers.iter().enumerate() {
            if tier.min_share != expected_min {
                return Err(invalid(format!(
                    "tier {} starts at share {}, expected {expected_min}",
                    idx + 1,
                    tier.min_share
                )));
            }
            if tier.max_share < tier.min_share {
                return Err(invalid(format!(
                    "tier {} ends ({}) before it starts ({})",
                    idx + 1,
                    tier.max_share,
                    tier.min_share
                )));
            }
            if tier.price_per_share_cents == 0 {
                return Err(invalid(format!("tier {} has a zero price", idx + 1)));
            }
            if tier.price_per_share_cents < previous_price {
                return Err(invalid(format!(
                    "tier {} price {} is below the previous tier's {previous_price}",
                    idx + 1,
                    tier.price_per_share_cents
                )));
            }
            expected_min = tier.max_share.checked_add(1).ok_or_else(|| {
                invalid(format!("tier {} ends at the last representable share", idx + 1))
            })?;
            previous_price = tier.price_per_share_cents;
        }

        Ok(Self {
            tiers,
            max_shares,
            full_buyout_cents,
        })
    }

    /// Share cap: the highest share number on the ladder.
    #[must_use]
    pub fn max_shares(&self) -> u32 {
        self.max_shares
    }

    #[must_use]
    pub fn full_buyout_price_cents(&self) -> u64 {
        self.full_buyout_cents
    }

    #[must_use]
    pub fn tiers(&self) -> &[PricingTier] {
        &self.tiers
    }

    fn tier_index_for_next(&self, shares_sold: u32) -> Option<usize> {
        let next_share = shares_sold.checked_add(1)?;
        self.tiers.iter().position(|tier| tier.contains(next_share))
    }

    /// Price of the next share given how many are already sold, or `None`
    /// once the cap is reached.
    #[must_use]
    pub fn price_for_next_share(&self, shares_sold: u32) -> Option<u64> {
        self.tier_index_for_next(shares_sold)
            .map(|idx| self.tiers[idx].price_per_share_cents)
    }

    /// Tier details for the next sale, or `None` once the cap is reached.
    #[must_use]
    pub fn tier_info(&self, shares_sold: u32) -> Option<TierInfo> {
        self.tier_index_for_next(shares_sold).map(|idx| {
            let tier = &self.tiers[idx];
            TierInfo {
                tier_number: idx + 1,
                price_per_share_cents: tier.price_per_share_cents,
                shares_remaining_in_tier: tier.max_share - shares_sold,
                total_tiers: self.tiers.len(),
            }
        })
    }

    /// The whole ladder formatted for display.
    #[must_use]
    pub fn tier_table(&self) -> Vec<TierSummary> {
        self.tiers
            .iter()
            .map(|tier| TierSummary {
                shares: format!("{}-{}", tier.min_share, tier.max_share),
                price_display: format_dollars(tier.price_per_share_cents),
                price_cents: tier.price_per_share_cents,
            })
            .collect()
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::standard()
    }
}
