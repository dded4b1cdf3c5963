//! Multi-share quotes.
//!
//! A quote walks the ladder one share at a time from the current position,
//! so a purchase that straddles a tier boundary pays each tier's price for
//! the shares that fall inside it.

use revshare_types::{CapacityError, Result, RevshareError};
use serde::{Deserialize, Serialize};

use crate::PricingEngine;

/// Price of one share inside a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLine {
    /// 1-indexed share number.
    pub share_number: u32,
    pub price_cents: u64,
}

/// Priced bundle of consecutive shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareQuote {
    /// Shares actually quoted (may be fewer than requested).
    pub shares_count: u32,
    pub total_price_cents: u64,
    pub breakdown: Vec<PriceLine>,
}

impl ShareQuote {
    /// Share number of the first share in the quote.
    #[must_use]
    pub fn first_share(&self) -> Option<u32> {
        self.breakdown.first().map(|line| line.share_number)
    }

    /// Share number of the last share in the quote.
    #[must_use]
    pub fn last_share(&self) -> Option<u32> {
        self.breakdown.last().map(|line| line.share_number)
    }
}

impl PricingEngine {
    /// Quote `requested_qty` shares on top of `shares_sold`.
    ///
    /// The quantity is clamped to what remains under the cap.
    ///
    /// # Errors
    /// Returns [`CapacityError::NoAvailability`] if the clamped quantity
    /// is zero (cap reached, or zero requested), and
    /// [`RevshareError::InvalidLadder`] if the total overflows a `u64`.
    pub fn quote_shares(&self, shares_sold: u32, requested_qty: u32) -> Result<ShareQuote> {
        let available = self.max_shares().saturating_sub(shares_sold);
        let shares_count = requested_qty.min(available);
        if shares_count == 0 {
            return Err(CapacityError::NoAvailability { shares_sold }.into());
        }

        let mut breakdown = Vec::with_capacity(shares_count as usize);
        let mut total_price_cents: u64 = 0;
        let mut current_sold = shares_sold;
        for _ in 0..shares_count {
            let price_cents = self
                .price_for_next_share(current_sold)
                .ok_or(CapacityError::NoAvailability {
                    shares_sold: current_sold,
                })?;
            total_price_cents = total_price_cents.checked_add(price_cents).ok_or_else(|| {
                RevshareError::InvalidLadder {
                    reason: format!(
                        "quote for {shares_count} shares from {shares_sold} overflows u64 cents"
                    ),
                }
            })?;
            current_sold += 1;
            breakdown.push(PriceLine {
                share_number: current_sold,
                price_cents,
            });
        }

        Ok(ShareQuote {
            shares_count,
            total_price_cents,
            breakdown,
        })
    }
}
