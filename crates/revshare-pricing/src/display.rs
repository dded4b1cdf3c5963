//! Cent amounts rendered as whole dollars for public pricing tables.

use rust_decimal::{Decimal, RoundingStrategy};

/// Format a cent amount as a whole-dollar string (`1000` → `"$10"`).
/// Fractional dollars round half away from zero.
#[must_use]
pub fn format_dollars(cents: u64) -> String {
    let dollars = Decimal::from(cents) / Decimal::ONE_HUNDRED;
    let whole = dollars.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    format!("${whole}")
}
