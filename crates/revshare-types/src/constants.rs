//! System-wide constants for the revenue-share ledger.

/// Maximum number of revenue shares sold per app. The owner keeps the rest.
pub const MAX_SHARES: u32 = 49;

/// Largest share cap a custom pricing ladder may declare. Quotes carry one
/// breakdown line per share.
pub const MAX_LADDER_SHARES: u32 = 10_000;

/// Price of a full buyout in cents ($1,000). Only offered while zero shares
/// have been sold.
pub const FULL_APP_PRICE_CENTS: u64 = 100_000;

/// Standard pricing ladder as `(first_share, last_share, price_cents)`,
/// 1-indexed by cumulative share number.
pub const STANDARD_TIERS: [(u32, u32, u64); 5] = [
    (1, 10, 1_000),
    (11, 20, 2_500),
    (21, 30, 5_000),
    (31, 40, 10_000),
    (41, 49, 20_000),
];

/// Default number of optimistic commit attempts per settlement.
pub const DEFAULT_SETTLEMENT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay between settlement retries in milliseconds.
pub const DEFAULT_SETTLEMENT_BACKOFF_BASE_MS: u64 = 2;

/// Upper bound on the delay between settlement retries in milliseconds.
pub const DEFAULT_SETTLEMENT_BACKOFF_MAX_MS: u64 = 50;

/// Currency recorded when the payment event does not carry one.
pub const DEFAULT_CURRENCY: &str = "usd";

/// Origin used to build checkout redirect URLs when the caller sends none.
pub const DEFAULT_ORIGIN: &str = "https://therobots.io";

/// Payment event type that carries a completed checkout.
pub const CHECKOUT_COMPLETED_EVENT: &str = "checkout.session.completed";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
