//! # revshare-pricing
//!
//! **Pure deterministic share pricing.**
//!
//! The pricing engine maps "shares already sold" to prices. It has:
//!
//! - **Zero side effects**: no ledger reads, no availability checks beyond the cap
//! - **Deterministic output**: same position on the ladder -> same price
//! - **Non-decreasing prices**: each tier costs at least as much as the last
//! - **Per-unit walking**: multi-share quotes price every share individually

pub mod display;
pub mod ladder;
pub mod quote;

pub use display::format_dollars;
pub use ladder::{PricingEngine, PricingTier, TierInfo, TierSummary};
pub use quote::{PriceLine, ShareQuote};
