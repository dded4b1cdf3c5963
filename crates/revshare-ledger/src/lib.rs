//! # revshare-ledger
//!
//! **Share ledger**: versioned per-app records, the audit trail, the
//! quarantine queue, and advisory purchase quotes.
//!
//! ## Architecture
//!
//! Everything sits on an injected [`LedgerStore`]:
//! 1. **ShareLedger**: lazy record creation + single-attempt conditional update
//! 2. **AuditTrail**: append-only transaction log and quarantine queries
//! 3. **PurchaseIntentValidator**: stale-tolerant quotes from a snapshot
//! 4. **MemoryStore**: in-process store with payment-id uniqueness indexes
//!
//! ## Quote Flow
//!
//! ```text
//! caller → PurchaseIntentValidator.quote() → ShareLedger.snapshot()
//!        → PricingEngine.quote_shares() → PurchaseQuote (advisory)
//! ```
//!
//! Only settlement writes share state, and it always re-reads the ledger.

pub mod audit;
pub mod ledger;
pub mod share_info;
pub mod store;
pub mod validator;

pub use audit::AuditTrail;
pub use ledger::{ShareLedger, UpdateOutcome};
pub use share_info::ShareInfo;
pub use store::{CommitResult, LedgerStore, LedgerWrite, MemoryStore};
pub use validator::{PurchaseIntentValidator, PurchaseQuote};
