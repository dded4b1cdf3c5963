//! # revshare-settlement
//!
//! **Settlement**: turns confirmed payments into ledger state exactly once,
//! and never lets the share counter pass the cap.
//!
//! ## Architecture
//!
//! The [`SettlementProcessor`] receives a [`PaymentConfirmation`] and:
//! 1. Rejects confirmations missing required fields
//! 2. Replays the prior outcome for already-recorded payment ids
//! 3. Commits share record, counter and log entry in one conditional write
//! 4. Quarantines paid confirmations that would oversell
//! 5. Retries version conflicts with bounded exponential backoff
//!
//! [`ShareConservation`] re-derives per-app totals from the audit trail and
//! checks them against the ledger counter.
//!
//! ## Outcomes
//!
//! ```text
//! Received → Validating → Committed | Quarantined | Rejected
//!                       ↘ (conflict) → retry … → Err(Contention)
//! ```
//!
//! [`PaymentConfirmation`]: revshare_types::PaymentConfirmation

pub mod conservation;
pub mod processor;

pub use conservation::{ShareConservation, ShareTotals};
pub use processor::{SettlementProcessor, plan_settlement};
