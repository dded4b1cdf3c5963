//! # revshare-types
//!
//! Shared types, errors, and configuration for the **revenue-share ledger**.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AppId`], [`UserId`], [`PaymentSessionId`], [`PaymentIntentId`], [`ShareRecordId`], [`TransactionId`], [`QuarantineId`]
//! - **Ledger records**: [`AppRevenueRecord`], [`ShareRecord`], [`TransactionLogEntry`], [`QuarantineRecord`], [`Versioned`]
//! - **Settlement model**: [`PaymentConfirmation`], [`SettlementOutcome`], [`SettlementState`], [`PriorSettlement`]
//! - **Configuration**: [`SettlementConfig`], [`ServiceConfig`], [`LogFormat`]
//! - **Errors**: [`RevshareError`] with `RS_ERR_` prefix codes
//! - **Constants**: share cap, pricing ladder, retry defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod records;
pub mod settlement;

// Re-export all primary types at crate root for ergonomic imports:
//   use revshare_types::{AppId, ShareRecord, PaymentConfirmation, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use records::*;
pub use settlement::*;

// Constants are accessed via `revshare_types::constants::FOO`
// (not re-exported to avoid name collisions).
