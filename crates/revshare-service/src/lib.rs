//! # revshare-service
//!
//! **Service facade** over the ledger, pricing and settlement crates.
//!
//! [`RevenueShareService`] exposes the operations callers use:
//! share info, quotes, settlement, share listings, hosted checkout creation
//! and payment-event handling. Identity, payment-event verification and
//! checkout are consumed through the traits in [`external`].
//!
//! ## Purchase Flow
//!
//! ```text
//! create_checkout(bearer) → IdentityVerifier → quote → CheckoutProvider
//!         … payment happens elsewhere …
//! handle_payment_event(body, sig) → PaymentEventVerifier
//!         → PaymentConfirmation → SettlementProcessor
//! ```
//!
//! [`telemetry::init_tracing`] installs the `tracing-subscriber` output.

pub mod external;
pub mod service;
pub mod telemetry;

pub use external::{
    CheckoutIntent, CheckoutProvider, CheckoutRequest, CheckoutSession, CompletedCheckout,
    IdentityVerifier, PaymentEvent, PaymentEventVerifier, VerifiedIdentity,
};
pub use service::{Capabilities, RevenueShareService, WebhookAck, bearer_token};
pub use telemetry::init_tracing;
