//! Error types for the revenue-share ledger.
//!
//! All errors use the `RS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Request / event validation errors
//! - 2xx: Authentication errors
//! - 3xx: Capacity errors (share availability)
//! - 4xx: Settlement and payment-provider errors
//! - 5xx: Pricing configuration errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::AppId;

/// Why a purchase cannot be admitted against the current ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    /// The app has been bought outright; nothing is for sale.
    #[error("app {0} has already been fully purchased")]
    FullyOwned(AppId),

    /// A full buyout was requested after shares were already sold.
    #[error("cannot purchase full app {app_id}: {shares_sold} revenue shares already sold")]
    AlreadyPartial { app_id: AppId, shares_sold: u32 },

    /// Every share has been sold (or zero shares were requested).
    #[error("no shares available: {shares_sold} already sold")]
    NoAvailability { shares_sold: u32 },
}

impl CapacityError {
    /// Machine-readable reason code for API responses.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FullyOwned(_) => "fully_owned",
            Self::AlreadyPartial { .. } => "already_partial",
            Self::NoAvailability { .. } => "no_availability",
        }
    }
}

/// Missing or rejected caller credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Bearer` credential was presented.
    #[error("authentication required")]
    MissingCredential,

    /// The identity provider rejected the token.
    #[error("invalid authentication token: {reason}")]
    InvalidToken { reason: String },
}

/// Central error enum for all revenue-share operations.
#[derive(Debug, Error)]
pub enum RevshareError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// A caller request was malformed.
    #[error("RS_ERR_100: Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A payment event could not be interpreted.
    #[error("RS_ERR_101: Invalid payment event: {reason}")]
    InvalidEvent { reason: String },

    // =================================================================
    // Auth Errors (2xx)
    // =================================================================
    #[error("RS_ERR_200: {0}")]
    Auth(#[from] AuthError),

    // =================================================================
    // Capacity Errors (3xx)
    // =================================================================
    #[error("RS_ERR_300: {0}")]
    Capacity(#[from] CapacityError),

    // =================================================================
    // Settlement Errors (4xx)
    // =================================================================
    /// Concurrent writers kept moving the app record; retry later.
    #[error("RS_ERR_400: Ledger contention on app {app_id} after {attempts} attempts")]
    Contention { app_id: AppId, attempts: u32 },

    /// The payment event signature did not verify.
    #[error("RS_ERR_401: Payment event signature rejected: {reason}")]
    PaymentSignature { reason: String },

    /// The checkout provider failed to create a session.
    #[error("RS_ERR_402: Checkout provider error: {reason}")]
    Checkout { reason: String },

    // =================================================================
    // Pricing Errors (5xx)
    // =================================================================
    /// A custom pricing ladder is not contiguous, empty, or decreasing.
    #[error("RS_ERR_500: Invalid pricing ladder: {reason}")]
    InvalidLadder { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// The backing store failed or is in an unusable state.
    #[error("RS_ERR_900: Persistence error: {0}")]
    Persistence(String),

    /// Unrecoverable internal error.
    #[error("RS_ERR_901: Internal error: {0}")]
    Internal(String),

    /// Configuration error (missing secret, bad config file, etc.).
    #[error("RS_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("RS_ERR_903: Serialization error: {0}")]
    Serialization(String),

    /// Share conservation broke: the ledger disagrees with its own audit
    /// trail or exceeds the cap. Critical safety alert.
    #[error("RS_ERR_904: Ledger invariant violation: {reason}")]
    InvariantViolation { reason: String },
}

impl RevshareError {
    /// Transient failures the delivery mechanism should retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Persistence(_))
    }

    /// Failures caused by the caller (4xx-equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::InvalidEvent { .. }
                | Self::Auth(_)
                | Self::Capacity(_)
                | Self::PaymentSignature { .. }
        )
    }

    /// Message safe to return to an external caller. Internal failures
    /// collapse to a generic string.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidRequest { reason } | Self::InvalidEvent { reason } => reason.clone(),
            Self::Auth(err) => err.to_string(),
            Self::Capacity(err) => err.to_string(),
            Self::PaymentSignature { .. } => "Webhook signature verification failed".to_string(),
            Self::Contention { .. } => "Ledger busy, retry later".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RevshareError>;

impl From<serde_json::Error> for RevshareError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
