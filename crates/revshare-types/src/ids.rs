//! Identifiers used throughout the revenue-share ledger.
//!
//! App, user and payment identifiers are opaque strings handed to us by
//! the outside world. Ledger-owned records use UUIDs: UUIDv7 for append-only
//! entries, and a content-derived UUID for share records so that the same
//! payment always maps to the same record.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares an opaque string identifier newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Blank identifiers count as missing.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Application identifier (the app's slug).
    AppId
);

string_id!(
    /// Identifier of an authenticated purchaser.
    UserId
);

string_id!(
    /// Checkout session identifier assigned by the payment processor.
    PaymentSessionId
);

string_id!(
    /// Payment intent identifier assigned by the payment processor.
    PaymentIntentId
);

// ---------------------------------------------------------------------------
// ShareRecordId
// ---------------------------------------------------------------------------

/// Identifier of a [`ShareRecord`](crate::ShareRecord).
///
/// Derived from `(app, payment session)` so a redelivered confirmation
/// always resolves to the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ShareRecordId(pub Uuid);

impl ShareRecordId {
    #[must_use]
    pub fn for_payment(app_id: &AppId, session_id: &PaymentSessionId) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"revshare:share_record:v1:");
        hasher.update((app_id.0.len() as u64).to_le_bytes());
        hasher.update(app_id.0.as_bytes());
        hasher.update(session_id.0.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for ShareRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "share:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Identifier of a transaction log entry. UUIDv7, so entries sort by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// QuarantineId
// ---------------------------------------------------------------------------

/// Identifier of a quarantine record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct QuarantineId(pub Uuid);

impl QuarantineId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for QuarantineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuarantineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quarantine:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
