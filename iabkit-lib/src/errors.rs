//! Error types for billing operations.
//!
//! `BillingError` is what public operations return. `BillingErrorCode` is the
//! numeric code handed to the host through
//! [`BillingEventHandler::on_billing_error`](crate::BillingEventHandler::on_billing_error).

use std::fmt;

use crate::storage::StorageError;
use crate::types::ResponseCode;

/// Codes reported to the host application through billing-error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingErrorCode {
    /// Restoring the purchase history failed.
    FailedLoadPurchases,
    /// The service refused to create a purchase intent.
    FailedToInitializePurchase,
    /// Receipt signature or correlation payload did not match.
    InvalidSignature,
    /// The external flow could not be launched.
    LostContext,
    /// Any other failure while completing a purchase.
    OtherError,
    /// A remote response code surfaced verbatim.
    Remote(ResponseCode),
}

impl BillingErrorCode {
    /// Numeric value as seen by the host.
    pub fn code(&self) -> i32 {
        match self {
            Self::FailedLoadPurchases => 100,
            Self::FailedToInitializePurchase => 101,
            Self::InvalidSignature => 102,
            Self::LostContext => 103,
            Self::OtherError => 110,
            Self::Remote(code) => code.value(),
        }
    }
}

impl fmt::Display for BillingErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailedLoadPurchases => write!(f, "failed to load purchases (100)"),
            Self::FailedToInitializePurchase => write!(f, "failed to initialize purchase (101)"),
            Self::InvalidSignature => write!(f, "invalid signature (102)"),
            Self::LostContext => write!(f, "lost launch context (103)"),
            Self::OtherError => write!(f, "other error (110)"),
            Self::Remote(code) => write!(f, "remote error {}", code),
        }
    }
}

/// Error returned by billing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// The session is not connected to the billing service.
    #[error("billing service not initialized")]
    NotInitialized,

    /// The service answered with a non-OK response code.
    #[error("{operation} failed with {code}")]
    Remote {
        operation: &'static str,
        code: ResponseCode,
    },

    /// Signature or correlation check failed.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Communication with the service failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with something that could not be interpreted.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The product is not in the ownership cache.
    #[error("product not owned: {0}")]
    NotOwned(String),

    /// The external purchase flow could not be started.
    #[error("unable to launch purchase flow: {0}")]
    LostContext(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl BillingError {
    pub fn remote(operation: &'static str, code: ResponseCode) -> Self {
        Self::Remote { operation, code }
    }

    /// Response code equivalent of this error, for hosts that only deal in codes.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::Remote { code, .. } => *code,
            Self::NotInitialized | Self::Transport(_) => ResponseCode::REMOTE_EXCEPTION,
            Self::BadResponse(_) | Self::Serialization(_) => ResponseCode::BAD_RESPONSE,
            Self::VerificationFailed(_) => ResponseCode::VERIFICATION_FAILED,
            Self::NotOwned(_) => ResponseCode::INVALID_CONSUMPTION,
            Self::LostContext(_) => ResponseCode::SEND_INTENT_FAILED,
            Self::Storage(_) => ResponseCode::UNKNOWN_ERROR,
        }
    }

    /// Returns true if retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::Transport(_) | Self::Storage(_)
        )
    }
}

impl From<serde_json::Error> for BillingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StorageError> for BillingError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
