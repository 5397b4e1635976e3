//! Wire-level value types exchanged with the billing service and the external
//! purchase flow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{BillingError, Result};

/// Ownership namespace of a product.
///
/// One-time products and subscriptions live in separate caches; the same
/// identifier in both is two unrelated products.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Managed, one-time (consumable) product.
    #[serde(rename = "inapp")]
    OneTime,
    /// Recurring subscription.
    #[serde(rename = "subs")]
    Subscription,
}

impl Category {
    /// Both categories, in restore order.
    pub const ALL: [Category; 2] = [Category::OneTime, Category::Subscription];

    /// Name used by the billing service for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "inapp",
            Self::Subscription => "subs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inapp" => Ok(Self::OneTime),
            "subs" => Ok(Self::Subscription),
            other => Err(BillingError::BadResponse(format!(
                "unknown product category '{other}'"
            ))),
        }
    }
}

/// Numeric result code reported by the billing service.
///
/// Remote codes are kept verbatim; negative values are produced locally when
/// a response could not be obtained or interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseCode(pub i32);

impl ResponseCode {
    pub const OK: Self = Self(0);
    pub const USER_CANCELED: Self = Self(1);
    pub const BILLING_UNAVAILABLE: Self = Self(3);
    pub const ITEM_UNAVAILABLE: Self = Self(4);
    pub const DEVELOPER_ERROR: Self = Self(5);
    pub const ERROR: Self = Self(6);
    pub const ITEM_ALREADY_OWNED: Self = Self(7);
    pub const ITEM_NOT_OWNED: Self = Self(8);

    pub const REMOTE_EXCEPTION: Self = Self(-1001);
    pub const BAD_RESPONSE: Self = Self(-1002);
    pub const VERIFICATION_FAILED: Self = Self(-1003);
    pub const SEND_INTENT_FAILED: Self = Self(-1004);
    pub const USER_CANCELLED: Self = Self(-1005);
    pub const UNKNOWN_PURCHASE_RESPONSE: Self = Self(-1006);
    pub const MISSING_TOKEN: Self = Self(-1007);
    pub const UNKNOWN_ERROR: Self = Self(-1008);
    pub const SUBSCRIPTIONS_NOT_AVAILABLE: Self = Self(-1009);
    pub const INVALID_CONSUMPTION: Self = Self(-1010);

    /// Whether the service reported success.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Raw numeric value.
    pub fn value(self) -> i32 {
        self.0
    }

    /// Symbolic name for logs, `"UNKNOWN"` for codes outside the known table.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "OK",
            1 => "USER_CANCELED",
            3 => "BILLING_UNAVAILABLE",
            4 => "ITEM_UNAVAILABLE",
            5 => "DEVELOPER_ERROR",
            6 => "ERROR",
            7 => "ITEM_ALREADY_OWNED",
            8 => "ITEM_NOT_OWNED",
            -1001 => "REMOTE_EXCEPTION",
            -1002 => "BAD_RESPONSE",
            -1003 => "VERIFICATION_FAILED",
            -1004 => "SEND_INTENT_FAILED",
            -1005 => "USER_CANCELLED",
            -1006 => "UNKNOWN_PURCHASE_RESPONSE",
            -1007 => "MISSING_TOKEN",
            -1008 => "UNKNOWN_ERROR",
            -1009 => "SUBSCRIPTIONS_NOT_AVAILABLE",
            -1010 => "INVALID_CONSUMPTION",
            _ => "UNKNOWN",
        }
    }
}

impl From<i32> for ResponseCode {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// State of a purchase as reported in the receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PurchaseState {
    Purchased,
    Cancelled,
    Refunded,
}

impl TryFrom<i32> for PurchaseState {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Purchased),
            1 => Ok(Self::Cancelled),
            2 => Ok(Self::Refunded),
            other => Err(format!("unknown purchase state {other}")),
        }
    }
}

impl From<PurchaseState> for i32 {
    fn from(state: PurchaseState) -> Self {
        match state {
            PurchaseState::Purchased => 0,
            PurchaseState::Cancelled => 1,
            PurchaseState::Refunded => 2,
        }
    }
}

/// A purchase as described by the billing service.
///
/// Built once from a service response and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub package_name: String,
    pub order_id: String,
    pub product_id: String,
    /// Opaque correlation string echoed back from the purchase request.
    pub developer_payload: String,
    /// Milliseconds since the Unix epoch.
    pub purchase_time: i64,
    pub purchase_state: PurchaseState,
    /// Service-issued token, required for consumption.
    pub purchase_token: String,
}

impl PurchaseRecord {
    /// Parse a purchase record from the JSON text the service returned.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Purchase time as a UTC timestamp, if it is representable.
    pub fn purchased_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.purchase_time)
    }

    pub fn is_purchased(&self) -> bool {
        self.purchase_state == PurchaseState::Purchased
    }
}

/// Product metadata returned by a details query.
///
/// Only the identifier is interpreted; the remaining fields are surfaced as
/// text and the raw JSON is kept for callers that need more.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductDetails {
    pub category: Category,
    pub product_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub raw_json: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProductDetails {
    product_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    price: Option<String>,
}

impl ProductDetails {
    /// Parse one metadata record of the given category.
    pub fn parse(category: Category, raw_json: &str) -> Result<Self> {
        let raw: RawProductDetails = serde_json::from_str(raw_json)?;
        Ok(Self {
            category,
            product_id: raw.product_id,
            title: raw.title,
            description: raw.description,
            price: raw.price,
            raw_json: raw_json.to_string(),
        })
    }
}

/// Opaque handle the platform launcher uses to start the purchase flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowHandle(pub String);

impl FlowHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Platform-level outcome of the external purchase flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The flow ran to completion; the embedded response code decides success.
    Completed,
    /// The flow was dismissed or failed before producing a result.
    Canceled,
}

/// Result delivered back to the session when the external flow returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowResult {
    /// Correlation code the flow was launched with.
    pub request_code: i32,
    pub outcome: FlowOutcome,
    /// Embedded service response code; a missing code counts as OK.
    pub response_code: Option<ResponseCode>,
    /// Receipt JSON exactly as received.
    pub purchase_data: Option<String>,
    /// Base64 signature over `purchase_data`.
    pub data_signature: Option<String>,
}

impl FlowResult {
    /// A completed flow carrying a receipt and its signature.
    pub fn completed(
        request_code: i32,
        purchase_data: impl Into<String>,
        data_signature: impl Into<String>,
    ) -> Self {
        Self {
            request_code,
            outcome: FlowOutcome::Completed,
            response_code: Some(ResponseCode::OK),
            purchase_data: Some(purchase_data.into()),
            data_signature: Some(data_signature.into()),
        }
    }

    /// A flow the user or platform abandoned.
    pub fn canceled(request_code: i32) -> Self {
        Self {
            request_code,
            outcome: FlowOutcome::Canceled,
            response_code: Some(ResponseCode::USER_CANCELED),
            purchase_data: None,
            data_signature: None,
        }
    }

    /// Override the embedded response code.
    pub fn with_response_code(mut self, code: ResponseCode) -> Self {
        self.response_code = Some(code);
        self
    }

    /// Effective response code, defaulting to OK when absent.
    pub fn effective_response_code(&self) -> ResponseCode {
        self.response_code.unwrap_or(ResponseCode::OK)
    }
}
