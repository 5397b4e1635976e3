use async_trait::async_trait;

use crate::types::{Category, FlowHandle, ResponseCode};
use crate::Result;

/// Response to a purchase-list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasesResponse {
    pub response_code: ResponseCode,
    /// Receipt JSON for every owned purchase; `None` if the service omitted the list.
    pub purchase_data_list: Option<Vec<String>>,
}

impl PurchasesResponse {
    pub fn ok(purchase_data_list: Vec<String>) -> Self {
        Self {
            response_code: ResponseCode::OK,
            purchase_data_list: Some(purchase_data_list),
        }
    }

    pub fn error(response_code: ResponseCode) -> Self {
        Self {
            response_code,
            purchase_data_list: None,
        }
    }
}

/// Response to a purchase-intent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyIntentResponse {
    pub response_code: ResponseCode,
    pub buy_intent: Option<FlowHandle>,
}

impl BuyIntentResponse {
    pub fn ok(handle: FlowHandle) -> Self {
        Self {
            response_code: ResponseCode::OK,
            buy_intent: Some(handle),
        }
    }

    pub fn error(response_code: ResponseCode) -> Self {
        Self {
            response_code,
            buy_intent: None,
        }
    }
}

/// Response to a product metadata query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDetailsResponse {
    pub response_code: ResponseCode,
    /// Raw metadata JSON per product; `None` if the service omitted the list.
    pub details_list: Option<Vec<String>>,
}

impl ProductDetailsResponse {
    pub fn ok(details_list: Vec<String>) -> Self {
        Self {
            response_code: ResponseCode::OK,
            details_list: Some(details_list),
        }
    }

    pub fn error(response_code: ResponseCode) -> Self {
        Self {
            response_code,
            details_list: None,
        }
    }
}

/// Request/response contract of the remote billing service.
///
/// Implementations wrap whatever IPC or network binding the platform
/// provides. A call that could not be completed at all returns
/// [`BillingError::Transport`](crate::BillingError::Transport); a call the
/// service answered, successfully or not, returns `Ok` with its response code.
#[async_trait]
pub trait BillingServiceClient: Send + Sync {
    /// Lists the purchases the user currently owns in `category`.
    async fn get_purchases(&self, category: Category) -> Result<PurchasesResponse>;

    /// Requests a launchable purchase flow for `product_id`.
    ///
    /// `developer_payload` is echoed back inside the receipt.
    async fn get_buy_intent(
        &self,
        product_id: &str,
        category: Category,
        developer_payload: &str,
    ) -> Result<BuyIntentResponse>;

    /// Fetches metadata for `product_ids` in one request.
    async fn get_product_details(
        &self,
        category: Category,
        product_ids: &[String],
    ) -> Result<ProductDetailsResponse>;

    /// Consumes a one-time purchase so it can be bought again.
    async fn consume_purchase(&self, purchase_token: &str) -> Result<ResponseCode>;
}
