//! Scriptable in-memory billing service.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::{
    BillingServiceClient, BuyIntentResponse, ProductDetailsResponse, PurchasesResponse,
};
use crate::types::{Category, FlowHandle, ResponseCode};
use crate::{BillingError, Result};

/// A recorded purchase-intent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyIntentRequest {
    pub product_id: String,
    pub category: Category,
    pub developer_payload: String,
}

struct State {
    purchases: HashMap<Category, PurchasesResponse>,
    buy_intent: Option<BuyIntentResponse>,
    product_details: ProductDetailsResponse,
    consume_response: ResponseCode,
    transport_down: bool,

    purchases_requests: Vec<Category>,
    buy_intent_requests: Vec<BuyIntentRequest>,
    details_requests: Vec<(Category, Vec<String>)>,
    consumed_tokens: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            purchases: HashMap::new(),
            buy_intent: None,
            product_details: ProductDetailsResponse::ok(Vec::new()),
            consume_response: ResponseCode::OK,
            transport_down: false,
            purchases_requests: Vec::new(),
            buy_intent_requests: Vec::new(),
            details_requests: Vec::new(),
            consumed_tokens: Vec::new(),
        }
    }
}

/// Test double for [`BillingServiceClient`].
///
/// Every call is recorded. By default purchase lists are empty, purchase
/// intents succeed with a fresh flow handle, and consumption succeeds.
#[derive(Default)]
pub struct MockBillingService {
    state: Mutex<State>,
}

impl MockBillingService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer purchase-list requests for `category` with `response`.
    pub fn set_purchases(&self, category: Category, response: PurchasesResponse) {
        self.state().purchases.insert(category, response);
    }

    /// Answer purchase-list requests for `category` with OK and these receipts.
    pub fn set_owned(&self, category: Category, receipts: Vec<String>) {
        self.set_purchases(category, PurchasesResponse::ok(receipts));
    }

    /// Answer every purchase-intent request with `response`.
    pub fn set_buy_intent(&self, response: BuyIntentResponse) {
        self.state().buy_intent = Some(response);
    }

    pub fn set_product_details(&self, response: ProductDetailsResponse) {
        self.state().product_details = response;
    }

    pub fn set_consume_response(&self, code: ResponseCode) {
        self.state().consume_response = code;
    }

    /// Make every call fail with a transport error.
    pub fn fail_transport(&self, down: bool) {
        self.state().transport_down = down;
    }

    pub fn purchases_requests(&self) -> Vec<Category> {
        self.state().purchases_requests.clone()
    }

    pub fn buy_intent_requests(&self) -> Vec<BuyIntentRequest> {
        self.state().buy_intent_requests.clone()
    }

    /// Developer payload of the most recent purchase-intent request.
    pub fn last_developer_payload(&self) -> Option<String> {
        self.state()
            .buy_intent_requests
            .last()
            .map(|r| r.developer_payload.clone())
    }

    pub fn details_requests(&self) -> usize {
        self.state().details_requests.len()
    }

    pub fn consumed_tokens(&self) -> Vec<String> {
        self.state().consumed_tokens.clone()
    }

    fn check_transport(state: &State, operation: &str) -> Result<()> {
        if state.transport_down {
            return Err(BillingError::Transport(format!(
                "service connection lost during {}",
                operation
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BillingServiceClient for MockBillingService {
    async fn get_purchases(&self, category: Category) -> Result<PurchasesResponse> {
        let mut state = self.state();
        state.purchases_requests.push(category);
        Self::check_transport(&state, "get_purchases")?;
        Ok(state
            .purchases
            .get(&category)
            .cloned()
            .unwrap_or_else(|| PurchasesResponse::ok(Vec::new())))
    }

    async fn get_buy_intent(
        &self,
        product_id: &str,
        category: Category,
        developer_payload: &str,
    ) -> Result<BuyIntentResponse> {
        let mut state = self.state();
        state.buy_intent_requests.push(BuyIntentRequest {
            product_id: product_id.to_string(),
            category,
            developer_payload: developer_payload.to_string(),
        });
        Self::check_transport(&state, "get_buy_intent")?;
        let count = state.buy_intent_requests.len();
        Ok(state.buy_intent.clone().unwrap_or_else(|| {
            BuyIntentResponse::ok(FlowHandle::new(format!("flow-{}-{}", product_id, count)))
        }))
    }

    async fn get_product_details(
        &self,
        category: Category,
        product_ids: &[String],
    ) -> Result<ProductDetailsResponse> {
        let mut state = self.state();
        state
            .details_requests
            .push((category, product_ids.to_vec()));
        Self::check_transport(&state, "get_product_details")?;
        Ok(state.product_details.clone())
    }

    async fn consume_purchase(&self, purchase_token: &str) -> Result<ResponseCode> {
        let mut state = self.state();
        Self::check_transport(&state, "consume_purchase")?;
        state.consumed_tokens.push(purchase_token.to_string());
        Ok(state.consume_response)
    }
}
