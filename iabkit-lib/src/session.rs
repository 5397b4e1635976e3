//! # Purchase session
//!
//! [`PurchaseSession`] owns the connection to the billing service, the two
//! ownership caches and the in-flight purchase. It is driven entirely by the
//! host:
//!
//! 1. [`PurchaseSession::new`] once the host asked the platform to bind the
//!    service (state `Connecting`).
//! 2. [`PurchaseSession::on_service_connected`] when the binding is ready. The
//!    purchase history is restored the first time, then `billing initialized`
//!    fires.
//! 3. [`PurchaseSession::purchase`] requests an intent and launches the
//!    external flow.
//! 4. [`PurchaseSession::handle_flow_result`] receives the flow's result,
//!    checks the correlation payload and signature, and records ownership.
//!
//! At most one purchase is in flight per session. Starting a new purchase
//! replaces the previous correlation payload, so a late result from an
//! abandoned flow is rejected. Concurrent purchases on one session are not
//! supported.
//!
//! The session is not internally synchronized; hosts sharing it across
//! threads wrap it in their own lock.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::cache::{HistoryFlag, OwnershipCache};
use crate::client::BillingServiceClient;
use crate::config::BillingConfig;
use crate::errors::{BillingError, BillingErrorCode};
use crate::events::BillingEventHandler;
use crate::launcher::FlowLauncher;
use crate::query::ProductQueryService;
use crate::signature::SignatureVerifier;
use crate::storage::KeyValueStore;
use crate::types::{
    Category, FlowOutcome, FlowResult, ProductDetails, PurchaseRecord, ResponseCode,
};
use crate::Result;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not bound to the service; every remote operation fails.
    Unbound,
    /// Binding requested, waiting for the service.
    Connecting,
    /// Bound; remote operations are allowed.
    Connected,
}

/// The purchase awaiting its flow result.
#[derive(Debug, Clone)]
struct PendingPurchase {
    token: String,
    product_id: String,
    category: Category,
}

/// Fields of a receipt needed to rebuild the ownership cache.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedEntry {
    product_id: String,
    purchase_token: String,
}

/// Client-side purchase state machine.
pub struct PurchaseSession {
    config: BillingConfig,
    handler: Arc<dyn BillingEventHandler>,
    launcher: Arc<dyn FlowLauncher>,
    verifier: SignatureVerifier,
    products: OwnershipCache,
    subscriptions: OwnershipCache,
    history: HistoryFlag,
    client: Option<Arc<dyn BillingServiceClient>>,
    state: ConnectionState,
    released: bool,
    pending: Option<PendingPurchase>,
}

impl PurchaseSession {
    /// Create a session and load its caches from `store`.
    ///
    /// The session starts in [`ConnectionState::Connecting`]; the host
    /// reports the binding through [`on_service_connected`](Self::on_service_connected).
    pub fn new(
        config: BillingConfig,
        store: Arc<dyn KeyValueStore>,
        handler: Arc<dyn BillingEventHandler>,
        launcher: Arc<dyn FlowLauncher>,
    ) -> Result<Self> {
        let products = OwnershipCache::load(store.clone(), config.cache_key(Category::OneTime))?;
        let subscriptions =
            OwnershipCache::load(store.clone(), config.cache_key(Category::Subscription))?;
        let history = HistoryFlag::new(store, config.restored_key());
        let verifier = SignatureVerifier::new(config.license_key.clone());

        if !config.verifies_receipts() {
            tracing::warn!(
                package = %config.package_name,
                "no license key configured, receipt signatures will not be verified"
            );
        }

        Ok(Self {
            config,
            handler,
            launcher,
            verifier,
            products,
            subscriptions,
            history,
            client: None,
            state: ConnectionState::Connecting,
            released: false,
            pending: None,
        })
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether remote operations are currently possible.
    pub fn is_initialized(&self) -> bool {
        self.state == ConnectionState::Connected && self.client.is_some()
    }

    // ---- lifecycle ----

    /// The billing service binding is ready.
    ///
    /// Restores the purchase history if it was never restored, then reports
    /// `billing initialized`. Ignored after [`release`](Self::release).
    #[tracing::instrument(skip(self, client))]
    pub async fn on_service_connected(&mut self, client: Arc<dyn BillingServiceClient>) {
        if self.released {
            tracing::warn!("service connected after release, ignoring");
            return;
        }

        self.client = Some(client);
        self.state = ConnectionState::Connected;
        tracing::debug!("billing service connected");

        if !self.is_purchase_history_restored() && self.restore_all().await.is_ok() {
            if let Err(e) = self.set_purchase_history_restored() {
                tracing::error!(error = %e, "failed to persist history-restored flag");
            }
            self.handler.on_purchase_history_restored();
        }
        self.handler.on_billing_initialized();
    }

    /// The service dropped the binding. The session does not reconnect itself.
    pub fn on_service_disconnected(&mut self) {
        if self.state != ConnectionState::Unbound {
            tracing::debug!("billing service disconnected");
        }
        self.client = None;
        self.state = ConnectionState::Unbound;
    }

    /// Tear the session down. Later connection notifications are ignored.
    pub fn release(&mut self) {
        tracing::debug!("releasing billing session");
        self.released = true;
        self.client = None;
        self.state = ConnectionState::Unbound;
    }

    fn connected_client(&self) -> Result<Arc<dyn BillingServiceClient>> {
        match (&self.state, &self.client) {
            (ConnectionState::Connected, Some(client)) => Ok(client.clone()),
            _ => Err(BillingError::NotInitialized),
        }
    }

    // ---- ownership queries ----

    pub fn is_purchased(&self, product_id: &str) -> bool {
        self.products.contains(product_id)
    }

    pub fn is_subscribed(&self, product_id: &str) -> bool {
        self.subscriptions.contains(product_id)
    }

    pub fn list_owned_products(&self) -> Vec<String> {
        self.products.list()
    }

    pub fn list_owned_subscriptions(&self) -> Vec<String> {
        self.subscriptions.list()
    }

    /// Cached purchase token of `product_id` in `category`.
    pub fn purchase_token(&self, product_id: &str, category: Category) -> Option<String> {
        self.cache(category).token_for(product_id).map(str::to_string)
    }

    pub fn cache(&self, category: Category) -> &OwnershipCache {
        match category {
            Category::OneTime => &self.products,
            Category::Subscription => &self.subscriptions,
        }
    }

    fn cache_mut(&mut self, category: Category) -> &mut OwnershipCache {
        match category {
            Category::OneTime => &mut self.products,
            Category::Subscription => &mut self.subscriptions,
        }
    }

    /// Whether the purchase history was restored at least once. An unreadable
    /// flag counts as not restored.
    pub fn is_purchase_history_restored(&self) -> bool {
        match self.history.is_set() {
            Ok(restored) => restored,
            Err(e) => {
                tracing::error!(error = %e, "failed to read history-restored flag");
                false
            }
        }
    }

    pub fn set_purchase_history_restored(&self) -> Result<()> {
        Ok(self.history.set()?)
    }

    // ---- restore ----

    /// Replace the `category` cache with the service's purchase list.
    ///
    /// On a non-OK response the cache is left untouched and no event fires.
    /// A transport or parse fault also leaves the cache untouched and reports
    /// `FailedLoadPurchases`.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&mut self, category: Category) -> Result<()> {
        let client = self.connected_client()?;

        let entries = match Self::fetch_owned(client.as_ref(), category).await {
            Ok(entries) => entries,
            Err(e @ BillingError::Remote { .. }) => {
                tracing::debug!(%category, error = %e, "restore refused by service");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(%category, error = %e, "failed to load purchases");
                self.handler
                    .on_billing_error(BillingErrorCode::FailedLoadPurchases, Some(&e));
                return Err(e);
            }
        };

        let count = entries.len();
        if let Err(e) = self
            .cache_mut(category)
            .replace_all(entries.into_iter().map(|e| (e.product_id, e.purchase_token)))
        {
            let e = BillingError::from(e);
            tracing::error!(%category, error = %e, "failed to persist restored purchases");
            self.handler
                .on_billing_error(BillingErrorCode::FailedLoadPurchases, Some(&e));
            return Err(e);
        }

        tracing::debug!(%category, count, "purchase history restored");
        Ok(())
    }

    async fn fetch_owned(
        client: &dyn BillingServiceClient,
        category: Category,
    ) -> Result<Vec<OwnedEntry>> {
        let response = client.get_purchases(category).await?;
        if !response.response_code.is_ok() {
            return Err(BillingError::remote("restore", response.response_code));
        }
        let list = response.purchase_data_list.ok_or_else(|| {
            BillingError::BadResponse(format!("purchase list missing for {}", category))
        })?;

        let entries = list
            .iter()
            .map(|raw| serde_json::from_str::<OwnedEntry>(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Restore one-time products, then subscriptions. Stops at the first failure.
    #[tracing::instrument(skip(self))]
    pub async fn restore_all(&mut self) -> Result<()> {
        for category in Category::ALL {
            self.restore(category).await?;
        }
        Ok(())
    }

    /// Fetch the service's purchase list for `category` without touching the
    /// cache. No events are raised.
    #[tracing::instrument(skip(self))]
    pub async fn list_purchases(&self, category: Category) -> Result<Vec<PurchaseRecord>> {
        let client = self.connected_client()?;
        let response = client.get_purchases(category).await.map_err(|e| {
            tracing::error!(%category, error = %e, "failed to list purchases");
            e
        })?;

        if !response.response_code.is_ok() {
            return Err(BillingError::remote("list_purchases", response.response_code));
        }
        let list = response.purchase_data_list.ok_or_else(|| {
            BillingError::BadResponse(format!("purchase list missing for {}", category))
        })?;

        list.iter()
            .map(|raw| PurchaseRecord::from_json(raw))
            .collect()
    }

    // ---- purchase ----

    /// Buy a one-time product.
    pub async fn purchase_product(&mut self, product_id: &str) -> Result<()> {
        self.purchase(product_id, Category::OneTime).await
    }

    /// Start a subscription.
    pub async fn subscribe(&mut self, product_id: &str) -> Result<()> {
        self.purchase(product_id, Category::Subscription).await
    }

    /// Request a purchase intent for `product_id` and launch the external flow.
    ///
    /// Success means the flow is pending, or the product was already owned
    /// (reported as `purchased` with `already_owned` set). The result of the
    /// flow arrives through [`handle_flow_result`](Self::handle_flow_result).
    #[tracing::instrument(skip(self))]
    pub async fn purchase(&mut self, product_id: &str, category: Category) -> Result<()> {
        let client = self.connected_client()?;

        let token = Uuid::new_v4().to_string();
        if let Some(previous) = self.pending.take() {
            tracing::debug!(
                previous = %previous.product_id,
                "replacing in-flight purchase"
            );
        }
        self.pending = Some(PendingPurchase {
            token: token.clone(),
            product_id: product_id.to_string(),
            category,
        });

        let response = match client.get_buy_intent(product_id, category, &token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "purchase intent request failed");
                self.handler
                    .on_billing_error(BillingErrorCode::OtherError, Some(&e));
                return Err(e);
            }
        };

        match response.response_code {
            ResponseCode::OK => {
                let Some(handle) = response.buy_intent else {
                    let e = BillingError::BadResponse("purchase intent without flow handle".into());
                    tracing::error!(error = %e, "purchase intent request failed");
                    self.handler
                        .on_billing_error(BillingErrorCode::OtherError, Some(&e));
                    return Err(e);
                };

                if let Err(e) = self
                    .launcher
                    .launch(&handle, self.config.purchase_request_code)
                {
                    let e = match e {
                        BillingError::LostContext(_) => e,
                        other => BillingError::LostContext(other.to_string()),
                    };
                    tracing::warn!(error = %e, "could not launch purchase flow");
                    self.handler
                        .on_billing_error(BillingErrorCode::LostContext, Some(&e));
                    return Err(e);
                }
                tracing::debug!("purchase flow launched");
                Ok(())
            }
            ResponseCode::ITEM_ALREADY_OWNED => {
                if !self.is_purchased(product_id) && !self.is_subscribed(product_id) {
                    tracing::debug!("owned product missing from cache, restoring");
                    if let Err(e) = self.restore_all().await {
                        tracing::warn!(error = %e, "reconciling restore failed");
                    }
                }
                self.handler.on_product_purchased(product_id, true);
                Ok(())
            }
            code => {
                tracing::warn!(%code, "purchase intent refused");
                let e = BillingError::remote("purchase", code);
                self.handler
                    .on_billing_error(BillingErrorCode::FailedToInitializePurchase, Some(&e));
                Err(e)
            }
        }
    }

    /// Deliver the result of an external flow.
    ///
    /// Returns `false` if `result` was launched by someone else (different
    /// request code); it is then left for other consumers. Every other result
    /// is handled, successfully or with exactly one billing-error event, and
    /// `true` is returned. The in-flight purchase is discarded either way.
    pub fn handle_flow_result(&mut self, result: FlowResult) -> bool {
        if result.request_code != self.config.purchase_request_code {
            return false;
        }

        let pending = self.pending.take();
        let response_code = result.effective_response_code();
        if result.outcome != FlowOutcome::Completed || !response_code.is_ok() {
            tracing::debug!(outcome = ?result.outcome, %response_code, "purchase flow did not complete");
            let e = BillingError::remote("purchase flow", response_code);
            self.handler
                .on_billing_error(BillingErrorCode::OtherError, Some(&e));
            return true;
        }

        if let Err(e) = self.complete_purchase(pending, &result) {
            tracing::error!(error = %e, "failed to complete purchase");
            self.handler
                .on_billing_error(BillingErrorCode::OtherError, Some(&e));
        }
        true
    }

    fn complete_purchase(
        &mut self,
        pending: Option<PendingPurchase>,
        result: &FlowResult,
    ) -> Result<()> {
        let purchase_data = result
            .purchase_data
            .as_deref()
            .ok_or_else(|| BillingError::BadResponse("flow result without purchase data".into()))?;
        let signature = result.data_signature.as_deref().unwrap_or_default();
        let record = PurchaseRecord::from_json(purchase_data)?;

        self.settle(pending, &record, purchase_data, signature);
        self.handler.on_purchase_data(&record);
        Ok(())
    }

    fn settle(
        &mut self,
        pending: Option<PendingPurchase>,
        record: &PurchaseRecord,
        purchase_data: &str,
        signature: &str,
    ) {
        let Some(pending) = pending.filter(|p| p.token == record.developer_payload) else {
            tracing::warn!(
                product_id = %record.product_id,
                "developer payload does not match the in-flight purchase"
            );
            let e = BillingError::VerificationFailed("developer payload mismatch".into());
            self.handler
                .on_billing_error(BillingErrorCode::InvalidSignature, Some(&e));
            return;
        };

        if !self.verifier.verify(purchase_data, signature) {
            tracing::warn!(product_id = %record.product_id, "receipt signature does not match");
            let e = BillingError::VerificationFailed("receipt signature mismatch".into());
            self.handler
                .on_billing_error(BillingErrorCode::InvalidSignature, Some(&e));
            return;
        }

        if pending.product_id != record.product_id {
            tracing::warn!(
                requested = %pending.product_id,
                received = %record.product_id,
                "receipt is for a different product than requested"
            );
        }

        if let Err(e) = self
            .cache_mut(pending.category)
            .put(record.product_id.as_str(), record.purchase_token.as_str())
        {
            let e = BillingError::from(e);
            tracing::error!(error = %e, "failed to record purchase");
            self.handler
                .on_billing_error(BillingErrorCode::OtherError, Some(&e));
            return;
        }

        tracing::debug!(product_id = %record.product_id, category = %pending.category, "purchase recorded");
        self.handler.on_product_purchased(&record.product_id, false);
    }

    // ---- consume ----

    /// Consume an owned one-time product so it can be bought again.
    ///
    /// Fails with [`BillingError::NotOwned`] without contacting the service
    /// when the product has no cached token.
    #[tracing::instrument(skip(self))]
    pub async fn consume(&mut self, product_id: &str) -> Result<()> {
        let client = self.connected_client()?;

        let token = match self.products.token_for(product_id) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                tracing::debug!("nothing to consume");
                return Err(BillingError::NotOwned(product_id.to_string()));
            }
        };

        let code = client.consume_purchase(&token).await.map_err(|e| {
            tracing::error!(error = %e, "consume request failed");
            e
        })?;

        if !code.is_ok() {
            tracing::warn!(%code, "failed to consume purchase");
            let e = BillingError::remote("consume", code);
            self.handler
                .on_billing_error(BillingErrorCode::Remote(code), Some(&e));
            return Err(e);
        }

        self.products.remove(product_id)?;
        tracing::debug!("purchase consumed");
        Ok(())
    }

    // ---- product metadata ----

    /// Query metadata for `product_ids`; the records are delivered through
    /// [`BillingEventHandler::on_product_list`].
    #[tracing::instrument(skip(self))]
    pub async fn query_products(
        &self,
        category: Category,
        product_ids: &[String],
    ) -> Result<ResponseCode> {
        let client = self.connected_client()?;
        let handler = self.handler.clone();
        let code = ProductQueryService::new(client.as_ref())
            .query_batch(category, product_ids, |products| {
                handler.on_product_list(&products)
            })
            .await;
        Ok(code)
    }

    /// Query metadata for one product and hand the first record to `on_product`.
    #[tracing::instrument(skip(self, on_product))]
    pub async fn query_product<F>(
        &self,
        category: Category,
        product_id: &str,
        on_product: F,
    ) -> Result<ResponseCode>
    where
        F: FnOnce(Option<ProductDetails>),
    {
        let client = self.connected_client()?;
        let code = ProductQueryService::new(client.as_ref())
            .query_single(category, product_id, on_product)
            .await;
        Ok(code)
    }
}
