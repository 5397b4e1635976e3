//! Shared setup for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use iabkit_lib::testing::{
    receipt_json, MockBillingService, ReceiptSigner, RecordingEventHandler, RecordingLauncher,
};
use iabkit_lib::{BillingConfig, FlowResult, InMemoryStore, KeyValueStore, PurchaseSession};

pub const PACKAGE: &str = "com.example.app";

pub struct TestApp {
    pub session: PurchaseSession,
    pub service: Arc<MockBillingService>,
    pub handler: Arc<RecordingEventHandler>,
    pub launcher: Arc<RecordingLauncher>,
    pub signer: ReceiptSigner,
    pub store: Arc<dyn KeyValueStore>,
}

impl TestApp {
    /// Session with signature verification enabled, not yet connected.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let signer = ReceiptSigner::default();
        let config = BillingConfig::new(PACKAGE).with_license_key(signer.public_key_b64());
        Self::build(config, store, signer)
    }

    /// Session without a license key; signatures are not checked.
    pub fn unverified() -> Self {
        Self::build(
            BillingConfig::new(PACKAGE),
            Arc::new(InMemoryStore::new()),
            ReceiptSigner::default(),
        )
    }

    fn build(config: BillingConfig, store: Arc<dyn KeyValueStore>, signer: ReceiptSigner) -> Self {
        let handler = Arc::new(RecordingEventHandler::new());
        let launcher = Arc::new(RecordingLauncher::new());
        let session =
            PurchaseSession::new(config, store.clone(), handler.clone(), launcher.clone())
                .expect("session should load");
        Self {
            session,
            service: Arc::new(MockBillingService::new()),
            handler,
            launcher,
            signer,
            store,
        }
    }

    /// Connect, then forget the connection events.
    pub async fn connect(&mut self) {
        self.session.on_service_connected(self.service.clone()).await;
        self.handler.clear();
    }

    pub fn request_code(&self) -> i32 {
        self.session.config().purchase_request_code
    }

    /// A completed flow result with a correctly signed receipt.
    pub fn signed_result(&self, product_id: &str, token: &str, payload: &str) -> FlowResult {
        let receipt = receipt_json(product_id, token, payload);
        let signature = self.signer.sign(&receipt);
        FlowResult::completed(self.request_code(), receipt, signature)
    }

    pub fn last_payload(&self) -> String {
        self.service
            .last_developer_payload()
            .expect("a purchase intent was requested")
    }
}
