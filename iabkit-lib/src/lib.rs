//! In-app billing client library.
//!
//! Mediates between an application and a remote billing service: binds a
//! session, starts purchases and subscriptions, verifies receipts, and keeps
//! a durable local record of what the user owns so ownership questions are
//! answered without a round trip.
//!
//! Platform specifics are injected through traits:
//!
//! - [`BillingServiceClient`] talks to the billing service
//! - [`FlowLauncher`] starts the external payment flow
//! - [`KeyValueStore`] persists the ownership caches
//! - [`BillingEventHandler`] receives purchase, error and lifecycle events
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use iabkit_lib::{BillingConfig, Category, FileStore, PurchaseSession};
//!
//! let config = BillingConfig::new("com.example.app").with_license_key(KEY_B64);
//! let store = Arc::new(FileStore::open("billing/prefs.json")?);
//! let mut session = PurchaseSession::new(config, store, handler, launcher)?;
//!
//! // once the platform reports the binding
//! session.on_service_connected(client).await;
//! session.purchase("coins100", Category::OneTime).await?;
//!
//! // when the platform delivers the flow result
//! session.handle_flow_result(result);
//! assert!(session.is_purchased("coins100"));
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod launcher;
pub mod query;
pub mod session;
pub mod signature;
pub mod storage;
pub mod types;

/// Mocks and fixtures for exercising sessions without a platform binding.
///
/// Only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::{CachedPurchase, HistoryFlag, OwnershipCache};
pub use client::{BillingServiceClient, BuyIntentResponse, ProductDetailsResponse, PurchasesResponse};
pub use config::BillingConfig;
pub use errors::{BillingError, BillingErrorCode};
pub use events::{BillingEvent, BillingEventHandler, ChannelEventHandler};
pub use launcher::FlowLauncher;
pub use query::ProductQueryService;
pub use session::{ConnectionState, PurchaseSession};
pub use signature::{verify_purchase, SignatureVerifier};
pub use storage::{
    FileStore, InMemoryStore, KeyValueStore, KeyValueStoreExt, StorageError, StorageErrorCode,
};
pub use types::{
    Category, FlowHandle, FlowOutcome, FlowResult, ProductDetails, PurchaseRecord, PurchaseState,
    ResponseCode,
};

/// Common result alias for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;
