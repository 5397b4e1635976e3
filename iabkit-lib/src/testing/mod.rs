//! Testing utilities for code built on iabkit.
//!
//! In-memory doubles for the billing service, the event handler and the flow
//! launcher, plus a receipt signer, so purchase flows can be driven end to end
//! without a platform binding.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use iabkit_lib::testing::{MockBillingService, RecordingEventHandler, RecordingLauncher};
//! use iabkit_lib::{BillingConfig, InMemoryStore, PurchaseSession};
//!
//! let handler = Arc::new(RecordingEventHandler::new());
//! let launcher = Arc::new(RecordingLauncher::new());
//! let session = PurchaseSession::new(
//!     BillingConfig::new("com.example.app"),
//!     Arc::new(InMemoryStore::new()),
//!     handler.clone(),
//!     launcher.clone(),
//! )
//! .unwrap();
//! let service = Arc::new(MockBillingService::new());
//! ```

pub mod mock_service;
pub mod recorders;
pub mod receipts;

pub use mock_service::{BuyIntentRequest, MockBillingService};
pub use receipts::{receipt_json, ReceiptSigner};
pub use recorders::{RecordingEventHandler, RecordingLauncher};
