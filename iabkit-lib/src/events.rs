//! Events raised by a [`PurchaseSession`](crate::PurchaseSession) to the host.
//!
//! The host implements [`BillingEventHandler`] directly, or uses
//! [`ChannelEventHandler`] to receive every event as a [`BillingEvent`] on a
//! tokio channel.

use tokio::sync::mpsc;

use crate::errors::{BillingError, BillingErrorCode};
use crate::types::{ProductDetails, PurchaseRecord};

/// Observer for session events.
///
/// Callbacks run synchronously on the task driving the session and must not
/// call back into it.
pub trait BillingEventHandler: Send + Sync {
    /// A product became owned. `already_owned` is set when no new
    /// transaction took place.
    fn on_product_purchased(&self, product_id: &str, already_owned: bool);

    /// The ownership caches were rebuilt from the service.
    fn on_purchase_history_restored(&self);

    /// A billing operation failed.
    fn on_billing_error(&self, code: BillingErrorCode, cause: Option<&BillingError>);

    /// The session reached the connected state.
    fn on_billing_initialized(&self);

    /// A receipt was parsed while completing a purchase, whatever the outcome.
    fn on_purchase_data(&self, _record: &PurchaseRecord) {}

    /// A batch metadata query finished.
    fn on_product_list(&self, _products: &[ProductDetails]) {}
}

/// Owned form of every [`BillingEventHandler`] callback.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    ProductPurchased {
        product_id: String,
        already_owned: bool,
    },
    PurchaseHistoryRestored,
    BillingError {
        code: BillingErrorCode,
        cause: Option<BillingError>,
    },
    BillingInitialized,
    PurchaseData(PurchaseRecord),
    ProductList(Vec<ProductDetails>),
}

/// Forwards events into an unbounded channel.
///
/// Events sent after the receiver was dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventHandler {
    tx: mpsc::UnboundedSender<BillingEvent>,
}

impl ChannelEventHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BillingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: BillingEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("billing event receiver dropped");
        }
    }
}

impl BillingEventHandler for ChannelEventHandler {
    fn on_product_purchased(&self, product_id: &str, already_owned: bool) {
        self.send(BillingEvent::ProductPurchased {
            product_id: product_id.to_string(),
            already_owned,
        });
    }

    fn on_purchase_history_restored(&self) {
        self.send(BillingEvent::PurchaseHistoryRestored);
    }

    fn on_billing_error(&self, code: BillingErrorCode, cause: Option<&BillingError>) {
        self.send(BillingEvent::BillingError {
            code,
            cause: cause.cloned(),
        });
    }

    fn on_billing_initialized(&self) {
        self.send(BillingEvent::BillingInitialized);
    }

    fn on_purchase_data(&self, record: &PurchaseRecord) {
        self.send(BillingEvent::PurchaseData(record.clone()));
    }

    fn on_product_list(&self, products: &[ProductDetails]) {
        self.send(BillingEvent::ProductList(products.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseCode;

    #[tokio::test]
    async fn test_channel_handler_forwards_in_order() {
        let (handler, mut rx) = ChannelEventHandler::new();

        handler.on_billing_initialized();
        handler.on_product_purchased("coins100", false);
        handler.on_billing_error(
            BillingErrorCode::Remote(ResponseCode::ERROR),
            Some(&BillingError::remote("consume", ResponseCode::ERROR)),
        );

        assert_eq!(rx.recv().await, Some(BillingEvent::BillingInitialized));
        assert_eq!(
            rx.recv().await,
            Some(BillingEvent::ProductPurchased {
                product_id: "coins100".into(),
                already_owned: false,
            })
        );
        match rx.recv().await {
            Some(BillingEvent::BillingError { code, cause }) => {
                assert_eq!(code.code(), 6);
                assert!(cause.is_some());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (handler, rx) = ChannelEventHandler::new();
        drop(rx);
        handler.on_purchase_history_restored();
    }
}
