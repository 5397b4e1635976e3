//! Recording doubles for the host-side collaborators.

use std::sync::{Mutex, MutexGuard};

use crate::errors::{BillingError, BillingErrorCode};
use crate::events::{BillingEvent, BillingEventHandler};
use crate::launcher::FlowLauncher;
use crate::types::{FlowHandle, ProductDetails, PurchaseRecord};
use crate::Result;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Event handler that keeps every event it receives.
#[derive(Default)]
pub struct RecordingEventHandler {
    events: Mutex<Vec<BillingEvent>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BillingEvent> {
        lock(&self.events).clone()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    /// `(product_id, already_owned)` of every purchased event.
    pub fn purchased(&self) -> Vec<(String, bool)> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                BillingEvent::ProductPurchased {
                    product_id,
                    already_owned,
                } => Some((product_id.clone(), *already_owned)),
                _ => None,
            })
            .collect()
    }

    /// Numeric codes of every billing-error event.
    pub fn error_codes(&self) -> Vec<i32> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                BillingEvent::BillingError { code, .. } => Some(code.code()),
                _ => None,
            })
            .collect()
    }

    pub fn purchase_data(&self) -> Vec<PurchaseRecord> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                BillingEvent::PurchaseData(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &BillingEvent) -> usize {
        lock(&self.events).iter().filter(|e| *e == wanted).count()
    }

    fn push(&self, event: BillingEvent) {
        lock(&self.events).push(event);
    }
}

impl BillingEventHandler for RecordingEventHandler {
    fn on_product_purchased(&self, product_id: &str, already_owned: bool) {
        self.push(BillingEvent::ProductPurchased {
            product_id: product_id.to_string(),
            already_owned,
        });
    }

    fn on_purchase_history_restored(&self) {
        self.push(BillingEvent::PurchaseHistoryRestored);
    }

    fn on_billing_error(&self, code: BillingErrorCode, cause: Option<&BillingError>) {
        self.push(BillingEvent::BillingError {
            code,
            cause: cause.cloned(),
        });
    }

    fn on_billing_initialized(&self) {
        self.push(BillingEvent::BillingInitialized);
    }

    fn on_purchase_data(&self, record: &PurchaseRecord) {
        self.push(BillingEvent::PurchaseData(record.clone()));
    }

    fn on_product_list(&self, products: &[ProductDetails]) {
        self.push(BillingEvent::ProductList(products.to_vec()));
    }
}

/// Launcher that records launches instead of starting a flow.
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<(FlowHandle, i32)>>,
    lost_context: Mutex<bool>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent launches fail as if the host had no foreground context.
    pub fn lose_context(&self, lost: bool) {
        *lock(&self.lost_context) = lost;
    }

    pub fn launched(&self) -> Vec<(FlowHandle, i32)> {
        lock(&self.launched).clone()
    }
}

impl FlowLauncher for RecordingLauncher {
    fn launch(&self, handle: &FlowHandle, request_code: i32) -> Result<()> {
        if *lock(&self.lost_context) {
            return Err(BillingError::LostContext(format!(
                "no context to launch {}",
                handle.as_str()
            )));
        }
        lock(&self.launched).push((handle.clone(), request_code));
        Ok(())
    }
}
