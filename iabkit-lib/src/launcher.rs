use crate::types::FlowHandle;
use crate::Result;

/// Platform hook that starts the external consent/payment flow.
///
/// The flow's result is delivered later through
/// [`PurchaseSession::handle_flow_result`](crate::PurchaseSession::handle_flow_result)
/// with the same `request_code`.
pub trait FlowLauncher: Send + Sync {
    /// Start the flow described by `handle`.
    ///
    /// Returns [`BillingError::LostContext`](crate::BillingError::LostContext)
    /// when the platform has nothing to launch from.
    fn launch(&self, handle: &FlowHandle, request_code: i32) -> Result<()>;
}
