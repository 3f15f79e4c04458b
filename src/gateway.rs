//! Payment gateway port: the external processor that actually moves money.
//!
//! The settlement core never mutates its ledgers on a gateway failure, and
//! treats a successful gateway refund as irreversible: from that moment the
//! local bookkeeping is owed and tracked by a durable refund task.

use crate::error::Result;

/// Outcome of initiating a payment at the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub success: bool,
    pub transaction_ref: String,
    /// Checkout URL the customer is sent to, when the gateway uses one.
    pub redirect_target: Option<String>,
}

/// Outcome of a payment status check.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayStatus {
    pub success: bool,
    pub status: String,
}

/// Outcome of a refund call.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRefund {
    pub success: bool,
    /// Gateway-issued reference for the refund; identifies the
    /// reconciliation task locally.
    pub refund_ref: String,
}

/// External payment-gateway capability.
///
/// Implementations wrap a concrete processor's API. Calls are synchronous
/// from the core's point of view; an `Err` means no money is known to have
/// moved, while `success: false` in a response is a gateway-side decline.
pub trait PaymentGateway {
    fn create_payment(
        &mut self,
        amount: f64,
        currency: &str,
        order_ref: &str,
        customer: &str,
    ) -> Result<GatewayPayment>;

    fn verify_payment(&mut self, transaction_ref: &str) -> Result<GatewayStatus>;

    /// Refund `amount` against a previously settled payment. The
    /// idempotency key lets the gateway dedupe a retried call after a
    /// client-side timeout.
    fn refund_transaction(
        &mut self,
        payment_ref: &str,
        amount: f64,
        original_transaction_ref: &str,
        idempotency_key: &str,
    ) -> Result<GatewayRefund>;
}
