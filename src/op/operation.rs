use crate::error::{Error, Result};
use crate::ledger::{AdjustmentKind, OrderLine, OrderStatus, PointKind};
use serde::{Deserialize, Serialize};

/// Settlement operation: every write to the ledger is one of these,
/// validated against the current state and applied deterministically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SettlementOp {
    /// Create the settlement view of an order with one fulfillment slot
    /// per distinct vendor.
    OpenOrder {
        order_id: String,
        customer_id: String,
        lines: Vec<OrderLine>,
    },

    /// Create the pending payment for one vendor of an order. The amount
    /// is recomputed from the order's vendor lines; the commission is
    /// resolved by the caller and stored immutably on the payment.
    CreatePayment {
        order_id: String,
        vendor_id: String,
        method: String,
        transaction_ref: String,
        commission_percent: f64,
    },

    /// Pending -> Confirmed, order-wide.
    ConfirmOrder { order_id: String },

    /// Vendor-scoped fulfillment progress. The transition into `Delivered`
    /// realizes that vendor's payment.
    UpdateFulfillment {
        order_id: String,
        vendor_id: String,
        status: OrderStatus,
    },

    /// Pending -> Cancelled. Payments stay pending; stock restoration is
    /// handled by the engine through the inventory port.
    CancelOrder { order_id: String },

    /// Administrative transition: pending payment -> failed.
    MarkPaymentFailed {
        order_id: String,
        vendor_id: String,
        reason: String,
    },

    /// Mark the payment refunded and enqueue the durable reconciliation
    /// task in one atomic apply. Issued only after the gateway call
    /// succeeded.
    RecordGatewayRefund {
        order_id: String,
        vendor_id: String,
        kind: AdjustmentKind,
        amount: f64,
        reason: String,
        gateway_refund_ref: String,
        support_ticket_id: Option<String>,
        processed_by: String,
    },

    /// Create the revenue adjustment owed by a refund task, using the
    /// payment's stored commission. Idempotent once recorded.
    RecordRefundAdjustment {
        task_id: String,
        adjustment_id: String,
    },

    /// Credit the customer's points ledger at the fixed refund rate.
    /// Idempotent once credited.
    CreditRefundPoints { task_id: String },

    /// Close a refund task whose bookkeeping steps are all done.
    CompleteRefundTask { task_id: String },

    /// Append a credit to a customer's points ledger (creates the ledger
    /// on first use).
    AddPoints {
        customer_id: String,
        points: u64,
        kind: PointKind,
        description: String,
        order_id: Option<String>,
        payment_ref: Option<String>,
    },

    /// Redeem points against an order.
    UsePoints {
        customer_id: String,
        points: u64,
        description: String,
        order_id: String,
    },

    /// Expiry sweep for one customer: flip due earned credits inactive and
    /// book the synthetic expired transaction.
    ExpirePoints { customer_id: String },
}

impl SettlementOp {
    /// Short operation name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            SettlementOp::OpenOrder { .. } => "open-order",
            SettlementOp::CreatePayment { .. } => "create-payment",
            SettlementOp::ConfirmOrder { .. } => "confirm-order",
            SettlementOp::UpdateFulfillment { .. } => "update-fulfillment",
            SettlementOp::CancelOrder { .. } => "cancel-order",
            SettlementOp::MarkPaymentFailed { .. } => "mark-payment-failed",
            SettlementOp::RecordGatewayRefund { .. } => "record-gateway-refund",
            SettlementOp::RecordRefundAdjustment { .. } => "record-refund-adjustment",
            SettlementOp::CreditRefundPoints { .. } => "credit-refund-points",
            SettlementOp::CompleteRefundTask { .. } => "complete-refund-task",
            SettlementOp::AddPoints { .. } => "add-points",
            SettlementOp::UsePoints { .. } => "use-points",
            SettlementOp::ExpirePoints { .. } => "expire-points",
        }
    }
}

/// Operation envelope: who performed it and when. Timestamps are recorded
/// here once at submission so replay reproduces state bit-for-bit without
/// consulting a wall clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpRecord {
    pub actor: String,
    pub timestamp: i64,
    pub op: SettlementOp,
}

impl OpRecord {
    pub fn new(actor: String, timestamp: i64, op: SettlementOp) -> Self {
        OpRecord {
            actor,
            timestamp,
            op,
        }
    }
}

/// Deserialize an op record from bincode bytes (log storage format).
pub fn deserialize_op_bincode(bytes: &[u8]) -> Result<OpRecord> {
    bincode::deserialize(bytes)
        .map_err(|e| Error::StateError(format!("Failed to deserialize op record: {}", e)))
}
