pub mod adjustment;
pub mod apply;
pub mod order;
pub mod payment;
pub mod points;
pub mod task;

pub use adjustment::{AdjustmentKind, AdjustmentReversal, AdjustmentStatus, RevenueAdjustment};
pub use apply::apply;
pub use order::{Order, OrderLine, OrderStatus, PaymentProgress, StatusChange};
pub use payment::{vendor_share, Payment, PaymentStatus, RefundDetail};
pub use points::{
    refund_credit_points, CustomerPoints, PointKind, PointTransaction,
    REFUND_POINTS_PER_CURRENCY_UNIT,
};
pub use task::{RefundTask, TaskStatus};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payment identity: one payment per (order, vendor) pair.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentKey {
    pub order_id: String,
    pub vendor_id: String,
}

impl PaymentKey {
    pub fn new(order_id: String, vendor_id: String) -> Self {
        PaymentKey {
            order_id,
            vendor_id,
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.order_id, self.vendor_id)
    }
}

/// Materialized settlement state: orders, vendor payments, adjustment and
/// points ledgers, and in-flight refund tasks.
///
/// Fully reconstructible by replaying the op log from genesis; every
/// transition is deterministic and side-effect free.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerState {
    /// Orders indexed by order id
    pub orders: HashMap<String, Order>,

    /// Payments indexed by `order_id:vendor_id`
    pub payments: HashMap<String, Payment>,

    /// Transaction reference -> payment key, for uniqueness and lookup
    pub payment_refs: HashMap<String, String>,

    /// Points ledgers indexed by customer id
    pub points: HashMap<String, CustomerPoints>,

    /// Revenue adjustments indexed by adjustment id
    pub adjustments: HashMap<String, RevenueAdjustment>,

    /// Refund reconciliation tasks indexed by task id (gateway refund ref)
    pub refund_tasks: HashMap<String, RefundTask>,
}

impl LedgerState {
    /// Create empty genesis state
    pub fn new() -> Self {
        LedgerState::default()
    }

    pub fn get_order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn get_order_mut(&mut self, order_id: &str) -> Option<&mut Order> {
        self.orders.get_mut(order_id)
    }

    pub fn insert_order(&mut self, order: Order) {
        self.orders.insert(order.order_id.clone(), order);
    }

    pub fn get_payment(&self, order_id: &str, vendor_id: &str) -> Option<&Payment> {
        let key = PaymentKey::new(order_id.to_string(), vendor_id.to_string());
        self.payments.get(&key.key())
    }

    pub fn get_payment_mut(&mut self, order_id: &str, vendor_id: &str) -> Option<&mut Payment> {
        let key = PaymentKey::new(order_id.to_string(), vendor_id.to_string());
        self.payments.get_mut(&key.key())
    }

    pub fn get_payment_by_ref(&self, transaction_ref: &str) -> Option<&Payment> {
        let key = self.payment_refs.get(transaction_ref)?;
        self.payments.get(key)
    }

    /// Insert a payment and index its transaction reference.
    pub fn insert_payment(&mut self, payment: Payment) {
        let key = PaymentKey::new(payment.order_id.clone(), payment.vendor_id.clone()).key();
        self.payment_refs
            .insert(payment.transaction_ref.clone(), key.clone());
        self.payments.insert(key, payment);
    }

    pub fn has_payment(&self, order_id: &str, vendor_id: &str) -> bool {
        self.get_payment(order_id, vendor_id).is_some()
    }

    pub fn has_transaction_ref(&self, transaction_ref: &str) -> bool {
        self.payment_refs.contains_key(transaction_ref)
    }

    /// All payments for an order.
    pub fn order_payments(&self, order_id: &str) -> Vec<&Payment> {
        self.payments
            .values()
            .filter(|p| p.order_id == order_id)
            .collect()
    }

    /// All payments settling for a vendor.
    pub fn vendor_payments(&self, vendor_id: &str) -> Vec<&Payment> {
        self.payments
            .values()
            .filter(|p| p.vendor_id == vendor_id)
            .collect()
    }

    pub fn get_points(&self, customer_id: &str) -> Option<&CustomerPoints> {
        self.points.get(customer_id)
    }

    /// Get or create a customer's points ledger with default settings.
    pub fn get_or_create_points(&mut self, customer_id: &str) -> &mut CustomerPoints {
        self.points
            .entry(customer_id.to_string())
            .or_insert_with(|| CustomerPoints::new(customer_id.to_string()))
    }

    pub fn get_adjustment(&self, adjustment_id: &str) -> Option<&RevenueAdjustment> {
        self.adjustments.get(adjustment_id)
    }

    pub fn insert_adjustment(&mut self, adjustment: RevenueAdjustment) {
        self.adjustments
            .insert(adjustment.adjustment_id.clone(), adjustment);
    }

    pub fn get_task(&self, task_id: &str) -> Option<&RefundTask> {
        self.refund_tasks.get(task_id)
    }

    pub fn get_task_mut(&mut self, task_id: &str) -> Option<&mut RefundTask> {
        self.refund_tasks.get_mut(task_id)
    }

    pub fn insert_task(&mut self, task: RefundTask) {
        self.refund_tasks.insert(task.task_id.clone(), task);
    }

    /// Refund tasks whose bookkeeping is still owed, oldest first.
    pub fn pending_refund_tasks(&self) -> Vec<&RefundTask> {
        let mut tasks: Vec<&RefundTask> = self
            .refund_tasks
            .values()
            .filter(|t| t.is_pending())
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.task_id.clone()));
        tasks
    }

    /// Customers holding active earned credits already past expiry.
    pub fn customers_with_due_points(&self, now: i64) -> Vec<&str> {
        let mut customers: Vec<&str> = self
            .points
            .values()
            .filter(|l| l.next_expiry().map(|e| e <= now).unwrap_or(false))
            .map(|l| l.customer_id.as_str())
            .collect();
        customers.sort_unstable();
        customers
    }

    /// True once every payment of the order is completed.
    pub fn order_fully_paid(&self, order_id: &str) -> bool {
        let payments = self.order_payments(order_id);
        !payments.is_empty() && payments.iter().all(|p| p.is_completed())
    }
}
