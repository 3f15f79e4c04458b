use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Also used as the per-vendor fulfillment sub-status: a multi-vendor order
/// keeps one sub-status per vendor, and the order-level status is derived
/// from them (least-advanced vendor wins). `Delivered` is terminal for
/// settlement: it realizes that vendor's payment exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Progress rank for transition checks and order-level aggregation.
    /// `Cancelled` has no rank; it is handled order-wide.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Processing => 2,
            OrderStatus::Shipped => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => 0,
        }
    }

    pub fn is_vendor_scoped(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

/// Whether the order's vendor payments have been realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentProgress {
    /// No vendor payment completed yet.
    Unpaid,
    /// Some vendor payments completed, others still pending.
    PartiallyPaid,
    /// Every vendor payment completed.
    Paid,
}

/// One purchasable line of an order, owned by the vendor that fulfills it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub vendor_id: String,
}

impl OrderLine {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// Append-only status history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub changed_by: String,
    pub changed_at: i64,
}

/// Order aggregate as seen by the settlement core.
///
/// Invariants:
/// - `history` is append-only; every order-level status change is stamped
/// - each vendor's sub-status only moves forward, except Cancelled from Pending
/// - the order-level `status` is always `derive_status()` of the sub-statuses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub payment_progress: PaymentProgress,
    /// Per-vendor fulfillment sub-status, keyed by vendor id.
    pub fulfillments: Vec<(String, OrderStatus)>,
    pub history: Vec<StatusChange>,
    pub created_at: i64,
}

impl Order {
    pub fn new(
        order_id: String,
        customer_id: String,
        lines: Vec<OrderLine>,
        created_by: &str,
        created_at: i64,
    ) -> Self {
        let mut fulfillments: Vec<(String, OrderStatus)> = Vec::new();
        for line in &lines {
            if !fulfillments.iter().any(|(v, _)| v == &line.vendor_id) {
                fulfillments.push((line.vendor_id.clone(), OrderStatus::Pending));
            }
        }
        Order {
            order_id,
            customer_id,
            lines,
            status: OrderStatus::Pending,
            payment_progress: PaymentProgress::Unpaid,
            fulfillments,
            history: vec![StatusChange {
                status: OrderStatus::Pending,
                changed_by: created_by.to_string(),
                changed_at: created_at,
            }],
            created_at,
        }
    }

    /// Distinct vendors participating in this order, in line order.
    pub fn vendor_ids(&self) -> Vec<&str> {
        self.fulfillments.iter().map(|(v, _)| v.as_str()).collect()
    }

    pub fn has_vendor(&self, vendor_id: &str) -> bool {
        self.fulfillments.iter().any(|(v, _)| v == vendor_id)
    }

    pub fn fulfillment(&self, vendor_id: &str) -> Option<OrderStatus> {
        self.fulfillments
            .iter()
            .find(|(v, _)| v == vendor_id)
            .map(|(_, s)| *s)
    }

    pub fn set_fulfillment(&mut self, vendor_id: &str, status: OrderStatus) {
        if let Some(entry) = self.fulfillments.iter_mut().find(|(v, _)| v == vendor_id) {
            entry.1 = status;
        }
    }

    /// Sum of the given vendor's line subtotals.
    pub fn vendor_amount(&self, vendor_id: &str) -> f64 {
        self.lines
            .iter()
            .filter(|l| l.vendor_id == vendor_id)
            .map(|l| l.subtotal())
            .sum()
    }

    pub fn vendor_lines(&self, vendor_id: &str) -> Vec<&OrderLine> {
        self.lines
            .iter()
            .filter(|l| l.vendor_id == vendor_id)
            .collect()
    }

    pub fn total_amount(&self) -> f64 {
        self.lines.iter().map(|l| l.subtotal()).sum()
    }

    /// Order-level status derived from the vendor sub-statuses: the
    /// least-advanced vendor determines overall progress, so the order is
    /// `Delivered` only once every vendor has delivered.
    pub fn derive_status(&self) -> OrderStatus {
        if self
            .fulfillments
            .iter()
            .all(|(_, s)| *s == OrderStatus::Cancelled)
        {
            return OrderStatus::Cancelled;
        }
        self.fulfillments
            .iter()
            .map(|(_, s)| *s)
            .min_by_key(|s| s.rank())
            .unwrap_or(OrderStatus::Pending)
    }

    /// Re-derive the order-level status; append a history entry when it moves.
    pub fn refresh_status(&mut self, changed_by: &str, changed_at: i64) {
        let derived = self.derive_status();
        if derived != self.status {
            self.status = derived;
            self.history.push(StatusChange {
                status: derived,
                changed_by: changed_by.to_string(),
                changed_at,
            });
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}
