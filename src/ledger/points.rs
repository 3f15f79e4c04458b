use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Currency units granted per point when redeeming.
pub const DEFAULT_CONVERSION_RATE: f64 = 1.0;

/// Days before an earned transaction expires.
pub const DEFAULT_EXPIRY_WINDOW_DAYS: u32 = 365;

/// Points credited per currency unit on a refund. Fixed rate, independent
/// of the customer's configured conversion rate. Whether that divergence is
/// promotional policy or an oversight is an open product question; both
/// rates are kept as distinct code paths on purpose.
pub const REFUND_POINTS_PER_CURRENCY_UNIT: u64 = 10;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    Earned,
    Used,
    Expired,
    RefundCredit,
    Refund,
}

impl PointKind {
    /// Kinds that increase the balance when appended.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            PointKind::Earned | PointKind::RefundCredit | PointKind::Refund
        )
    }
}

/// One entry of the per-customer transaction log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointTransaction {
    pub kind: PointKind,
    pub points: u64,
    pub description: String,
    pub order_id: Option<String>,
    pub payment_ref: Option<String>,
    pub refund_ref: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub active: bool,
}

/// Loyalty points ledger: one per customer, append-only transaction log
/// plus materialized balances.
///
/// Invariants:
/// - `available_points >= 0`
/// - `available_points == total_points - used_points - sum(expired)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerPoints {
    pub customer_id: String,
    pub total_points: u64,
    pub available_points: u64,
    pub used_points: u64,
    /// Currency units per point when redeeming.
    pub conversion_rate: f64,
    pub expiry_window_days: u32,
    pub transactions: Vec<PointTransaction>,
}

impl CustomerPoints {
    pub fn new(customer_id: String) -> Self {
        CustomerPoints {
            customer_id,
            total_points: 0,
            available_points: 0,
            used_points: 0,
            conversion_rate: DEFAULT_CONVERSION_RATE,
            expiry_window_days: DEFAULT_EXPIRY_WINDOW_DAYS,
            transactions: Vec::new(),
        }
    }

    /// Append a credit transaction and bump both balances.
    ///
    /// `Earned` credits expire after the ledger's window; refund credits
    /// carry no expiry date.
    pub fn add(
        &mut self,
        points: u64,
        kind: PointKind,
        description: String,
        order_id: Option<String>,
        payment_ref: Option<String>,
        refund_ref: Option<String>,
        now: i64,
    ) {
        let expires_at = if kind == PointKind::Earned {
            Some(now + self.expiry_window_days as i64 * SECONDS_PER_DAY)
        } else {
            None
        };
        self.transactions.push(PointTransaction {
            kind,
            points,
            description,
            order_id,
            payment_ref,
            refund_ref,
            created_at: now,
            expires_at,
            active: true,
        });
        self.total_points = self.total_points.saturating_add(points);
        self.available_points = self.available_points.saturating_add(points);
    }

    /// Redeem points against an order. Fails with `InsufficientPoints`
    /// leaving the ledger untouched.
    pub fn use_points(
        &mut self,
        points: u64,
        description: String,
        order_id: String,
        now: i64,
    ) -> Result<()> {
        if self.available_points < points {
            return Err(Error::InsufficientPoints {
                available: self.available_points,
                requested: points,
            });
        }
        self.transactions.push(PointTransaction {
            kind: PointKind::Used,
            points,
            description,
            order_id: Some(order_id),
            payment_ref: None,
            refund_ref: None,
            created_at: now,
            expires_at: None,
            active: true,
        });
        self.available_points -= points;
        self.used_points = self.used_points.saturating_add(points);
        Ok(())
    }

    /// Expire due earned credits: flip each overdue active `Earned`
    /// transaction inactive, append one synthetic `Expired` transaction for
    /// the total, and decrement the available balance, floored at zero.
    ///
    /// Returns the number of points expired (zero when nothing was due).
    pub fn expire_due(&mut self, now: i64) -> u64 {
        let mut expired: u64 = 0;
        for txn in &mut self.transactions {
            if txn.kind == PointKind::Earned && txn.active {
                if let Some(expires_at) = txn.expires_at {
                    if expires_at <= now {
                        txn.active = false;
                        expired = expired.saturating_add(txn.points);
                    }
                }
            }
        }
        if expired == 0 {
            return 0;
        }
        self.transactions.push(PointTransaction {
            kind: PointKind::Expired,
            points: expired,
            description: format!("{} points expired", expired),
            order_id: None,
            payment_ref: None,
            refund_ref: None,
            created_at: now,
            expires_at: None,
            active: false,
        });
        self.available_points = self.available_points.saturating_sub(expired);
        expired
    }

    /// Earliest expiry among still-active earned credits.
    pub fn next_expiry(&self) -> Option<i64> {
        self.transactions
            .iter()
            .filter(|t| t.kind == PointKind::Earned && t.active)
            .filter_map(|t| t.expires_at)
            .min()
    }

    pub fn points_to_currency(&self, points: u64) -> f64 {
        points as f64 * self.conversion_rate
    }

    pub fn currency_to_points(&self, amount: f64) -> u64 {
        if self.conversion_rate <= 0.0 {
            return 0;
        }
        (amount / self.conversion_rate).floor() as u64
    }

    /// Total points flipped inactive by expiry so far.
    pub fn expired_total(&self) -> u64 {
        self.transactions
            .iter()
            .filter(|t| t.kind == PointKind::Expired)
            .map(|t| t.points)
            .sum()
    }
}

/// Refund credit at the fixed promotional rate: `floor(amount * 10)`.
pub fn refund_credit_points(refund_amount: f64) -> u64 {
    (refund_amount * REFUND_POINTS_PER_CURRENCY_UNIT as f64).floor() as u64
}
