//! Read-only summaries over the ledger state. Pure reads: nothing here
//! mutates a balance or triggers expiry.

use crate::ledger::{AdjustmentKind, LedgerState, PaymentStatus, PointTransaction};
use serde::Serialize;

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: i64,
    pub to: i64,
}

impl DateRange {
    pub fn new(from: i64, to: i64) -> Self {
        DateRange { from, to }
    }

    pub fn contains(&self, at: i64) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Adjustment totals over a window, split by what triggered them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub refund_count: u64,
    pub chargeback_count: u64,
    pub refund_total: f64,
    pub chargeback_total: f64,
    pub vendor_earnings_adjustment_total: f64,
    pub platform_revenue_adjustment_total: f64,
    pub points_credited_total: u64,
}

/// Aggregate adjustment counts and totals over `range`.
pub fn revenue_summary(state: &LedgerState, range: DateRange) -> RevenueSummary {
    let mut summary = RevenueSummary::default();
    for adj in state.adjustments.values() {
        if !range.contains(adj.processed_at) {
            continue;
        }
        match adj.kind {
            AdjustmentKind::Refund => {
                summary.refund_count += 1;
                summary.refund_total += adj.refund_amount;
            }
            AdjustmentKind::Chargeback => {
                summary.chargeback_count += 1;
                summary.chargeback_total += adj.refund_amount;
            }
        }
        summary.vendor_earnings_adjustment_total += adj.vendor_earnings_adjustment;
        summary.platform_revenue_adjustment_total += adj.platform_revenue_adjustment;
        summary.points_credited_total += adj.points_credited;
    }
    summary
}

/// Filter for payment reports; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub vendor_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub range: Option<DateRange>,
}

impl PaymentFilter {
    fn matches(&self, payment: &crate::ledger::Payment) -> bool {
        if let Some(vendor) = &self.vendor_id {
            if &payment.vendor_id != vendor {
                return false;
            }
        }
        if let Some(status) = self.status {
            if payment.status != status {
                return false;
            }
        }
        if let Some(range) = self.range {
            if !range.contains(payment.created_at) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub transaction_ref: String,
    pub order_id: String,
    pub vendor_id: String,
    pub amount: f64,
    pub vendor_earnings: f64,
    pub platform_revenue: f64,
    pub status: PaymentStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentReport {
    pub count: u64,
    pub amount_total: f64,
    pub vendor_earnings_total: f64,
    pub platform_revenue_total: f64,
    pub rows: Vec<PaymentRow>,
}

/// Payment ledger report, filterable by vendor, status, and date range.
pub fn payment_report(state: &LedgerState, filter: &PaymentFilter) -> PaymentReport {
    let mut report = PaymentReport::default();
    let mut rows: Vec<PaymentRow> = state
        .payments
        .values()
        .filter(|p| filter.matches(p))
        .map(|p| PaymentRow {
            transaction_ref: p.transaction_ref.clone(),
            order_id: p.order_id.clone(),
            vendor_id: p.vendor_id.clone(),
            amount: p.amount,
            vendor_earnings: p.vendor_earnings,
            platform_revenue: p.platform_revenue,
            status: p.status,
            created_at: p.created_at,
        })
        .collect();
    rows.sort_by(|a, b| {
        (a.created_at, &a.transaction_ref).cmp(&(b.created_at, &b.transaction_ref))
    });
    for row in &rows {
        report.count += 1;
        report.amount_total += row.amount;
        report.vendor_earnings_total += row.vendor_earnings;
        report.platform_revenue_total += row.platform_revenue;
    }
    report.rows = rows;
    report
}

/// Customer-facing balances and history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsStatement {
    pub customer_id: String,
    pub total_points: u64,
    pub available_points: u64,
    pub used_points: u64,
    pub transactions: Vec<PointTransaction>,
}

/// Balance and transaction-history read. Never mutates: expiry is booked
/// by the scheduled sweep, not by reads.
pub fn points_statement(state: &LedgerState, customer_id: &str) -> PointsStatement {
    match state.get_points(customer_id) {
        Some(ledger) => PointsStatement {
            customer_id: ledger.customer_id.clone(),
            total_points: ledger.total_points,
            available_points: ledger.available_points,
            used_points: ledger.used_points,
            transactions: ledger.transactions.clone(),
        },
        None => PointsStatement {
            customer_id: customer_id.to_string(),
            total_points: 0,
            available_points: 0,
            used_points: 0,
            transactions: Vec::new(),
        },
    }
}
