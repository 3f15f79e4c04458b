use crate::ledger::payment::vendor_share;
use crate::ledger::points::refund_credit_points;
use serde::{Deserialize, Serialize};

/// What triggered the correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentKind {
    Refund,
    Chargeback,
}

/// Adjustment lifecycle. `Reversed` exists in the state space but no
/// operation currently transitions into it; a reversal tool would fill in
/// the `reversal` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentStatus {
    Pending,
    Processed,
    Reversed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentReversal {
    pub reversed_by: String,
    pub reversed_at: i64,
    pub reason: String,
}

/// Signed correction to previously realized vendor/platform revenue.
///
/// Append-only audit record: one per refund/chargeback event, never
/// mutated after processing. The commission percentage is copied from the
/// payment it corrects, so the adjustment always unwinds the same split
/// the payment realized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueAdjustment {
    pub adjustment_id: String,
    pub kind: AdjustmentKind,
    pub payment_ref: String,
    pub order_id: String,
    pub vendor_id: String,
    pub customer_id: String,
    pub support_ticket_id: Option<String>,
    pub refund_amount: f64,
    /// Platform commission in percent, as applied to this correction.
    pub commission_percent: f64,
    pub original_vendor_earnings: f64,
    pub original_platform_revenue: f64,
    pub vendor_earnings_adjustment: f64,
    pub platform_revenue_adjustment: f64,
    pub adjusted_vendor_earnings: f64,
    pub adjusted_platform_revenue: f64,
    pub points_credited: u64,
    pub status: AdjustmentStatus,
    pub processed_by: String,
    pub processed_at: i64,
    pub reversal: Option<AdjustmentReversal>,
}

impl RevenueAdjustment {
    /// Build a processed adjustment for a refund of `refund_amount` against
    /// a payment of `payment_amount` split at `commission_percent`.
    #[allow(clippy::too_many_arguments)]
    pub fn processed(
        adjustment_id: String,
        kind: AdjustmentKind,
        payment_ref: String,
        order_id: String,
        vendor_id: String,
        customer_id: String,
        support_ticket_id: Option<String>,
        payment_amount: f64,
        refund_amount: f64,
        commission_percent: f64,
        processed_by: String,
        processed_at: i64,
    ) -> Self {
        let share = vendor_share(commission_percent);
        let original_vendor_earnings = payment_amount * share;
        let original_platform_revenue = payment_amount - original_vendor_earnings;
        let vendor_earnings_adjustment = -(refund_amount * share);
        let platform_revenue_adjustment = -(refund_amount - refund_amount * share);
        RevenueAdjustment {
            adjustment_id,
            kind,
            payment_ref,
            order_id,
            vendor_id,
            customer_id,
            support_ticket_id,
            refund_amount,
            commission_percent,
            original_vendor_earnings,
            original_platform_revenue,
            vendor_earnings_adjustment,
            platform_revenue_adjustment,
            adjusted_vendor_earnings: original_vendor_earnings + vendor_earnings_adjustment,
            adjusted_platform_revenue: original_platform_revenue + platform_revenue_adjustment,
            points_credited: refund_credit_points(refund_amount),
            status: AdjustmentStatus::Processed,
            processed_by,
            processed_at,
            reversal: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.status == AdjustmentStatus::Processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(payment_amount: f64, refund_amount: f64, commission: f64) -> RevenueAdjustment {
        RevenueAdjustment::processed(
            "ADJ-1".to_string(),
            AdjustmentKind::Refund,
            "PAY-1".to_string(),
            "ord-1".to_string(),
            "vendor-a".to_string(),
            "cust-1".to_string(),
            Some("ticket-9".to_string()),
            payment_amount,
            refund_amount,
            commission,
            "admin-1".to_string(),
            5_000,
        )
    }

    #[test]
    fn test_refund_adjustment_math() {
        let adj = adjustment(600.0, 200.0, 15.0);
        assert!((adj.vendor_earnings_adjustment - -170.0).abs() < 1e-9);
        assert!((adj.platform_revenue_adjustment - -30.0).abs() < 1e-9);
        assert!((adj.original_vendor_earnings - 510.0).abs() < 1e-9);
        assert!((adj.adjusted_vendor_earnings - 340.0).abs() < 1e-9);
        assert!((adj.adjusted_platform_revenue - 60.0).abs() < 1e-9);
        assert_eq!(adj.points_credited, 2_000);
        assert_eq!(adj.status, AdjustmentStatus::Processed);
    }

    #[test]
    fn test_adjustment_deltas_sum_to_refund() {
        let adj = adjustment(600.0, 137.5, 12.0);
        let total = adj.vendor_earnings_adjustment + adj.platform_revenue_adjustment;
        assert!((total - -137.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_reversal_by_default() {
        let adj = adjustment(600.0, 200.0, 15.0);
        assert!(adj.reversal.is_none());
    }
}
