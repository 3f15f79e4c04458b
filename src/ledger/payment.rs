use rand::Rng;
use serde::{Deserialize, Serialize};

/// Payment status lifecycle.
///
/// `pending -> {completed, failed}`; `completed -> refunded`. There is no
/// path from `failed` back to `pending`, and a cancelled order leaves its
/// payment permanently `pending`: no money was ever realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Refund details attached to a refunded payment. The payment's own split
/// fields are never rewritten; corrections live in the adjustment ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundDetail {
    pub amount: f64,
    pub reason: String,
    pub refunded_at: i64,
    pub processed_by: String,
    pub gateway_refund_ref: String,
}

/// Payment aggregate: one per (order, vendor) pair.
///
/// Invariants:
/// - `vendor_earnings + platform_revenue == amount` (f64 epsilon)
/// - `commission_percent` is resolved once at creation and never changes
/// - `transaction_ref` is globally unique
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub transaction_ref: String,
    pub order_id: String,
    pub vendor_id: String,
    pub amount: f64,
    /// Platform commission in percent, as applied at creation time.
    pub commission_percent: f64,
    pub vendor_earnings: f64,
    pub platform_revenue: f64,
    pub method: String,
    pub status: PaymentStatus,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub refund: Option<RefundDetail>,
}

impl Payment {
    pub fn pending(
        transaction_ref: String,
        order_id: String,
        vendor_id: String,
        amount: f64,
        commission_percent: f64,
        method: String,
        created_at: i64,
    ) -> Self {
        let vendor_earnings = amount * vendor_share(commission_percent);
        Payment {
            transaction_ref,
            order_id,
            vendor_id,
            amount,
            commission_percent,
            vendor_earnings,
            // Remainder, so the two shares always sum to the exact amount.
            platform_revenue: amount - vendor_earnings,
            method,
            status: PaymentStatus::Pending,
            created_at,
            completed_at: None,
            refund: None,
        }
    }

    /// Vendor's fraction of the amount, derived from the stored commission.
    pub fn vendor_share(&self) -> f64 {
        vendor_share(self.commission_percent)
    }

    /// Realize the payment. Returns `false` when already completed (no-op),
    /// so duplicate delivery confirmations settle exactly once.
    pub fn complete(&mut self, completed_at: i64) -> bool {
        if self.status == PaymentStatus::Completed {
            return false;
        }
        self.status = PaymentStatus::Completed;
        self.completed_at = Some(completed_at);
        true
    }

    pub fn fail(&mut self) {
        self.status = PaymentStatus::Failed;
    }

    pub fn refund(&mut self, detail: RefundDetail) {
        self.status = PaymentStatus::Refunded;
        self.refund = Some(detail);
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Generate a transaction reference: creation timestamp plus a random
    /// hex suffix. The entropy makes collisions vanishingly unlikely;
    /// validation still rejects a duplicate outright rather than retrying.
    pub fn new_transaction_ref(now: i64) -> String {
        let suffix: [u8; 6] = rand::thread_rng().gen();
        format!("PAY-{}-{}", now, hex::encode(suffix))
    }
}

/// Vendor's fraction for a platform commission given in percent.
pub fn vendor_share(commission_percent: f64) -> f64 {
    (100.0 - commission_percent) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payment(amount: f64, commission_percent: f64) -> Payment {
        Payment::pending(
            "PAY-1".to_string(),
            "ord-1".to_string(),
            "vendor-a".to_string(),
            amount,
            commission_percent,
            "card".to_string(),
            1_000,
        )
    }

    #[test]
    fn test_default_split() {
        let p = payment(600.0, 15.0);
        assert!((p.vendor_earnings - 510.0).abs() < 1e-9);
        assert!((p.platform_revenue - 90.0).abs() < 1e-9);
        assert_eq!(p.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut p = payment(600.0, 15.0);
        assert!(p.complete(2_000));
        assert!(!p.complete(3_000));
        assert_eq!(p.completed_at, Some(2_000));
    }

    #[test]
    fn test_refund_keeps_split_fields() {
        let mut p = payment(600.0, 15.0);
        p.complete(2_000);
        p.refund(RefundDetail {
            amount: 200.0,
            reason: "damaged item".to_string(),
            refunded_at: 3_000,
            processed_by: "admin-1".to_string(),
            gateway_refund_ref: "RF-1".to_string(),
        });
        assert_eq!(p.status, PaymentStatus::Refunded);
        assert!((p.vendor_earnings - 510.0).abs() < 1e-9);
        assert!((p.platform_revenue - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_transaction_ref_format() {
        let r = Payment::new_transaction_ref(1_700_000_000);
        assert!(r.starts_with("PAY-1700000000-"));
        assert_ne!(r, Payment::new_transaction_ref(1_700_000_000));
    }

    proptest! {
        #[test]
        fn prop_shares_sum_to_amount(
            amount in 0.0f64..1e9,
            commission in 0.0f64..100.0,
        ) {
            let p = payment(amount, commission);
            prop_assert!((p.vendor_earnings + p.platform_revenue - p.amount).abs() < 1e-6);
            prop_assert!(p.vendor_earnings >= 0.0);
            prop_assert!(p.platform_revenue >= -1e-9);
        }
    }
}
