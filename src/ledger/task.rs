use crate::ledger::adjustment::AdjustmentKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// Durable reconciliation task for a gateway-settled refund.
///
/// Created in the same apply that marks the payment refunded, so the
/// moment money moves at the gateway there is a persistent record of the
/// bookkeeping still owed. A crash between steps leaves the task
/// `Pending`; resuming re-drives only the steps whose flag is still false.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundTask {
    /// Gateway refund reference; doubles as the task identity.
    pub task_id: String,
    pub kind: AdjustmentKind,
    pub payment_ref: String,
    pub order_id: String,
    pub vendor_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub reason: String,
    pub support_ticket_id: Option<String>,
    pub processed_by: String,
    pub adjustment_id: Option<String>,
    pub adjustment_recorded: bool,
    pub points_credited: bool,
    pub status: TaskStatus,
    pub created_at: i64,
}

impl RefundTask {
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        task_id: String,
        kind: AdjustmentKind,
        payment_ref: String,
        order_id: String,
        vendor_id: String,
        customer_id: String,
        amount: f64,
        reason: String,
        support_ticket_id: Option<String>,
        processed_by: String,
        created_at: i64,
    ) -> Self {
        RefundTask {
            task_id,
            kind,
            payment_ref,
            order_id,
            vendor_id,
            customer_id,
            amount,
            reason,
            support_ticket_id,
            processed_by,
            adjustment_id: None,
            adjustment_recorded: false,
            points_credited: false,
            status: TaskStatus::Pending,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// All bookkeeping steps done; the task may be closed.
    pub fn steps_done(&self) -> bool {
        self.adjustment_recorded && self.points_credited
    }

    /// Names of the steps still owed, for operator-facing diagnostics.
    pub fn remaining_steps(&self) -> Vec<&'static str> {
        let mut steps = Vec::new();
        if !self.adjustment_recorded {
            steps.push("revenue-adjustment");
        }
        if !self.points_credited {
            steps.push("points-credit");
        }
        steps
    }
}
