use crate::error::{Error, Result};
use crate::ledger::{LedgerState, OrderStatus, PaymentStatus, PointKind};
use crate::op::{OpRecord, SettlementOp};

/// Validate an operation against the current state. Returns `Ok(())` when
/// the op may be applied; no state is touched here.
pub fn validate(state: &LedgerState, rec: &OpRecord) -> Result<()> {
    match &rec.op {
        SettlementOp::OpenOrder {
            order_id, lines, ..
        } => validate_open_order(state, order_id, lines),
        SettlementOp::CreatePayment {
            order_id,
            vendor_id,
            transaction_ref,
            commission_percent,
            ..
        } => validate_create_payment(state, order_id, vendor_id, transaction_ref, *commission_percent),
        SettlementOp::ConfirmOrder { order_id } => validate_confirm_order(state, order_id),
        SettlementOp::UpdateFulfillment {
            order_id,
            vendor_id,
            status,
        } => validate_update_fulfillment(state, rec, order_id, vendor_id, *status),
        SettlementOp::CancelOrder { order_id } => validate_cancel_order(state, order_id),
        SettlementOp::MarkPaymentFailed {
            order_id,
            vendor_id,
            ..
        } => validate_mark_payment_failed(state, order_id, vendor_id),
        SettlementOp::RecordGatewayRefund {
            order_id,
            vendor_id,
            amount,
            gateway_refund_ref,
            ..
        } => validate_record_gateway_refund(state, order_id, vendor_id, *amount, gateway_refund_ref),
        SettlementOp::RecordRefundAdjustment {
            task_id,
            adjustment_id,
        } => validate_record_refund_adjustment(state, task_id, adjustment_id),
        SettlementOp::CreditRefundPoints { task_id } => validate_task_exists(state, task_id),
        SettlementOp::CompleteRefundTask { task_id } => {
            validate_complete_refund_task(state, task_id)
        }
        SettlementOp::AddPoints { points, kind, .. } => validate_add_points(*points, *kind),
        SettlementOp::UsePoints {
            customer_id,
            points,
            ..
        } => validate_use_points(state, customer_id, *points),
        SettlementOp::ExpirePoints { .. } => Ok(()),
    }
}

fn validate_open_order(
    state: &LedgerState,
    order_id: &str,
    lines: &[crate::ledger::OrderLine],
) -> Result<()> {
    if state.get_order(order_id).is_some() {
        return Err(Error::InvalidOperation(format!(
            "Order {} already exists",
            order_id
        )));
    }
    if lines.is_empty() {
        return Err(Error::InvalidOperation(
            "Order must have at least one line".to_string(),
        ));
    }
    for line in lines {
        if line.quantity == 0 {
            return Err(Error::InvalidOperation(format!(
                "Line {} has zero quantity",
                line.product_id
            )));
        }
        if !(line.unit_price >= 0.0 && line.unit_price.is_finite()) {
            return Err(Error::InvalidOperation(format!(
                "Line {} has invalid unit price",
                line.product_id
            )));
        }
    }
    Ok(())
}

fn validate_create_payment(
    state: &LedgerState,
    order_id: &str,
    vendor_id: &str,
    transaction_ref: &str,
    commission_percent: f64,
) -> Result<()> {
    let order = state
        .get_order(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
    if !order.has_vendor(vendor_id) {
        return Err(Error::InvalidOperation(format!(
            "Order {} has no lines for vendor {}",
            order_id, vendor_id
        )));
    }
    if state.has_payment(order_id, vendor_id) {
        return Err(Error::InvalidOperation(format!(
            "Payment already exists for order {}, vendor {}",
            order_id, vendor_id
        )));
    }
    // Collision on the generated reference is an outright failure; the
    // entropy in the suffix makes a retry loop unnecessary.
    if state.has_transaction_ref(transaction_ref) {
        return Err(Error::InvalidOperation(format!(
            "Transaction reference {} already exists",
            transaction_ref
        )));
    }
    if !(0.0..=100.0).contains(&commission_percent) || !commission_percent.is_finite() {
        return Err(Error::InvalidOperation(format!(
            "Commission percent out of range: {}",
            commission_percent
        )));
    }
    Ok(())
}

fn validate_confirm_order(state: &LedgerState, order_id: &str) -> Result<()> {
    let order = state
        .get_order(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
    if order.status != OrderStatus::Pending {
        return Err(Error::InvalidTransition(format!(
            "Order {} cannot be confirmed from {:?}",
            order_id, order.status
        )));
    }
    Ok(())
}

fn validate_update_fulfillment(
    state: &LedgerState,
    rec: &OpRecord,
    order_id: &str,
    vendor_id: &str,
    status: OrderStatus,
) -> Result<()> {
    let order = state
        .get_order(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;

    // Fulfillment progress is vendor-scoped: only the owning vendor acts.
    if rec.actor != vendor_id {
        return Err(Error::InvalidOperation(format!(
            "Actor {} does not match vendor {}",
            rec.actor, vendor_id
        )));
    }
    let current = order.fulfillment(vendor_id).ok_or_else(|| {
        Error::InvalidOperation(format!(
            "Order {} has no fulfillment for vendor {}",
            order_id, vendor_id
        ))
    })?;
    if !status.is_vendor_scoped() {
        return Err(Error::InvalidTransition(format!(
            "{:?} is not a vendor-scoped status",
            status
        )));
    }
    if order.is_cancelled() || current == OrderStatus::Cancelled {
        return Err(Error::InvalidTransition(format!(
            "Order {} is cancelled",
            order_id
        )));
    }
    // Forward-only; re-asserting the current status is an idempotent no-op.
    if status.rank() < current.rank() {
        return Err(Error::InvalidTransition(format!(
            "Fulfillment for vendor {} cannot move from {:?} back to {:?}",
            vendor_id, current, status
        )));
    }
    if status == OrderStatus::Delivered {
        let payment = state.get_payment(order_id, vendor_id).ok_or_else(|| {
            Error::PaymentNotFound {
                order_id: order_id.to_string(),
                vendor_id: vendor_id.to_string(),
            }
        })?;
        if matches!(payment.status, PaymentStatus::Failed | PaymentStatus::Refunded) {
            return Err(Error::InvalidTransition(format!(
                "Payment {} cannot be completed from {:?}",
                payment.transaction_ref, payment.status
            )));
        }
    }
    Ok(())
}

fn validate_cancel_order(state: &LedgerState, order_id: &str) -> Result<()> {
    let order = state
        .get_order(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
    if order.status != OrderStatus::Pending {
        return Err(Error::InvalidTransition(format!(
            "Order {} cannot be cancelled from {:?}",
            order_id, order.status
        )));
    }
    Ok(())
}

fn validate_mark_payment_failed(
    state: &LedgerState,
    order_id: &str,
    vendor_id: &str,
) -> Result<()> {
    let payment =
        state
            .get_payment(order_id, vendor_id)
            .ok_or_else(|| Error::PaymentNotFound {
                order_id: order_id.to_string(),
                vendor_id: vendor_id.to_string(),
            })?;
    if !payment.is_pending() {
        return Err(Error::InvalidTransition(format!(
            "Payment {} cannot fail from {:?}",
            payment.transaction_ref, payment.status
        )));
    }
    Ok(())
}

fn validate_record_gateway_refund(
    state: &LedgerState,
    order_id: &str,
    vendor_id: &str,
    amount: f64,
    gateway_refund_ref: &str,
) -> Result<()> {
    let payment =
        state
            .get_payment(order_id, vendor_id)
            .ok_or_else(|| Error::PaymentNotFound {
                order_id: order_id.to_string(),
                vendor_id: vendor_id.to_string(),
            })?;
    if !payment.is_completed() {
        return Err(Error::InvalidTransition(format!(
            "Payment {} cannot be refunded from {:?}",
            payment.transaction_ref, payment.status
        )));
    }
    if !(amount > 0.0) || !amount.is_finite() {
        return Err(Error::InvalidOperation(format!(
            "Refund amount must be positive, got {}",
            amount
        )));
    }
    if amount > payment.amount {
        return Err(Error::InvalidOperation(format!(
            "Refund amount {} exceeds payment amount {}",
            amount, payment.amount
        )));
    }
    if state.get_task(gateway_refund_ref).is_some() {
        return Err(Error::InvalidOperation(format!(
            "Refund task {} already exists",
            gateway_refund_ref
        )));
    }
    Ok(())
}

fn validate_record_refund_adjustment(
    state: &LedgerState,
    task_id: &str,
    adjustment_id: &str,
) -> Result<()> {
    let task = state
        .get_task(task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
    if !task.adjustment_recorded && state.get_adjustment(adjustment_id).is_some() {
        return Err(Error::InvalidOperation(format!(
            "Adjustment {} already exists",
            adjustment_id
        )));
    }
    if state.get_payment_by_ref(&task.payment_ref).is_none() {
        return Err(Error::PaymentNotFound {
            order_id: task.order_id.clone(),
            vendor_id: task.vendor_id.clone(),
        });
    }
    Ok(())
}

fn validate_task_exists(state: &LedgerState, task_id: &str) -> Result<()> {
    state
        .get_task(task_id)
        .map(|_| ())
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
}

fn validate_complete_refund_task(state: &LedgerState, task_id: &str) -> Result<()> {
    let task = state
        .get_task(task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
    if task.is_pending() && !task.steps_done() {
        return Err(Error::InvalidOperation(format!(
            "Refund task {} still owes: {}",
            task_id,
            task.remaining_steps().join(", ")
        )));
    }
    Ok(())
}

fn validate_add_points(points: u64, kind: PointKind) -> Result<()> {
    if points == 0 {
        return Err(Error::InvalidOperation(
            "Points must be greater than zero".to_string(),
        ));
    }
    if !kind.is_credit() {
        return Err(Error::InvalidOperation(format!(
            "{:?} is not a credit kind",
            kind
        )));
    }
    Ok(())
}

fn validate_use_points(state: &LedgerState, customer_id: &str, points: u64) -> Result<()> {
    if points == 0 {
        return Err(Error::InvalidOperation(
            "Points must be greater than zero".to_string(),
        ));
    }
    let available = state
        .get_points(customer_id)
        .map(|l| l.available_points)
        .unwrap_or(0);
    if available < points {
        return Err(Error::InsufficientPoints {
            available,
            requested: points,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OrderLine;

    fn rec(actor: &str, op: SettlementOp) -> OpRecord {
        OpRecord::new(actor.to_string(), 1_000, op)
    }

    fn state_with_order() -> LedgerState {
        let mut state = LedgerState::new();
        let open = rec(
            "cust-1",
            SettlementOp::OpenOrder {
                order_id: "ord-1".to_string(),
                customer_id: "cust-1".to_string(),
                lines: vec![OrderLine {
                    product_id: "sku-1".to_string(),
                    quantity: 1,
                    unit_price: 600.0,
                    vendor_id: "vendor-a".to_string(),
                }],
            },
        );
        state = crate::ledger::apply(&state, &open).unwrap();
        state
    }

    #[test]
    fn test_rejects_duplicate_order() {
        let state = state_with_order();
        let op = rec(
            "cust-1",
            SettlementOp::OpenOrder {
                order_id: "ord-1".to_string(),
                customer_id: "cust-1".to_string(),
                lines: vec![OrderLine {
                    product_id: "sku-2".to_string(),
                    quantity: 1,
                    unit_price: 10.0,
                    vendor_id: "vendor-a".to_string(),
                }],
            },
        );
        assert!(validate(&state, &op).is_err());
    }

    #[test]
    fn test_rejects_empty_order() {
        let state = LedgerState::new();
        let op = rec(
            "cust-1",
            SettlementOp::OpenOrder {
                order_id: "ord-2".to_string(),
                customer_id: "cust-1".to_string(),
                lines: vec![],
            },
        );
        assert!(validate(&state, &op).is_err());
    }

    #[test]
    fn test_rejects_payment_for_unknown_vendor() {
        let state = state_with_order();
        let op = rec(
            "admin",
            SettlementOp::CreatePayment {
                order_id: "ord-1".to_string(),
                vendor_id: "vendor-z".to_string(),
                method: "card".to_string(),
                transaction_ref: "PAY-9".to_string(),
                commission_percent: 15.0,
            },
        );
        assert!(validate(&state, &op).is_err());
    }

    #[test]
    fn test_rejects_fulfillment_by_other_vendor() {
        let mut state = state_with_order();
        state = crate::ledger::apply(
            &state,
            &rec(
                "admin",
                SettlementOp::ConfirmOrder {
                    order_id: "ord-1".to_string(),
                },
            ),
        )
        .unwrap();
        let op = rec(
            "vendor-b",
            SettlementOp::UpdateFulfillment {
                order_id: "ord-1".to_string(),
                vendor_id: "vendor-a".to_string(),
                status: OrderStatus::Processing,
            },
        );
        let err = validate(&state, &op).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn test_rejects_use_points_without_balance() {
        let state = LedgerState::new();
        let op = rec(
            "cust-1",
            SettlementOp::UsePoints {
                customer_id: "cust-1".to_string(),
                points: 10,
                description: "checkout".to_string(),
                order_id: "ord-1".to_string(),
            },
        );
        let err = validate(&state, &op).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientPoints {
                available: 0,
                requested: 10
            }
        ));
    }
}
