use crate::error::{Error, Result};
use crate::ledger::{
    refund_credit_points, LedgerState, Order, OrderStatus, Payment, PaymentProgress, PointKind,
    RefundDetail, RefundTask, RevenueAdjustment, TaskStatus,
};
use crate::op::validation::validate;
use crate::op::{OpRecord, SettlementOp};

/// Apply one operation to the state, returning the next state.
///
/// Validation runs first; an invalid op leaves the input untouched. The
/// transition is deterministic: all timestamps come from the op envelope,
/// never from a wall clock, so replaying the log reproduces state exactly.
pub fn apply(state: &LedgerState, rec: &OpRecord) -> Result<LedgerState> {
    validate(state, rec)?;
    let mut next = state.clone();
    match &rec.op {
        SettlementOp::OpenOrder {
            order_id,
            customer_id,
            lines,
        } => {
            next.insert_order(Order::new(
                order_id.clone(),
                customer_id.clone(),
                lines.clone(),
                &rec.actor,
                rec.timestamp,
            ));
        }
        SettlementOp::CreatePayment {
            order_id,
            vendor_id,
            method,
            transaction_ref,
            commission_percent,
        } => {
            apply_create_payment(
                &mut next,
                order_id,
                vendor_id,
                method,
                transaction_ref,
                *commission_percent,
                rec.timestamp,
            )?;
        }
        SettlementOp::ConfirmOrder { order_id } => {
            apply_confirm_order(&mut next, order_id, &rec.actor, rec.timestamp)?;
        }
        SettlementOp::UpdateFulfillment {
            order_id,
            vendor_id,
            status,
        } => {
            apply_update_fulfillment(&mut next, order_id, vendor_id, *status, rec.timestamp)?;
        }
        SettlementOp::CancelOrder { order_id } => {
            apply_cancel_order(&mut next, order_id, &rec.actor, rec.timestamp)?;
        }
        SettlementOp::MarkPaymentFailed {
            order_id,
            vendor_id,
            ..
        } => {
            let payment = next
                .get_payment_mut(order_id, vendor_id)
                .ok_or_else(|| Error::PaymentNotFound {
                    order_id: order_id.clone(),
                    vendor_id: vendor_id.clone(),
                })?;
            payment.fail();
        }
        SettlementOp::RecordGatewayRefund {
            order_id,
            vendor_id,
            kind,
            amount,
            reason,
            gateway_refund_ref,
            support_ticket_id,
            processed_by,
        } => {
            apply_record_gateway_refund(
                &mut next,
                order_id,
                vendor_id,
                *kind,
                *amount,
                reason,
                gateway_refund_ref,
                support_ticket_id.clone(),
                processed_by,
                rec.timestamp,
            )?;
        }
        SettlementOp::RecordRefundAdjustment {
            task_id,
            adjustment_id,
        } => {
            apply_record_refund_adjustment(&mut next, task_id, adjustment_id, rec.timestamp)?;
        }
        SettlementOp::CreditRefundPoints { task_id } => {
            apply_credit_refund_points(&mut next, task_id, rec.timestamp)?;
        }
        SettlementOp::CompleteRefundTask { task_id } => {
            let task = next
                .get_task_mut(task_id)
                .ok_or_else(|| Error::TaskNotFound(task_id.clone()))?;
            task.status = TaskStatus::Completed;
        }
        SettlementOp::AddPoints {
            customer_id,
            points,
            kind,
            description,
            order_id,
            payment_ref,
        } => {
            next.get_or_create_points(customer_id).add(
                *points,
                *kind,
                description.clone(),
                order_id.clone(),
                payment_ref.clone(),
                None,
                rec.timestamp,
            );
        }
        SettlementOp::UsePoints {
            customer_id,
            points,
            description,
            order_id,
        } => {
            next.get_or_create_points(customer_id).use_points(
                *points,
                description.clone(),
                order_id.clone(),
                rec.timestamp,
            )?;
        }
        SettlementOp::ExpirePoints { customer_id } => {
            // No ledger, nothing to sweep.
            if let Some(ledger) = next.points.get_mut(customer_id) {
                ledger.expire_due(rec.timestamp);
            }
        }
    }
    Ok(next)
}

fn apply_create_payment(
    state: &mut LedgerState,
    order_id: &str,
    vendor_id: &str,
    method: &str,
    transaction_ref: &str,
    commission_percent: f64,
    now: i64,
) -> Result<()> {
    let amount = state
        .get_order(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?
        .vendor_amount(vendor_id);
    state.insert_payment(Payment::pending(
        transaction_ref.to_string(),
        order_id.to_string(),
        vendor_id.to_string(),
        amount,
        commission_percent,
        method.to_string(),
        now,
    ));
    Ok(())
}

fn apply_confirm_order(
    state: &mut LedgerState,
    order_id: &str,
    actor: &str,
    now: i64,
) -> Result<()> {
    let order = state
        .get_order_mut(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
    let vendors: Vec<String> = order.vendor_ids().iter().map(|v| v.to_string()).collect();
    for vendor in &vendors {
        order.set_fulfillment(vendor, OrderStatus::Confirmed);
    }
    order.refresh_status(actor, now);
    Ok(())
}

fn apply_update_fulfillment(
    state: &mut LedgerState,
    order_id: &str,
    vendor_id: &str,
    status: OrderStatus,
    now: i64,
) -> Result<()> {
    let current = state
        .get_order(order_id)
        .and_then(|o| o.fulfillment(vendor_id))
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;

    // Re-asserting the current sub-status is an idempotent no-op: no
    // history entry and, for Delivered, no second settlement.
    if current == status {
        return Ok(());
    }

    if status == OrderStatus::Delivered {
        let payment = state
            .get_payment_mut(order_id, vendor_id)
            .ok_or_else(|| Error::PaymentNotFound {
                order_id: order_id.to_string(),
                vendor_id: vendor_id.to_string(),
            })?;
        payment.complete(now);
    }

    let progress = order_payment_progress(state, order_id);
    let order = state
        .get_order_mut(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
    order.set_fulfillment(vendor_id, status);
    order.payment_progress = progress;
    order.refresh_status(vendor_id, now);
    Ok(())
}

fn apply_cancel_order(
    state: &mut LedgerState,
    order_id: &str,
    actor: &str,
    now: i64,
) -> Result<()> {
    let order = state
        .get_order_mut(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
    let vendors: Vec<String> = order.vendor_ids().iter().map(|v| v.to_string()).collect();
    for vendor in &vendors {
        order.set_fulfillment(vendor, OrderStatus::Cancelled);
    }
    order.refresh_status(actor, now);
    Ok(())
}

/// Realized-payment progress for an order: `Paid` once every vendor's
/// payment is completed, `PartiallyPaid` as soon as one is.
fn order_payment_progress(state: &LedgerState, order_id: &str) -> PaymentProgress {
    let order = match state.get_order(order_id) {
        Some(o) => o,
        None => return PaymentProgress::Unpaid,
    };
    let vendors = order.vendor_ids();
    let completed = vendors
        .iter()
        .filter(|v| {
            state
                .get_payment(order_id, v)
                .map(|p| p.is_completed())
                .unwrap_or(false)
        })
        .count();
    if completed == 0 {
        PaymentProgress::Unpaid
    } else if completed == vendors.len() {
        PaymentProgress::Paid
    } else {
        PaymentProgress::PartiallyPaid
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_record_gateway_refund(
    state: &mut LedgerState,
    order_id: &str,
    vendor_id: &str,
    kind: crate::ledger::AdjustmentKind,
    amount: f64,
    reason: &str,
    gateway_refund_ref: &str,
    support_ticket_id: Option<String>,
    processed_by: &str,
    now: i64,
) -> Result<()> {
    let customer_id = state
        .get_order(order_id)
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?
        .customer_id
        .clone();
    let payment = state
        .get_payment_mut(order_id, vendor_id)
        .ok_or_else(|| Error::PaymentNotFound {
            order_id: order_id.to_string(),
            vendor_id: vendor_id.to_string(),
        })?;
    let payment_ref = payment.transaction_ref.clone();
    payment.refund(RefundDetail {
        amount,
        reason: reason.to_string(),
        refunded_at: now,
        processed_by: processed_by.to_string(),
        gateway_refund_ref: gateway_refund_ref.to_string(),
    });
    state.insert_task(RefundTask::pending(
        gateway_refund_ref.to_string(),
        kind,
        payment_ref,
        order_id.to_string(),
        vendor_id.to_string(),
        customer_id,
        amount,
        reason.to_string(),
        support_ticket_id,
        processed_by.to_string(),
        now,
    ));
    Ok(())
}

fn apply_record_refund_adjustment(
    state: &mut LedgerState,
    task_id: &str,
    adjustment_id: &str,
    now: i64,
) -> Result<()> {
    let task = state
        .get_task(task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?
        .clone();
    if task.adjustment_recorded {
        return Ok(());
    }
    let payment = state
        .get_payment_by_ref(&task.payment_ref)
        .ok_or_else(|| Error::PaymentNotFound {
            order_id: task.order_id.clone(),
            vendor_id: task.vendor_id.clone(),
        })?;
    let adjustment = RevenueAdjustment::processed(
        adjustment_id.to_string(),
        task.kind,
        task.payment_ref.clone(),
        task.order_id.clone(),
        task.vendor_id.clone(),
        task.customer_id.clone(),
        task.support_ticket_id.clone(),
        payment.amount,
        task.amount,
        // The split stored on the payment at creation is the single source
        // of truth for any later correction.
        payment.commission_percent,
        task.processed_by.clone(),
        now,
    );
    state.insert_adjustment(adjustment);
    let task = state
        .get_task_mut(task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
    task.adjustment_recorded = true;
    task.adjustment_id = Some(adjustment_id.to_string());
    Ok(())
}

fn apply_credit_refund_points(state: &mut LedgerState, task_id: &str, now: i64) -> Result<()> {
    let task = state
        .get_task(task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?
        .clone();
    if task.points_credited {
        return Ok(());
    }
    let points = refund_credit_points(task.amount);
    if points > 0 {
        state.get_or_create_points(&task.customer_id).add(
            points,
            PointKind::RefundCredit,
            format!("Refund credit for order {}", task.order_id),
            Some(task.order_id.clone()),
            Some(task.payment_ref.clone()),
            Some(task.task_id.clone()),
            now,
        );
    }
    let task = state
        .get_task_mut(task_id)
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
    task.points_credited = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AdjustmentKind, OrderLine};

    fn rec(actor: &str, at: i64, op: SettlementOp) -> OpRecord {
        OpRecord::new(actor.to_string(), at, op)
    }

    fn open_two_vendor_order(state: &LedgerState) -> LedgerState {
        let mut s = apply(
            state,
            &rec(
                "cust-1",
                1_000,
                SettlementOp::OpenOrder {
                    order_id: "ord-1".to_string(),
                    customer_id: "cust-1".to_string(),
                    lines: vec![
                        OrderLine {
                            product_id: "sku-1".to_string(),
                            quantity: 2,
                            unit_price: 300.0,
                            vendor_id: "vendor-a".to_string(),
                        },
                        OrderLine {
                            product_id: "sku-2".to_string(),
                            quantity: 1,
                            unit_price: 400.0,
                            vendor_id: "vendor-b".to_string(),
                        },
                    ],
                },
            ),
        )
        .unwrap();
        for (vendor, txn) in [("vendor-a", "PAY-A"), ("vendor-b", "PAY-B")] {
            s = apply(
                &s,
                &rec(
                    "admin",
                    1_000,
                    SettlementOp::CreatePayment {
                        order_id: "ord-1".to_string(),
                        vendor_id: vendor.to_string(),
                        method: "card".to_string(),
                        transaction_ref: txn.to_string(),
                        commission_percent: 15.0,
                    },
                ),
            )
            .unwrap();
        }
        apply(
            &s,
            &rec(
                "admin",
                1_100,
                SettlementOp::ConfirmOrder {
                    order_id: "ord-1".to_string(),
                },
            ),
        )
        .unwrap()
    }

    fn deliver(state: &LedgerState, vendor: &str, at: i64) -> LedgerState {
        apply(
            state,
            &rec(
                vendor,
                at,
                SettlementOp::UpdateFulfillment {
                    order_id: "ord-1".to_string(),
                    vendor_id: vendor.to_string(),
                    status: OrderStatus::Delivered,
                },
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_open_order_creates_payments_split() {
        let state = open_two_vendor_order(&LedgerState::new());
        let pa = state.get_payment("ord-1", "vendor-a").unwrap();
        let pb = state.get_payment("ord-1", "vendor-b").unwrap();
        assert_eq!(pa.amount, 600.0);
        assert_eq!(pb.amount, 400.0);
        assert!((pa.vendor_earnings - 510.0).abs() < 1e-9);
        assert!((pa.platform_revenue - 90.0).abs() < 1e-9);
        assert!((pb.vendor_earnings - 340.0).abs() < 1e-9);
        assert!((pb.platform_revenue - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_delivery_completes_only_that_vendor() {
        let state = open_two_vendor_order(&LedgerState::new());
        let state = deliver(&state, "vendor-a", 2_000);

        let pa = state.get_payment("ord-1", "vendor-a").unwrap();
        let pb = state.get_payment("ord-1", "vendor-b").unwrap();
        assert!(pa.is_completed());
        assert_eq!(pa.completed_at, Some(2_000));
        assert!(pb.is_pending());

        let order = state.get_order("ord-1").unwrap();
        assert_eq!(order.payment_progress, PaymentProgress::PartiallyPaid);
        // Order-level status lags the slowest vendor.
        assert_eq!(order.status, OrderStatus::Confirmed);

        let state = deliver(&state, "vendor-b", 3_000);
        let order = state.get_order("ord-1").unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.payment_progress, PaymentProgress::Paid);
    }

    #[test]
    fn test_duplicate_delivery_is_noop() {
        let state = open_two_vendor_order(&LedgerState::new());
        let state = deliver(&state, "vendor-a", 2_000);
        let history_len = state.get_order("ord-1").unwrap().history.len();

        let again = deliver(&state, "vendor-a", 9_000);
        let pa = again.get_payment("ord-1", "vendor-a").unwrap();
        assert_eq!(pa.completed_at, Some(2_000));
        assert_eq!(again.get_order("ord-1").unwrap().history.len(), history_len);
        assert_eq!(again, state);
    }

    #[test]
    fn test_cancel_leaves_payments_pending() {
        let mut state = LedgerState::new();
        state = apply(
            &state,
            &rec(
                "cust-1",
                1_000,
                SettlementOp::OpenOrder {
                    order_id: "ord-1".to_string(),
                    customer_id: "cust-1".to_string(),
                    lines: vec![OrderLine {
                        product_id: "sku-1".to_string(),
                        quantity: 1,
                        unit_price: 100.0,
                        vendor_id: "vendor-a".to_string(),
                    }],
                },
            ),
        )
        .unwrap();
        state = apply(
            &state,
            &rec(
                "admin",
                1_000,
                SettlementOp::CreatePayment {
                    order_id: "ord-1".to_string(),
                    vendor_id: "vendor-a".to_string(),
                    method: "card".to_string(),
                    transaction_ref: "PAY-A".to_string(),
                    commission_percent: 15.0,
                },
            ),
        )
        .unwrap();
        state = apply(
            &state,
            &rec(
                "cust-1",
                1_500,
                SettlementOp::CancelOrder {
                    order_id: "ord-1".to_string(),
                },
            ),
        )
        .unwrap();

        let order = state.get_order("ord-1").unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        // No money was ever realized.
        assert!(state.get_payment("ord-1", "vendor-a").unwrap().is_pending());

        // Delivery on a cancelled order is rejected.
        let err = apply(
            &state,
            &rec(
                "vendor-a",
                2_000,
                SettlementOp::UpdateFulfillment {
                    order_id: "ord-1".to_string(),
                    vendor_id: "vendor-a".to_string(),
                    status: OrderStatus::Delivered,
                },
            ),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    fn refunded_state() -> LedgerState {
        let state = open_two_vendor_order(&LedgerState::new());
        let state = deliver(&state, "vendor-a", 2_000);
        apply(
            &state,
            &rec(
                "admin-1",
                3_000,
                SettlementOp::RecordGatewayRefund {
                    order_id: "ord-1".to_string(),
                    vendor_id: "vendor-a".to_string(),
                    kind: AdjustmentKind::Refund,
                    amount: 200.0,
                    reason: "damaged item".to_string(),
                    gateway_refund_ref: "RF-1".to_string(),
                    support_ticket_id: Some("ticket-9".to_string()),
                    processed_by: "admin-1".to_string(),
                },
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_gateway_refund_marks_payment_and_enqueues_task() {
        let state = refunded_state();
        let payment = state.get_payment("ord-1", "vendor-a").unwrap();
        assert_eq!(payment.status, crate::ledger::PaymentStatus::Refunded);
        let detail = payment.refund.as_ref().unwrap();
        assert_eq!(detail.amount, 200.0);
        assert_eq!(detail.gateway_refund_ref, "RF-1");

        let task = state.get_task("RF-1").unwrap();
        assert!(task.is_pending());
        assert_eq!(task.customer_id, "cust-1");
        assert!(!task.adjustment_recorded);
        assert!(!task.points_credited);
    }

    #[test]
    fn test_refund_adjustment_uses_stored_commission() {
        let state = refunded_state();
        let state = apply(
            &state,
            &rec(
                "admin-1",
                3_100,
                SettlementOp::RecordRefundAdjustment {
                    task_id: "RF-1".to_string(),
                    adjustment_id: "ADJ-1".to_string(),
                },
            ),
        )
        .unwrap();

        let adj = state.get_adjustment("ADJ-1").unwrap();
        assert!((adj.vendor_earnings_adjustment - -170.0).abs() < 1e-9);
        assert!((adj.platform_revenue_adjustment - -30.0).abs() < 1e-9);
        assert_eq!(adj.points_credited, 2_000);
        assert_eq!(adj.commission_percent, 15.0);
        assert!(state.get_task("RF-1").unwrap().adjustment_recorded);

        // Replaying the step changes nothing.
        let replayed = apply(
            &state,
            &rec(
                "admin-1",
                9_000,
                SettlementOp::RecordRefundAdjustment {
                    task_id: "RF-1".to_string(),
                    adjustment_id: "ADJ-2".to_string(),
                },
            ),
        )
        .unwrap();
        assert_eq!(replayed, state);
    }

    #[test]
    fn test_refund_points_credit_and_task_completion() {
        let mut state = refunded_state();
        state = apply(
            &state,
            &rec(
                "admin-1",
                3_100,
                SettlementOp::RecordRefundAdjustment {
                    task_id: "RF-1".to_string(),
                    adjustment_id: "ADJ-1".to_string(),
                },
            ),
        )
        .unwrap();

        // Task not yet complete: points still owed.
        let err = apply(
            &state,
            &rec(
                "admin-1",
                3_200,
                SettlementOp::CompleteRefundTask {
                    task_id: "RF-1".to_string(),
                },
            ),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        state = apply(
            &state,
            &rec(
                "admin-1",
                3_200,
                SettlementOp::CreditRefundPoints {
                    task_id: "RF-1".to_string(),
                },
            ),
        )
        .unwrap();
        let ledger = state.get_points("cust-1").unwrap();
        assert_eq!(ledger.available_points, 2_000);
        assert_eq!(ledger.transactions[0].kind, PointKind::RefundCredit);
        assert_eq!(ledger.transactions[0].refund_ref.as_deref(), Some("RF-1"));

        state = apply(
            &state,
            &rec(
                "admin-1",
                3_300,
                SettlementOp::CompleteRefundTask {
                    task_id: "RF-1".to_string(),
                },
            ),
        )
        .unwrap();
        assert!(!state.get_task("RF-1").unwrap().is_pending());
    }

    #[test]
    fn test_use_points_failure_leaves_state_unchanged() {
        let mut state = LedgerState::new();
        state = apply(
            &state,
            &rec(
                "admin",
                1_000,
                SettlementOp::AddPoints {
                    customer_id: "cust-1".to_string(),
                    points: 500,
                    kind: PointKind::Earned,
                    description: "order reward".to_string(),
                    order_id: None,
                    payment_ref: None,
                },
            ),
        )
        .unwrap();

        let err = apply(
            &state,
            &rec(
                "cust-1",
                2_000,
                SettlementOp::UsePoints {
                    customer_id: "cust-1".to_string(),
                    points: 501,
                    description: "checkout".to_string(),
                    order_id: "ord-1".to_string(),
                },
            ),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientPoints { .. }));
        assert_eq!(state.get_points("cust-1").unwrap().available_points, 500);
    }
}
