//! Refund orchestration: coordinates the external gateway refund with the
//! payment, adjustment, and points ledgers.
//!
//! Money moves first, bookkeeping second: the moment the gateway
//! confirms a refund, a durable task records the bookkeeping still owed.
//! Every ledger step is idempotent and keyed by the task, which makes a
//! crash between steps resumable instead of silently inconsistent: a
//! failed step surfaces as `RefundIncomplete` and `resume_pending`
//! re-drives the remaining steps from the task record.

use crate::engine::SettlementEngine;
use crate::error::{Error, Result};
use crate::gateway::PaymentGateway;
use crate::ledger::AdjustmentKind;
use crate::op::{OpRecord, SettlementOp};
use crate::ports::SupportTicketPort;
use crate::sha256_hex;
use crate::storage::Storage;
use rand::Rng;
use tracing::{error, info, warn};

/// A refund to process, from an admin action or a support-ticket
/// resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
    pub order_id: String,
    pub vendor_id: String,
    pub amount: f64,
    pub reason: String,
    pub support_ticket_id: Option<String>,
    pub processed_by: String,
}

/// What a completed refund produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcome {
    pub task_id: String,
    pub adjustment_id: String,
    pub points_credited: u64,
}

pub struct RefundOrchestrator;

impl RefundOrchestrator {
    /// Process a refund end to end.
    ///
    /// 1. Validate the payment and amount; nothing is written on failure.
    /// 2. Call the gateway. On failure, nothing is written.
    /// 3. Record the gateway refund: payment marked refunded and the
    ///    reconciliation task persisted in one atomic apply.
    /// 4. Drive the task: revenue adjustment, points credit, completion.
    /// 5. Notify the support ticket when one initiated the refund.
    ///
    /// A failure after step 3 returns [`Error::RefundIncomplete`]: the
    /// gateway-side refund is irreversible, the books are owed, and the
    /// pending task carries enough to finish them via [`Self::resume_pending`].
    pub fn process_refund<S: Storage>(
        engine: &mut SettlementEngine<S>,
        gateway: &mut dyn PaymentGateway,
        tickets: &mut dyn SupportTicketPort,
        request: &RefundRequest,
        now: i64,
    ) -> Result<RefundOutcome> {
        let payment = engine
            .payment(&request.order_id, &request.vendor_id)
            .ok_or_else(|| Error::PaymentNotFound {
                order_id: request.order_id.clone(),
                vendor_id: request.vendor_id.clone(),
            })?;
        if engine.order(&request.order_id).is_none() {
            return Err(Error::OrderNotFound(request.order_id.clone()));
        }
        if !payment.is_completed() {
            return Err(Error::InvalidTransition(format!(
                "Payment {} cannot be refunded from {:?}",
                payment.transaction_ref, payment.status
            )));
        }
        if !(request.amount > 0.0) || !request.amount.is_finite() {
            return Err(Error::InvalidOperation(format!(
                "Refund amount must be positive, got {}",
                request.amount
            )));
        }
        if request.amount > payment.amount {
            return Err(Error::InvalidOperation(format!(
                "Refund amount {} exceeds payment amount {}",
                request.amount, payment.amount
            )));
        }

        let transaction_ref = payment.transaction_ref.clone();
        let key = refund_idempotency_key(&transaction_ref, request.amount, &request.reason);
        let response = gateway.refund_transaction(
            &transaction_ref,
            request.amount,
            &transaction_ref,
            &key,
        )?;
        if !response.success {
            return Err(Error::Gateway(format!(
                "Gateway declined refund for {}",
                transaction_ref
            )));
        }
        info!(
            order_id = %request.order_id,
            vendor_id = %request.vendor_id,
            amount = request.amount,
            refund_ref = %response.refund_ref,
            "gateway refund settled"
        );

        // From here on money has moved; the task makes the remaining
        // bookkeeping durable before any of it runs.
        engine.submit(OpRecord::new(
            request.processed_by.clone(),
            now,
            SettlementOp::RecordGatewayRefund {
                order_id: request.order_id.clone(),
                vendor_id: request.vendor_id.clone(),
                kind: AdjustmentKind::Refund,
                amount: request.amount,
                reason: request.reason.clone(),
                gateway_refund_ref: response.refund_ref.clone(),
                support_ticket_id: request.support_ticket_id.clone(),
                processed_by: request.processed_by.clone(),
            },
        ))?;

        let outcome = Self::drive_task(engine, &response.refund_ref, now)?;

        if let Some(ticket_id) = &request.support_ticket_id {
            let note = format!("Refund of {} processed: {}", request.amount, request.reason);
            if let Err(e) =
                tickets.record_refund_resolution(ticket_id, &response.refund_ref, &note)
            {
                // Ticket bookkeeping lives outside the ledger; losing the
                // note is an annoyance, not an imbalance.
                warn!(ticket_id = %ticket_id, error = %e, "ticket resolution update failed");
            }
        }

        Ok(outcome)
    }

    /// Record a chargeback the gateway already executed. Same task
    /// pipeline as a refund, minus the gateway call.
    pub fn record_chargeback<S: Storage>(
        engine: &mut SettlementEngine<S>,
        request: &RefundRequest,
        gateway_case_ref: &str,
        now: i64,
    ) -> Result<RefundOutcome> {
        engine.submit(OpRecord::new(
            request.processed_by.clone(),
            now,
            SettlementOp::RecordGatewayRefund {
                order_id: request.order_id.clone(),
                vendor_id: request.vendor_id.clone(),
                kind: AdjustmentKind::Chargeback,
                amount: request.amount,
                reason: request.reason.clone(),
                gateway_refund_ref: gateway_case_ref.to_string(),
                support_ticket_id: request.support_ticket_id.clone(),
                processed_by: request.processed_by.clone(),
            },
        ))?;
        Self::drive_task(engine, gateway_case_ref, now)
    }

    /// Re-drive every pending refund task to completion. Safe to run any
    /// time; each step is idempotent.
    ///
    /// Returns the number of tasks completed.
    pub fn resume_pending<S: Storage>(
        engine: &mut SettlementEngine<S>,
        now: i64,
    ) -> Result<usize> {
        let pending: Vec<String> = engine
            .pending_refund_tasks()
            .iter()
            .map(|t| t.task_id.clone())
            .collect();
        let mut completed = 0usize;
        for task_id in &pending {
            info!(task_id = %task_id, "resuming refund task");
            Self::drive_task(engine, task_id, now)?;
            completed += 1;
        }
        Ok(completed)
    }

    /// Run the bookkeeping steps a task still owes, then close it.
    fn drive_task<S: Storage>(
        engine: &mut SettlementEngine<S>,
        task_id: &str,
        now: i64,
    ) -> Result<RefundOutcome> {
        let incomplete = |reason: String| Error::RefundIncomplete {
            task_id: task_id.to_string(),
            reason,
        };

        let (actor, adjustment_id, adjustment_recorded) = {
            let task = engine
                .state()
                .get_task(task_id)
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
            (
                task.processed_by.clone(),
                task.adjustment_id
                    .clone()
                    .unwrap_or_else(|| new_adjustment_id(now)),
                task.adjustment_recorded,
            )
        };

        if !adjustment_recorded {
            engine
                .submit(OpRecord::new(
                    actor.clone(),
                    now,
                    SettlementOp::RecordRefundAdjustment {
                        task_id: task_id.to_string(),
                        adjustment_id: adjustment_id.clone(),
                    },
                ))
                .map_err(|e| {
                    error!(task_id = %task_id, error = %e, "revenue adjustment step failed");
                    incomplete(format!("revenue adjustment failed: {}", e))
                })?;
        }

        let points_pending = engine
            .state()
            .get_task(task_id)
            .map(|t| !t.points_credited)
            .unwrap_or(false);
        if points_pending {
            engine
                .submit(OpRecord::new(
                    actor.clone(),
                    now,
                    SettlementOp::CreditRefundPoints {
                        task_id: task_id.to_string(),
                    },
                ))
                .map_err(|e| {
                    error!(task_id = %task_id, error = %e, "points credit step failed");
                    incomplete(format!("points credit failed: {}", e))
                })?;
        }

        engine
            .submit(OpRecord::new(
                actor,
                now,
                SettlementOp::CompleteRefundTask {
                    task_id: task_id.to_string(),
                },
            ))
            .map_err(|e| incomplete(format!("task completion failed: {}", e)))?;

        let adjustment = engine
            .state()
            .get_adjustment(&adjustment_id)
            .ok_or_else(|| incomplete("adjustment missing after completion".to_string()))?;
        Ok(RefundOutcome {
            task_id: task_id.to_string(),
            adjustment_id: adjustment_id.clone(),
            points_credited: adjustment.points_credited,
        })
    }
}

/// Idempotency key for a gateway refund call: stable for a given
/// (payment, amount, reason) so a client-side timeout retry cannot double
/// a refund at the gateway.
pub fn refund_idempotency_key(transaction_ref: &str, amount: f64, reason: &str) -> String {
    let mut data = Vec::with_capacity(transaction_ref.len() + reason.len() + 8);
    data.extend_from_slice(transaction_ref.as_bytes());
    data.extend_from_slice(&amount.to_bits().to_le_bytes());
    data.extend_from_slice(reason.as_bytes());
    sha256_hex(&data)
}

/// Adjustment identifier: timestamp plus random hex suffix.
fn new_adjustment_id(now: i64) -> String {
    let suffix: [u8; 6] = rand::thread_rng().gen();
    format!("ADJ-{}-{}", now, hex::encode(suffix))
}
