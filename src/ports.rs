//! Collaborator ports owned by other subsystems.
//!
//! The settlement core calls these at well-defined points; failures are
//! surfaced or logged but never corrupt the ledger.

use crate::error::Result;

/// Catalog-side stock interface, used when a pending order is cancelled.
pub trait InventoryPort {
    fn restock(&mut self, product_id: &str, quantity: u32) -> Result<()>;
}

/// Support-ticket interface, used to link a refund back to the ticket
/// that initiated it.
pub trait SupportTicketPort {
    fn record_refund_resolution(
        &mut self,
        ticket_id: &str,
        refund_ref: &str,
        note: &str,
    ) -> Result<()>;
}

/// No-op inventory: for deployments where stock lives elsewhere.
#[derive(Debug, Clone, Default)]
pub struct NoOpInventory;

impl InventoryPort for NoOpInventory {
    fn restock(&mut self, _product_id: &str, _quantity: u32) -> Result<()> {
        Ok(())
    }
}

/// No-op ticket port: for refunds initiated directly by an administrator.
#[derive(Debug, Clone, Default)]
pub struct NoOpSupportTickets;

impl SupportTicketPort for NoOpSupportTickets {
    fn record_refund_resolution(
        &mut self,
        _ticket_id: &str,
        _refund_ref: &str,
        _note: &str,
    ) -> Result<()> {
        Ok(())
    }
}
