use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Payment not found for order {order_id}, vendor {vendor_id}")]
    PaymentNotFound { order_id: String, vendor_id: String },

    #[error("Refund task {0} not found")]
    TaskNotFound(String),

    #[error("Insufficient points: have {available}, need {requested}")]
    InsufficientPoints { available: u64, requested: u64 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Replay mismatch: snapshot state diverges from the op log")]
    ReplayMismatch,

    #[error("Refund {task_id} settled at the gateway but bookkeeping is incomplete: {reason}")]
    RefundIncomplete { task_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
