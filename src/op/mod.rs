pub mod operation;
pub mod validation;

pub use operation::{deserialize_op_bincode, OpRecord, SettlementOp};
pub use validation::validate;
