pub mod kv;

pub use kv::FileStorage;

use crate::error::Result;
use crate::ledger::LedgerState;
use crate::op::OpRecord;

/// Storage abstraction for the append-only op log and state snapshots.
///
/// Implementations must preserve:
/// - Append-only semantics for the op log
/// - Atomic snapshot writes (crash-safe)
/// - Deterministic replay from the op log
pub trait Storage {
    /// Append an op record to the log (append-only, fsync before ack)
    fn append_op(&mut self, rec: &OpRecord) -> Result<()>;

    /// Load the latest snapshot with the count of ops applied to it
    ///
    /// Returns `None` if no snapshot exists (genesis state).
    fn load_state(&self) -> Result<Option<(LedgerState, u64)>>;

    /// Persist a snapshot atomically (write to temp file, fsync, rename)
    ///
    /// `next_op_id` is the log position of the next op to apply on top.
    fn persist_state(&mut self, state: &LedgerState, next_op_id: u64) -> Result<()>;

    /// Load ops from the log starting at `from_op_id` (inclusive)
    ///
    /// Op ids are sequential log positions (0, 1, 2, ...).
    fn load_ops_from(&self, from_op_id: u64) -> Result<Vec<OpRecord>>;
}
