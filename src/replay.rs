//! Replay service: rebuild ledger state from storage.
//!
//! The op log is the source of truth; snapshots only shortcut startup.
//! `verify_replay` audits a data directory by replaying the full log from
//! genesis and comparing it to the snapshot-plus-tail state.

use crate::error::{Error, Result};
use crate::ledger::{apply, LedgerState};
use crate::storage::Storage;

/// Load state from storage and replay the log to the tip.
///
/// - With a snapshot: load it, then apply ops from `next_op_id`.
/// - Without: replay from genesis.
///
/// Returns the materialized state and the next op id.
pub fn replay_to_tip<S: Storage>(storage: &S) -> Result<(LedgerState, u64)> {
    let (mut state, mut next_id) = match storage.load_state()? {
        Some((snapshot, next_op_id)) => (snapshot, next_op_id),
        None => (LedgerState::new(), 0),
    };
    for rec in storage.load_ops_from(next_id)? {
        state = apply(&state, &rec)?;
        next_id += 1;
    }
    Ok((state, next_id))
}

/// Replay the full log from genesis, ignoring any snapshot.
pub fn replay_from_genesis<S: Storage>(storage: &S) -> Result<(LedgerState, u64)> {
    let mut state = LedgerState::new();
    let mut next_id = 0u64;
    for rec in storage.load_ops_from(0)? {
        state = apply(&state, &rec)?;
        next_id += 1;
    }
    Ok((state, next_id))
}

/// Audit a data directory: genesis replay must agree with the snapshot
/// path. Returns the verified state or `ReplayMismatch`.
pub fn verify_replay<S: Storage>(storage: &S) -> Result<(LedgerState, u64)> {
    let from_genesis = replay_from_genesis(storage)?;
    let from_snapshot = replay_to_tip(storage)?;
    if from_genesis != from_snapshot {
        return Err(Error::ReplayMismatch);
    }
    Ok(from_genesis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OrderLine;
    use crate::op::{OpRecord, SettlementOp};
    use crate::storage::FileStorage;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::with_paths(
            temp_dir.path().join("op.log"),
            temp_dir.path().join("state.bin"),
        );
        (storage, temp_dir)
    }

    fn open_order_op(order_id: &str) -> OpRecord {
        OpRecord::new(
            "cust-1".to_string(),
            1_000,
            SettlementOp::OpenOrder {
                order_id: order_id.to_string(),
                customer_id: "cust-1".to_string(),
                lines: vec![OrderLine {
                    product_id: "sku-1".to_string(),
                    quantity: 1,
                    unit_price: 100.0,
                    vendor_id: "vendor-a".to_string(),
                }],
            },
        )
    }

    #[test]
    fn test_replay_from_empty_storage() {
        let (storage, _temp_dir) = create_test_storage();
        let (state, next_id) = replay_to_tip(&storage).unwrap();
        assert_eq!(next_id, 0);
        assert!(state.orders.is_empty());
    }

    #[test]
    fn test_replay_snapshot_plus_tail() {
        let (mut storage, _temp_dir) = create_test_storage();
        let mut state = LedgerState::new();

        // Two ops, snapshot after the first (simulating a crash before the
        // second snapshot write).
        let op1 = open_order_op("ord-1");
        state = apply(&state, &op1).unwrap();
        storage.append_op(&op1).unwrap();
        storage.persist_state(&state, 1).unwrap();

        let op2 = open_order_op("ord-2");
        state = apply(&state, &op2).unwrap();
        storage.append_op(&op2).unwrap();

        let (replayed, next_id) = replay_to_tip(&storage).unwrap();
        assert_eq!(next_id, 2);
        assert_eq!(replayed, state);
    }

    #[test]
    fn test_verify_replay_agrees() {
        let (mut storage, _temp_dir) = create_test_storage();
        let mut state = LedgerState::new();
        for id in ["ord-1", "ord-2"] {
            let op = open_order_op(id);
            state = apply(&state, &op).unwrap();
            storage.append_op(&op).unwrap();
        }
        storage.persist_state(&state, 2).unwrap();

        let (verified, next_id) = verify_replay(&storage).unwrap();
        assert_eq!(next_id, 2);
        assert_eq!(verified, state);
    }
}
