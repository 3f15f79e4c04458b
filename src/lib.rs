pub mod commission;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod op;
pub mod ports;
pub mod refund;
pub mod replay;
pub mod report;
pub mod storage;

use sha2::{Digest, Sha256};

/// Get current Unix timestamp
pub fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// SHA256 digest, hex-encoded
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
