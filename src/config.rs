use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Default platform commission, in percent of a vendor payment's amount.
pub const DEFAULT_COMMISSION_PERCENT: f64 = 15.0;

/// Configuration for the settlement-core CLI tool and engine.
///
/// Single-process config suitable for an embedded ledger. Commission
/// overrides are keyed by vendor id; anything not listed settles at
/// `default_commission_percent`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path (default: `.settlement-core/` in current directory)
    pub data_dir: PathBuf,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Log level: "info", "debug", "warn", "error" (default: "info")
    pub log_level: String,

    /// Platform commission applied when no per-vendor override exists
    pub default_commission_percent: f64,

    /// Per-vendor commission overrides, in percent
    pub vendor_commission_percent: HashMap<String, f64>,
}

impl Config {
    pub fn new() -> Self {
        let data_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".settlement-core");

        Config {
            data_dir,
            output_format: "human".to_string(),
            log_level: "info".to_string(),
            default_commission_percent: DEFAULT_COMMISSION_PERCENT,
            vendor_commission_percent: HashMap::new(),
        }
    }

    /// Create config with custom data directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            ..Config::new()
        }
    }

    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    /// Get op log path
    pub fn get_op_log_path(&self) -> PathBuf {
        self.data_dir.join("op.log")
    }

    /// Get state snapshot path
    pub fn get_state_path(&self) -> PathBuf {
        self.data_dir.join("state.bin")
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `SETTLEMENT_DATA_DIR`: override data directory
    /// - `SETTLEMENT_OUTPUT_FORMAT`: "human" or "json"
    /// - `SETTLEMENT_LOG_LEVEL`: log level
    /// - `SETTLEMENT_COMMISSION_PERCENT`: default platform commission
    pub fn from_env() -> Self {
        let mut config = Config::new();

        if let Ok(dir) = env::var("SETTLEMENT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(format) = env::var("SETTLEMENT_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(level) = env::var("SETTLEMENT_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(percent) = env::var("SETTLEMENT_COMMISSION_PERCENT") {
            if let Ok(parsed) = percent.parse::<f64>() {
                config.default_commission_percent = parsed;
            }
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
