use clap::{Parser, Subcommand};
use settlement_core::commission::CommissionPolicy;
use settlement_core::config::Config;
use settlement_core::current_timestamp;
use settlement_core::engine::SettlementEngine;
use settlement_core::error::{Error, Result};
use settlement_core::ledger::PaymentStatus;
use settlement_core::op::OpRecord;
use settlement_core::refund::RefundOrchestrator;
use settlement_core::replay::verify_replay;
use settlement_core::report::{
    payment_report, points_statement, revenue_summary, DateRange, PaymentFilter,
};
use settlement_core::storage::FileStorage;
use std::fs;
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "settlement-core")]
#[command(about = "Settlement Core CLI - Marketplace settlement and reconciliation ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long, default_value = "human")]
    pub format: String,

    /// Data directory path
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory
    Init,

    /// Submit an operation
    Submit {
        /// Op record JSON (or read from stdin if not provided)
        #[arg(short, long)]
        op: Option<String>,

        /// Op record file path
        #[arg(long)]
        file: Option<String>,

        /// Dry-run: validate but don't apply
        #[arg(long)]
        dry_run: bool,
    },

    /// Show an order with its status history and payments
    Order {
        /// Order id
        order_id: String,
    },

    /// Payment ledger report
    Payments {
        /// Restrict to one vendor
        #[arg(long)]
        vendor: Option<String>,

        /// Restrict to one status: pending, completed, failed, refunded
        #[arg(long)]
        status: Option<String>,

        /// Window start (unix seconds)
        #[arg(long)]
        from: Option<i64>,

        /// Window end (unix seconds)
        #[arg(long)]
        to: Option<i64>,
    },

    /// Customer points balance and history
    Points {
        /// Customer id
        customer_id: String,
    },

    /// Revenue adjustment summary over a window
    Report {
        /// Window start (unix seconds)
        #[arg(long, default_value_t = 0)]
        from: i64,

        /// Window end (unix seconds, defaults to now)
        #[arg(long)]
        to: Option<i64>,
    },

    /// Expire overdue earned points across all customers
    SweepExpiry,

    /// Re-drive pending refund reconciliation tasks
    ResumeRefunds,

    /// Verify that genesis replay agrees with the snapshot path
    VerifyReplay,
}

fn open_engine(config: &Config) -> Result<SettlementEngine<FileStorage>> {
    let storage = FileStorage::new(config);
    let commission = CommissionPolicy::from_config(config)?;
    SettlementEngine::open(storage, commission)
}

/// Parse an op record from JSON
fn parse_op(json: &str) -> Result<OpRecord> {
    serde_json::from_str(json)
        .map_err(|e| Error::InvalidOperation(format!("Failed to parse op record JSON: {}", e)))
}

/// Read op record JSON from file or stdin
fn read_op(file: Option<&str>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| Error::InvalidOperation(format!("Failed to read file {}: {}", path, e))),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| Error::InvalidOperation(format!("Failed to read from stdin: {}", e)))?;
            Ok(buffer)
        }
    }
}

fn parse_status(status: &str) -> Result<PaymentStatus> {
    match status {
        "pending" => Ok(PaymentStatus::Pending),
        "completed" => Ok(PaymentStatus::Completed),
        "failed" => Ok(PaymentStatus::Failed),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(Error::InvalidOperation(format!(
            "Unknown payment status: {}",
            other
        ))),
    }
}

/// Format output based on format type
fn format_output<T: serde::Serialize + std::fmt::Debug>(data: &T, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(data)
            .map_err(|e| Error::StateError(format!("Failed to serialize JSON: {}", e))),
        _ => Ok(format!("{:#?}", data)),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.set_data_dir(std::path::PathBuf::from(dir));
    }
    if cli.format == "json" {
        config.set_output_format("json".to_string());
    }

    match cli.command {
        Commands::Init => {
            fs::create_dir_all(config.get_data_dir())
                .map_err(|e| Error::StateError(format!("Failed to create data directory: {}", e)))?;
            println!(
                "Initialized data directory at: {}",
                config.get_data_dir().display()
            );
            Ok(())
        }

        Commands::Submit { op, file, dry_run } => {
            let mut engine = open_engine(&config)?;

            let op_json = match op {
                Some(json) => json,
                None => read_op(file.as_deref())?,
            };
            let rec = parse_op(&op_json)?;

            if dry_run {
                settlement_core::op::validate(engine.state(), &rec)?;
                println!("✓ Operation is valid");
                return Ok(());
            }

            engine.submit(rec)?;
            println!("✓ Operation applied successfully");
            Ok(())
        }

        Commands::Order { order_id } => {
            let engine = open_engine(&config)?;
            let order = engine
                .order(&order_id)
                .ok_or_else(|| Error::OrderNotFound(order_id.clone()))?;
            let payments = engine.state().order_payments(&order_id);

            let output = OrderOutput {
                order: order.clone(),
                payments: payments.into_iter().cloned().collect(),
            };
            println!("{}", format_output(&output, &cli.format)?);
            Ok(())
        }

        Commands::Payments {
            vendor,
            status,
            from,
            to,
        } => {
            let engine = open_engine(&config)?;
            let range = match (from, to) {
                (None, None) => None,
                (f, t) => Some(DateRange::new(
                    f.unwrap_or(0),
                    t.unwrap_or_else(current_timestamp),
                )),
            };
            let filter = PaymentFilter {
                vendor_id: vendor,
                status: status.as_deref().map(parse_status).transpose()?,
                range,
            };
            let report = payment_report(engine.state(), &filter);
            println!("{}", format_output(&report, &cli.format)?);
            Ok(())
        }

        Commands::Points { customer_id } => {
            let engine = open_engine(&config)?;
            let statement = points_statement(engine.state(), &customer_id);
            println!("{}", format_output(&statement, &cli.format)?);
            Ok(())
        }

        Commands::Report { from, to } => {
            let engine = open_engine(&config)?;
            let range = DateRange::new(from, to.unwrap_or_else(current_timestamp));
            let summary = revenue_summary(engine.state(), range);
            println!("{}", format_output(&summary, &cli.format)?);
            Ok(())
        }

        Commands::SweepExpiry => {
            let mut engine = open_engine(&config)?;
            let swept = engine.sweep_expired_points(current_timestamp())?;
            println!("✓ Swept {} customer ledger(s)", swept);
            Ok(())
        }

        Commands::ResumeRefunds => {
            let mut engine = open_engine(&config)?;
            let completed = RefundOrchestrator::resume_pending(&mut engine, current_timestamp())?;
            println!("✓ Completed {} pending refund task(s)", completed);
            Ok(())
        }

        Commands::VerifyReplay => {
            let storage = FileStorage::new(&config);
            let (_, next_op_id) = verify_replay(&storage)?;
            println!("✓ Replay verified: {} op(s), states agree", next_op_id);
            Ok(())
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct OrderOutput {
    order: settlement_core::ledger::Order,
    payments: Vec<settlement_core::ledger::Payment>,
}
