use chrono::Utc;
use clap::Parser;
use credits_ledger::application::engine::EconomyEngine;
use credits_ledger::config::{BootstrapConfig, LedgerConfig};
use credits_ledger::domain::clock::ManualClock;
use credits_ledger::domain::ports::StoreHandle;
use credits_ledger::domain::settings::Settings;
use credits_ledger::infrastructure::in_memory::InMemoryStore;
use credits_ledger::interfaces::csv::balance_writer::BalanceWriter;
use credits_ledger::interfaces::csv::command_reader::CommandReader;
use credits_ledger::interfaces::csv::replay::Replayer;
use credits_ledger::logging::{LogFormat, init_logging};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "CREDITS_LEDGER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Credits granted per earn when the store has no settings yet
    #[arg(long, env = "CREDITS_LEDGER_CREDIT_AMOUNT", default_value_t = 2)]
    credit_amount: u64,

    /// Seconds between two earns when the store has no settings yet
    #[arg(long, env = "CREDITS_LEDGER_CREDIT_INTERVAL", default_value_t = 300)]
    credit_interval: u64,

    #[arg(long, env = "CREDITS_LEDGER_ADMIN_USERNAME", default_value = "admin")]
    admin_username: String,

    #[arg(long, env = "CREDITS_LEDGER_ADMIN_BALANCE", default_value_t = 999_999)]
    admin_balance: u64,

    #[arg(long, env = "CREDITS_LEDGER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl Cli {
    fn config(&self) -> LedgerConfig {
        LedgerConfig {
            bootstrap: BootstrapConfig {
                admin_email: format!("{}@localhost", self.admin_username),
                admin_username: self.admin_username.clone(),
                admin_balance: self.admin_balance,
                settings: Settings {
                    credit_amount: self.credit_amount,
                    credit_interval_secs: self.credit_interval,
                    ..Settings::default()
                },
            },
            ..LedgerConfig::default()
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<StoreHandle> {
    use credits_ledger::infrastructure::rocksdb::RocksDBStore;

    Ok(match db_path {
        Some(path) => {
            info!(path = %path.display(), "opening RocksDB store");
            Arc::new(RocksDBStore::open(path).into_diagnostic()?)
        }
        None => Arc::new(InMemoryStore::new()),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<StoreHandle> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("info", cli.log_format);

    let config = cli.config();
    let store = open_store(cli.db_path)?;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = EconomyEngine::new(store, clock.clone(), config);
    let admin = engine.bootstrap().await.into_diagnostic()?.principal();
    let replayer = Replayer::new(engine, clock, admin);

    // Replay commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                let op = command.op;
                if let Err(e) = replayer.apply(command).await {
                    if e.is_business_outcome() {
                        info!(?op, reason = %e, "command refused");
                    } else {
                        warn!(?op, "Error processing command: {e}");
                    }
                }
            }
            Err(e) => warn!("Error reading command: {e}"),
        }
    }

    // Output final balances
    let audits = replayer.engine().audit().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_audits(audits).into_diagnostic()?;

    Ok(())
}
