//! EGM host service.
//!
//! Wires the credit ledger, transaction history, game round log and payout
//! outbox over PostgreSQL, then runs the startup recovery sequence before
//! any new game round may begin.

mod config;
mod console;
mod engine;
mod logging;

use std::sync::Arc;

use anyhow::Error;
use config::HostConfig;
use egm_core::{
    CurrencyLedger, GameHistory, GameRecovery, KeyOffGate, Money, PersistedGameHistory,
    PersistedTransactionHistory, PersistentStorage, PgStorage, RecoveryContext, RecoveryError,
    StartupRecovery, cashout::OutboxTransferOut, ledger::LEDGER_BLOCK,
};
use engine::HostGameEngine;
use log::{error, info, warn};
use pico_args::Arguments;
use tokio::io::BufReader;

const HELP: &str = "\
Run the EGM credit recovery host

USAGE:
  egm_host [OPTIONS]

OPTIONS:
  --db-url              URL     Database connection string  [default: env DATABASE_URL]
  --large-payout-limit  AMOUNT  Key-off threshold in millicents  [default: env LARGE_PAYOUT_LIMIT or 1200000]

FLAGS:
  -h, --help                    Print help information

ENVIRONMENT:
  DATABASE_URL                  PostgreSQL connection string
  LARGE_PAYOUT_LIMIT            Key-off threshold in millicents
  LEDGER_CAPACITY_WARNING       Ledger record count that triggers a warning
  OPERATOR_CONSOLE              Read key-off commands from stdin [default: true]
  RUST_LOG                      Log filter [default: info,sqlx=warn]
";

struct Args {
    database_url: Option<String>,
    large_payout_limit: Option<Money>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        database_url: pargs.opt_value_from_str("--db-url")?,
        large_payout_limit: pargs.opt_value_from_str("--large-payout-limit")?,
    };

    logging::init();

    let config = HostConfig::from_env(args.database_url, args.large_payout_limit)?;
    config.validate()?;

    // Initialize storage
    let pg = PgStorage::connect(&config.storage)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    pg.migrate().await?;
    pg.health_check().await?;
    info!("Persisted store ready");

    let storage: Arc<dyn PersistentStorage> = Arc::new(pg.clone());
    let game_history = Arc::new(PersistedGameHistory::new(storage.clone()));
    let ledger = Arc::new(
        CurrencyLedger::load(storage.clone(), LEDGER_BLOCK)
            .await?
            .with_capacity_warning(config.recovery.ledger_capacity_warning),
    );
    let engine = Arc::new(HostGameEngine::new(
        game_history.is_recovery_needed().await?,
    ));
    let key_off = Arc::new(KeyOffGate::new());

    let history = Arc::new(PersistedTransactionHistory::new(storage.clone()));
    let context = RecoveryContext {
        ledger,
        history: history.clone(),
        game_history,
        bank: Arc::new(OutboxTransferOut::new(storage, history)),
        game_recovery: Arc::new(GameRecovery::new(engine.clone())),
        key_off: key_off.clone(),
        config: config.recovery,
    };

    if config.operator_console {
        let gate = key_off.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = console::run(gate, stdin).await {
                error!("Operator console stopped: {e}");
            }
        });
    }

    info!(
        "Running startup recovery (large payout limit {})",
        config.recovery.large_payout_limit
    );
    match StartupRecovery::new(context).run().await {
        Ok(report) => {
            info!(
                "Pending amount {}, game recovering {}, cash-out pending {}",
                report.amount_in, report.game_recovering, report.cash_out_pending
            );
            if !report.balance_settled() {
                warn!("Balance is not settled; the lobby must not present it as final");
            }
        }
        Err(RecoveryError::KeyOffAborted(trace_id)) => {
            logging::log_money_event(
                "recovery_aborted",
                trace_id,
                None,
                "Recovery abandoned at key-off",
            );
        }
        Err(e) if e.is_fatal() => {
            error!("Fatal recovery error, halting game play: {e}");
            pg.close().await;
            return Err(e.into());
        }
        Err(e) => error!("Recovery incomplete, retried on next start: {e}"),
    }

    if let Some(game_id) = engine.faulted_game() {
        info!("Game {game_id} remains faulted");
    }

    // Keep the operator console alive until shutdown
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    pg.close().await;

    Ok(())
}
