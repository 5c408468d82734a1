//! Ledger entry point.
//!
//! Usage: `ledger [open|deposit|withdraw AMOUNT]...`. With no arguments a
//! built-in script runs.

use std::process::ExitCode;

use domain::{Account, CommandHandler};
use event_store::InMemoryEventStore;
use ledger::{Config, LedgerError, LogFormat};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only the audit output.
    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(config: Config, args: Vec<String>) -> Result<(), LedgerError> {
    let script = if args.is_empty() {
        ledger::default_script()
    } else {
        ledger::parse_script(&args)?
    };

    let store = InMemoryEventStore::new();
    let handler: CommandHandler<_, Account> = CommandHandler::new(store.clone());

    tracing::info!(account_id = %config.account_id, commands = script.len(), "running script");
    let outcome = ledger::run_script(&handler, &config.account_id, script).await?;

    for rejection in &outcome.rejections {
        println!("{} rejected: {}", rejection.command.name(), rejection.error);
    }
    println!("Final state of account: {}", outcome.account);

    println!("Event log:");
    for line in ledger::audit_trail(&store).await? {
        println!("  {line}");
    }

    println!("Rebuilt account state: {}", outcome.rebuilt);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(config, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ledger failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
