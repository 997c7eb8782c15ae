mod config;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use posvault_core::{ActionCoordinator, FactCache};
use posvault_ledger::{MemoryLedger, WalletSession};
use posvault_types::Identity;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::ConsoleConfig;
use crate::console::{parse_line, Console, Flow};

#[derive(Parser, Debug)]
#[command(author, version, about = "Operator console for a merchant payout vault", long_about = None)]
struct Args {
    /// JSON config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Wallet to connect at start-up
    #[arg(long)]
    caller: Option<Identity>,
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they do not interleave with command output.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;

    let config = match &args.config {
        Some(path) => ConsoleConfig::load(path)?,
        None => ConsoleConfig::default(),
    };
    info!("Starting console for vault {}", config.vault_address);

    let ledger = Arc::new(MemoryLedger::new(&config.genesis));
    tokio::spawn(ledger.clone().run_block_producer(config.block_interval()));

    let session = Arc::new(WalletSession::new(args.caller));
    let cache = FactCache::new(ledger.clone());
    let coordinator = ActionCoordinator::new(ledger.clone(), cache, session.clone());
    let console = Console::new(config, ledger, session, coordinator);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{}", usage.trim_end());
                continue;
            }
        };
        match console.execute(command).await {
            Flow::Continue(out) => println!("{}", out),
            Flow::Quit => break,
        }
    }

    info!("Console closed");
    Ok(())
}
