//! College Stats: Batch Runner
//!
//! What it does:
//!   1. Runs `get-data <index>` as a separate process for every index START..=END
//!   2. Kills an attempt after BATCH_ATTEMPT_TIMEOUT_SECS and tries again
//!   3. Moves to the next index only after success (or when the policy gives up)
//!
//! Usage:
//!   cargo run --bin run-batch -- 0 250

use anyhow::{Context, Result};
use batch_runner::{BatchConfig, BatchOrchestrator, ProcessRunner};
use clap::Parser;
use dotenv::dotenv;
use logger::EventLogger;
use std::env;
use std::fs::File;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "run-batch", about = "Fetch an inclusive range of input rows, retrying each until it succeeds")]
struct Cli {
    /// First row index
    #[arg(allow_negative_numbers = true)]
    start: i64,
    /// Last row index (inclusive)
    #[arg(allow_negative_numbers = true)]
    end: i64,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return Ok(if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS });
        }
    };

    // Single instance lock
    let lock_file_path = env::temp_dir().join("college_stats_batch.lock");
    let lock_file = File::create(&lock_file_path)
        .with_context(|| format!("create lock file {:?}", lock_file_path))?;

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => guard,
        Err(_) => {
            warn!("Another run-batch is already running! Exiting.");
            return Ok(ExitCode::from(1));
        }
    };

    let config = BatchConfig::from_env();
    let fetch_bin = config.resolve_fetch_bin().context("locate get-data binary")?;
    let policy = config.policy();

    info!("=== College Stats batch {}..={} ===", cli.start, cli.end);
    info!("Fetcher: {:?}", fetch_bin);
    info!(
        "Attempt timeout: {:?}, policy: {:?}{}",
        config.attempt_timeout,
        policy,
        if config.retry_all { " (retry all)" } else { "" }
    );

    let mut orchestrator = BatchOrchestrator::new(ProcessRunner::new(fetch_bin), policy, config.attempt_timeout)
        .with_event_log(EventLogger::new(&config.log_dir));

    let report = orchestrator.run(cli.start, cli.end).await?;

    for (index, reason) in &report.abandoned {
        warn!("[{}] abandoned: {}", index, reason);
    }
    info!(
        "Fetched {}/{} rows in {} attempts",
        report.fetched.len(),
        report.fetched.len() + report.abandoned.len(),
        report.attempts
    );

    Ok(if report.is_complete() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}
