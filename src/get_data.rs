//! get-data: fetch one player's college stats table
//!
//! Usage:
//!   cargo run --bin get-data -- <row_index>
//!
//! Exit 0 = CSV saved, 1 = anything else. On failure the last stderr line is
//! `FETCH_FAILED kind=<kind> index=<idx>` for run-batch to classify.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use logger::{now_iso, EventLogger, FetchFailedEvent, FetchOkEvent};
use stats_fetcher::driver::{ChromeSessionFactory, FixtureSessionFactory};
use stats_fetcher::{
    failure_line, DriverKind, FetchConfig, FetchError, FetchOutcome, Fetcher, InputTable,
    OutputSink, SchemaMap, SessionFactory,
};
use std::process::ExitCode;
use std::time::Instant;
use tokio::task;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "get-data", about = "Fetch one player's college stats table as CSV")]
struct Cli {
    /// Row index into the input table
    #[arg(allow_negative_numbers = true)]
    index: i64,
}

#[tokio::main]
async fn main() -> ExitCode {
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
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };

    let config = FetchConfig::from_env();
    let events = EventLogger::new(&config.log_dir);
    let started = Instant::now();

    match run(cli.index, config).await {
        Ok(outcome) => {
            info!("✅ Saved to {}", outcome.path.display());
            events.log_quiet(&FetchOkEvent {
                ts:         now_iso(),
                event:      "FETCH_OK",
                index:      cli.index,
                player:     outcome.row.player.clone(),
                pos:        outcome.row.pos.clone(),
                schema_id:  outcome.schema_id.clone(),
                rows:       outcome.record.len(),
                output:     outcome.path.display().to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            ExitCode::SUCCESS
        }
        Err(err) => {
            warn!("[!] {:#}", err);
            let fetch_err = err.downcast_ref::<FetchError>();
            events.log_quiet(&FetchFailedEvent {
                ts:         now_iso(),
                event:      "FETCH_FAILED",
                index:      cli.index,
                kind:       fetch_err.map_or_else(|| "unclassified".to_string(), |e| e.kind().to_string()),
                retriable:  fetch_err.map_or(true, FetchError::is_retriable),
                message:    format!("{err:#}"),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            if let Some(e) = fetch_err {
                eprintln!("{}", failure_line(e.kind(), cli.index));
            }
            ExitCode::from(1)
        }
    }
}

async fn run(index: i64, config: FetchConfig) -> Result<FetchOutcome> {
    let table = InputTable::load(&config.input_csv)?;
    let schema = match &config.schema_map_path {
        Some(path) => SchemaMap::load(path)?,
        None => SchemaMap::default(),
    };
    let sink = OutputSink::new(&config.output_dir);

    match config.driver.clone() {
        DriverKind::Chrome => {
            let factory = ChromeSessionFactory::new(config.headless, config.selectors.clone(), config.settle);
            fetch_blocking(Fetcher::new(table, schema, sink, factory), &config, index).await
        }
        DriverKind::Fixture(dir) => {
            info!("Using saved pages from {:?}", dir);
            let factory = FixtureSessionFactory::new(dir, config.selectors.clone());
            fetch_blocking(Fetcher::new(table, schema, sink, factory), &config, index).await
        }
    }
}

/// The page driver blocks, so the whole fetch runs off the async workers.
async fn fetch_blocking<F>(fetcher: Fetcher<F>, config: &FetchConfig, index: i64) -> Result<FetchOutcome>
where
    F: SessionFactory + 'static,
{
    let fetcher = fetcher.with_timeouts(config.page_load_timeout, config.export_wait);
    let outcome = task::spawn_blocking(move || fetcher.fetch(index))
        .await
        .context("fetch task failed")??;
    Ok(outcome)
}
