//! candlesync Server - Headless snapshot pipeline
//!
//! Replays one or more CSV candle files through the market data pipeline and logs every
//! synchronized snapshot. Metrics are pushed via structured JSON logs to stdout.
//!
//! # Usage
//! ```sh
//! SYMBOLS=BTC/USDT,ETH/USDT TIMEFRAME=15m cargo run --bin server -- --source btc.csv --source eth.csv
//! ```
//!
//! # Environment Variables
//! - `SYMBOLS` - Comma separated tracked symbols (default: BTC/USDT,ETH/USDT)
//! - `TIMEFRAME` - Output timeframe, e.g. 5m, 4h, 1d, 1M (default: 5m)
//! - `GAP_FILL_ENABLED` / `FUTURE_GUARD_ENABLED` - Optional stages (default: true)
//! - `SOURCE_FILES` - Comma separated CSV files
//! - `OBSERVABILITY_ENABLED` - Enable metrics reporting (default: true)
//! - `OBSERVABILITY_INTERVAL` - Interval in seconds between metric outputs (default: 60)

use anyhow::{Context, Result};
use candlesync::application::pipeline::MarketDataPipeline;
use candlesync::config::Config;
use candlesync::domain::market::Timeframe;
use candlesync::infrastructure::csv_source::csv_source;
use candlesync::infrastructure::observability::{Metrics, MetricsReporter};
use candlesync::infrastructure::{LoggingSink, SystemClock};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Multi-source candle synchronizer", long_about = None)]
struct Cli {
    /// Tracked symbols, overrides SYMBOLS
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Output timeframe (1m..12h, 1d, 1w, 1M, 3M, 6M, 1y), overrides TIMEFRAME
    #[arg(short, long)]
    timeframe: Option<Timeframe>,

    /// CSV source file, repeatable, overrides SOURCE_FILES
    #[arg(long = "source")]
    sources: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("candlesync Server {} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    if !cli.symbols.is_empty() {
        config.symbols = cli.symbols;
    }
    if let Some(timeframe) = cli.timeframe {
        config.timeframe = timeframe;
    }
    if !cli.sources.is_empty() {
        config.source_files = cli.sources;
    }
    info!(
        "Configuration loaded: Symbols={:?}, Timeframe={}, Sources={:?}",
        config.symbols, config.timeframe, config.source_files
    );

    if config.source_files.is_empty() {
        anyhow::bail!("No source files given (use --source or SOURCE_FILES)");
    }
    let sources = config
        .source_files
        .iter()
        .map(csv_source)
        .collect::<Result<Vec<_>>>()
        .context("Failed to open sources")?;

    let metrics = Metrics::new()?;
    let pipeline = MarketDataPipeline::new(config.pipeline_settings(), Arc::new(SystemClock))
        .with_metrics(metrics.clone());

    // Start metrics reporter if enabled
    if config.observability_enabled {
        let reporter = MetricsReporter::new(metrics.clone(), config.observability_interval);
        tokio::spawn(async move {
            reporter.run().await;
        });
        info!(
            "Metrics reporter started (interval: {}s)",
            config.observability_interval
        );
    } else {
        info!("Metrics reporting disabled.");
    }

    tokio::select! {
        result = pipeline.run(sources, &LoggingSink) => {
            let report = result?;
            info!(
                "Replay complete: {} snapshot(s) from {:?} to {:?}",
                report.snapshots_emitted, report.first_timestamp, report.last_timestamp
            );
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Shutdown signal received. Dropping sources...");
        }
    }

    if config.observability_enabled {
        MetricsReporter::new(metrics, config.observability_interval).report();
    }

    Ok(())
}
