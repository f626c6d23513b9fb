//! CoinLab CLI — ingestion, history and forecast commands.
//!
//! Commands:
//! - `fetch` — run one ingestion cycle and print the stored batch
//! - `run` — fetch on a fixed interval until stopped (or for `--ticks N` cycles)
//! - `history` — print an asset's stored series as JSON or CSV
//! - `forecast` — print the hourly forecast for an asset
//! - `status` — summarize the day partitions

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coinlab_core::analytics;
use coinlab_core::domain::normalize_asset_id;
use coinlab_core::forecast::DEFAULT_HORIZON;
use coinlab_core::scheduler::Scheduler;
use coinlab_core::{IngestOutcome, Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(
    name = "coinlab",
    about = "CoinLab CLI — crypto quote ingestion and hourly forecasting"
)]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides DATA_DIR and the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence when set).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion cycle and print the batch.
    Fetch,
    /// Fetch on the configured interval (FETCH_INTERVAL).
    Run {
        /// Stop after this many cycles. Runs until killed when omitted.
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Print the stored price series of one asset.
    History {
        /// Asset id, e.g. bitcoin.
        asset: String,

        /// Only the trailing window of this many hours.
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        hours: Option<i64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Add a rolling-mean column over this many points.
        #[arg(long)]
        smooth: Option<usize>,
    },
    /// Forecast hourly prices. Unknown assets fall back to the default asset.
    Forecast {
        /// Asset id. Defaults to DEFAULT_COIN.
        asset: Option<String>,

        #[arg(long, default_value_t = DEFAULT_HORIZON)]
        horizon: usize,
    },
    /// Summarize the day partitions.
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Fetch => run_fetch(config),
        Commands::Run { ticks } => run_scheduled(config, ticks),
        Commands::History {
            asset,
            hours,
            format,
            smooth,
        } => run_history(config, &asset, hours, format, smooth),
        Commands::Forecast { asset, horizon } => {
            run_forecast(config, asset.as_deref().unwrap_or(""), horizon)
        }
        Commands::Status => run_status(config),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file_and_env(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::from_env().context("loading config from environment")?,
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn run_fetch(config: PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("building pipeline")?;
    match pipeline.run_ingestion().context("ingestion failed")? {
        IngestOutcome::Ingested(batch) => {
            println!("{:<12} {:>14} {:>9}  {}", "Asset", "Price", "24h %", "Captured");
            println!("{}", "-".repeat(62));
            for obs in &batch {
                println!(
                    "{:<12} {:>14.4} {:>9.2}  {}",
                    obs.asset_id,
                    obs.price,
                    obs.pct_change_24h,
                    obs.timestamp.to_rfc3339()
                );
            }
        }
        IngestOutcome::Skipped => println!("Ingestion already in progress; skipped."),
    }
    Ok(())
}

fn run_scheduled(config: PipelineConfig, ticks: Option<u64>) -> Result<()> {
    let interval = config.fetch_interval();
    let pipeline = Arc::new(Pipeline::from_config(config).context("building pipeline")?);

    let job_pipeline = Arc::clone(&pipeline);
    let handle = Scheduler::start_limited(interval, ticks, move || {
        job_pipeline.run_ingestion().map(|_| ())
    })
    .context("starting scheduler")?;

    info!(interval_secs = interval.as_secs(), ticks = ?ticks, "ingestion loop running");
    // Without a tick limit this blocks until the process is killed.
    let stats = handle.join();

    println!(
        "Ingestion cycles: {} succeeded, {} failed, {} missed",
        stats.succeeded, stats.failed, stats.missed
    );
    Ok(())
}

#[derive(Serialize)]
struct HistoryRow {
    ts: DateTime<Utc>,
    price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    smooth: Option<f64>,
}

fn run_history(
    config: PipelineConfig,
    asset: &str,
    hours: Option<i64>,
    format: OutputFormat,
    smooth: Option<usize>,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("building pipeline")?;
    let asset = normalize_asset_id(asset);
    let window = hours.map(history_window).transpose()?;
    let series = pipeline
        .store()
        .load_history(&asset, window)
        .with_context(|| format!("loading history for '{asset}'"))?;

    let smoothed = smooth
        .map(|window| analytics::smooth(&series, window))
        .transpose()?
        .map(|s| s.prices());
    let rows: Vec<HistoryRow> = series
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| HistoryRow {
            ts: p.timestamp,
            price: p.price,
            smooth: smoothed.as_ref().map(|s| s[i]),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(io::stdout().lock(), &rows)?;
            println!();
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout().lock());
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Trailing window of `hours`, rejecting spans chrono cannot represent.
fn history_window(hours: i64) -> Result<Duration> {
    Duration::try_hours(hours).ok_or_else(|| anyhow!("--hours {hours} is out of range"))
}

fn run_forecast(config: PipelineConfig, asset: &str, horizon: usize) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("building pipeline")?;
    let forecast = pipeline
        .forecaster()
        .forecast(asset, horizon)
        .context("forecast failed")?;

    println!("Asset:   {}", forecast.asset_id);
    println!("Model:   {}", forecast.model);
    println!("Horizon: {} h", forecast.horizon());
    println!();
    println!("{:<27} {:>14}", "Timestamp", "Price");
    println!("{}", "-".repeat(42));
    for (ts, price) in forecast.iter() {
        println!("{:<27} {:>14.4}", ts.to_rfc3339(), price);
    }
    Ok(())
}

fn run_status(config: PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("building pipeline")?;
    let store = pipeline.store();
    let partitions = match store.status() {
        Ok(partitions) => partitions,
        Err(e) if e.is_no_data() => {
            println!("Store is empty: {}", store.root().display());
            return Ok(());
        }
        Err(e) => return Err(e).context("reading store status"),
    };

    let total: usize = partitions.iter().map(|p| p.rows).sum();
    println!("Store: {}", store.root().display());
    println!("Partitions: {}", partitions.len());
    println!("Total rows: {total}");
    println!("Forecast back-end: {}", pipeline.forecaster().backend_name());
    println!();
    println!("{:<12} {:>8}  {}", "Day", "Rows", "Per asset");
    println!("{}", "-".repeat(50));
    for p in &partitions {
        let per_asset: Vec<String> = p
            .rows_per_asset
            .iter()
            .map(|(asset, n)| format!("{asset}={n}"))
            .collect();
        println!("{:<12} {:>8}  {}", p.day, p.rows, per_asset.join(" "));
    }
    Ok(())
}
