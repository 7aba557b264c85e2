//! marketsim CLI — run backtests and generate sample data.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file
//! - `synth` — generate a seeded random-walk CSV for experiments

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use marketsim_core::data::random_walk;
use marketsim_runner::{format_summary, run_backtest, save_artifacts, BacktestConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "marketsim", about = "marketsim CLI — event-driven backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for the artifact set.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Skip writing artifacts; print the summary only.
        #[arg(long, default_value_t = false)]
        no_artifacts: bool,
    },
    /// Generate a seeded random-walk CSV.
    Synth {
        /// Symbol name for the generated series.
        #[arg(long, default_value = "SYN")]
        symbol: String,

        /// Number of daily bars.
        #[arg(long, default_value_t = 252)]
        bars: usize,

        /// First bar date (YYYY-MM-DD).
        #[arg(long, default_value = "2020-01-02")]
        start: String,

        /// Starting price.
        #[arg(long, default_value_t = 100.0)]
        start_price: f64,

        /// Daily volatility as a fraction (0.02 = 2%).
        #[arg(long, default_value_t = 0.02)]
        volatility: f64,

        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output CSV path.
        #[arg(long, default_value = "bars.csv")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            output_dir,
            no_artifacts,
        } => cmd_run(&config, &output_dir, no_artifacts),
        Commands::Synth {
            symbol,
            bars,
            start,
            start_price,
            volatility,
            seed,
            out,
        } => cmd_synth(&symbol, bars, &start, start_price, volatility, seed, &out),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn cmd_run(config_path: &PathBuf, output_dir: &PathBuf, no_artifacts: bool) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let result = run_backtest(&config)?;
    print!("{}", format_summary(&result));

    if !no_artifacts {
        let run_dir = save_artifacts(&result, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn cmd_synth(
    symbol: &str,
    bars: usize,
    start: &str,
    start_price: f64,
    volatility: f64,
    seed: u64,
    out: &PathBuf,
) -> Result<()> {
    let start_date = chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("bad start date {start:?}, expected YYYY-MM-DD"))?;
    let start_ts = Utc
        .from_utc_datetime(&start_date.and_hms_opt(0, 0, 0).context("invalid time")?);

    let series = random_walk(symbol, start_ts, bars, start_price, volatility, seed);

    let mut writer =
        csv::Writer::from_path(out).with_context(|| format!("creating {}", out.display()))?;
    writer.write_record(["timestamp", "symbol", "open", "high", "low", "close", "volume"])?;
    for bar in &series {
        writer.write_record([
            bar.timestamp.format("%Y-%m-%d").to_string(),
            bar.symbol.clone(),
            format_field(bar.open),
            format_field(bar.high),
            format_field(bar.low),
            format_field(bar.close),
            format_field(bar.volume),
        ])?;
    }
    writer.flush()?;

    println!("Wrote {} bars to {}", series.len(), out.display());
    Ok(())
}

fn format_field(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}
