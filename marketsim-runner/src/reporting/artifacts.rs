//! Artifact export: trades.csv, equity.csv, manifest.json per run.

use crate::result::BacktestResult;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    fingerprint: &'a str,
    config: &'a crate::config::BacktestConfig,
    bar_count: usize,
    final_equity: f64,
    metrics: &'a crate::metrics::PerfMetrics,
}

#[derive(Debug, Serialize)]
struct EquityRow {
    timestamp: String,
    equity: f64,
}

/// Write the full artifact set under `output_dir/<short fingerprint>/`
/// and return the run directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short = result.fingerprint.get(..12).unwrap_or(&result.fingerprint);
    let run_dir = output_dir.join(short);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating {}", run_dir.display()))?;

    write_trades_csv(&run_dir.join("trades.csv"), result)?;
    write_equity_csv(&run_dir.join("equity.csv"), result)?;
    write_manifest(&run_dir.join("manifest.json"), result)?;

    Ok(run_dir)
}

fn write_trades_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for trade in &result.trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_equity_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for point in &result.equity_curve {
        writer.serialize(EquityRow {
            timestamp: point.timestamp.to_rfc3339(),
            equity: point.equity,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_manifest(path: &Path, result: &BacktestResult) -> Result<()> {
    let manifest = Manifest {
        fingerprint: &result.fingerprint,
        config: &result.config,
        bar_count: result.bar_count,
        final_equity: result.final_equity,
        metrics: &result.metrics,
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &manifest)?;
    Ok(())
}
