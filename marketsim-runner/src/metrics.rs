//! Performance metrics computed from a completed ledger.

use chrono::{DateTime, Utc};
use marketsim_core::Trade;
use serde::{Deserialize, Serialize};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// The standard metric set for a run. Returns and drawdown are
/// percentages; drawdown is negative or zero (peak-relative decline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfMetrics {
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub num_trades: usize,
    pub profit_factor: f64,
    pub avg_pnl_per_trade: f64,
}

impl PerfMetrics {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[(DateTime<Utc>, f64)],
        initial_cash: f64,
    ) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|(_, e)| *e).collect();
        let timestamps: Vec<DateTime<Utc>> = equity_curve.iter().map(|(t, _)| *t).collect();

        Self {
            total_return_pct: total_return(&equity, initial_cash),
            annualized_return_pct: annualized_return(&equity, initial_cash, &timestamps),
            sharpe_ratio: sharpe_ratio(&equity),
            max_drawdown_pct: max_drawdown(&equity),
            win_rate_pct: win_rate(trades),
            num_trades: trades.len(),
            profit_factor: profit_factor(trades),
            avg_pnl_per_trade: avg_pnl(trades),
        }
    }
}

fn total_return(equity: &[f64], initial_cash: f64) -> f64 {
    match equity.last() {
        Some(final_equity) => ((final_equity - initial_cash) / initial_cash) * 100.0,
        None => 0.0,
    }
}

fn annualized_return(equity: &[f64], initial_cash: f64, timestamps: &[DateTime<Utc>]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let years = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) if last > first => {
            (*last - *first).num_days() as f64 / 365.25
        }
        // No usable span: assume one sample per trading day.
        _ => equity.len() as f64 / TRADING_DAYS_PER_YEAR,
    };
    if years <= 0.0 {
        return 0.0;
    }
    let final_equity = equity[equity.len() - 1];
    ((final_equity / initial_cash).powf(1.0 / years) - 1.0) * 100.0
}

/// Annualized Sharpe ratio over per-sample simple returns, risk-free
/// rate zero.
fn sharpe_ratio(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = equity
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    (mean / std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Largest peak-to-trough decline, as a non-positive percentage.
fn max_drawdown(equity: &[f64]) -> f64 {
    let mut running_max = f64::MIN;
    let mut worst = 0.0f64;
    for &value in equity {
        running_max = running_max.max(value);
        let drawdown = (value - running_max) / running_max;
        worst = worst.min(drawdown);
    }
    worst * 100.0
}

fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.pnl > 0.0).count();
    (winners as f64 / trades.len() as f64) * 100.0
}

/// Gross profit over gross loss. Infinite for all-winning tapes, zero
/// for no trades.
fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();
    if gross_loss == 0.0 {
        return if gross_profit > 0.0 { f64::INFINITY } else { 0.0 };
    }
    gross_profit / gross_loss
}

fn avg_pnl(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.pnl).sum::<f64>() / trades.len() as f64
}
