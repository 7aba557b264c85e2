//! Human-readable performance report.

use crate::result::BacktestResult;
use std::fmt::Write;

const RULE: &str = "==================================================";

fn format_value(value: f64, precision: usize) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{value:.precision$}")
    }
}

/// Render the standard report: a ruled header, then one aligned
/// name/value/unit line per metric.
pub fn format_summary(result: &BacktestResult) -> String {
    let metrics = &result.metrics;
    let mut out = String::new();

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Performance Report");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{:<30} {:>12}", "Bars", result.bar_count);
    let _ = writeln!(
        out,
        "{:<30} {:>12} $",
        "Starting Equity",
        format_value(result.config.backtest.initial_cash, 2)
    );
    let _ = writeln!(
        out,
        "{:<30} {:>12} $",
        "Final Equity",
        format_value(result.final_equity, 2)
    );
    let _ = writeln!(
        out,
        "{:<30} {:>12} %",
        "Total Return",
        format_value(metrics.total_return_pct, 4)
    );
    let _ = writeln!(
        out,
        "{:<30} {:>12} %",
        "Annualized Return",
        format_value(metrics.annualized_return_pct, 4)
    );
    let _ = writeln!(
        out,
        "{:<30} {:>12}",
        "Sharpe Ratio",
        format_value(metrics.sharpe_ratio, 4)
    );
    let _ = writeln!(
        out,
        "{:<30} {:>12} %",
        "Max Drawdown",
        format_value(metrics.max_drawdown_pct, 4)
    );
    let _ = writeln!(
        out,
        "{:<30} {:>12} %",
        "Win Rate",
        format_value(metrics.win_rate_pct, 4)
    );
    let _ = writeln!(out, "{:<30} {:>12}", "Num Trades", metrics.num_trades);
    let _ = writeln!(
        out,
        "{:<30} {:>12} x",
        "Profit Factor",
        format_value(metrics.profit_factor, 4)
    );
    let _ = writeln!(
        out,
        "{:<30} {:>12} $",
        "Avg PnL Per Trade",
        format_value(metrics.avg_pnl_per_trade, 4)
    );
    let _ = writeln!(out, "{RULE}");
    out
}
