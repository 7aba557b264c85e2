//! Completed-run result types.

use crate::config::BacktestConfig;
use crate::metrics::PerfMetrics;
use chrono::{DateTime, Utc};
use marketsim_core::Trade;
use serde::{Deserialize, Serialize};

/// One equity-curve sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Everything a report or artifact writer needs from one run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub fingerprint: String,
    pub config: BacktestConfig,
    pub bar_count: usize,
    pub final_equity: f64,
    pub metrics: PerfMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}
