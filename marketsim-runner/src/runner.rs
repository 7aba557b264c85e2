//! Backtest orchestration: config in, result out.

use crate::config::{BacktestConfig, StrategySection};
use crate::fingerprint::config_fingerprint;
use crate::metrics::PerfMetrics;
use crate::result::{BacktestResult, EquityPoint};
use anyhow::{Context, Result};
use marketsim_core::data::{load_bars_csv, random_walk};
use marketsim_core::{
    BacktestEngine, Bar, BuyAndHold, EngineConfig, LimitRiskGate, MatchingBroker, MemorySource,
    NoopRiskGate, RiskGate, SmaCross, Strategy,
};
use tracing::info;

/// Run one backtest described by `config`.
pub fn run_backtest(config: &BacktestConfig) -> Result<BacktestResult> {
    let fingerprint = config_fingerprint(config);
    info!(fingerprint = %fingerprint, "starting backtest");

    let bars = load_bars(config)?;
    let source = MemorySource::from_bars(bars).context("aligning bars into batches")?;

    let strategy: Box<dyn Strategy> = match &config.strategy {
        StrategySection::BuyAndHold { cash_fraction } => Box::new(BuyAndHold::new(*cash_fraction)),
        StrategySection::SmaCross {
            fast,
            slow,
            quantity,
        } => Box::new(SmaCross::new(*fast, *slow, *quantity)),
    };

    let risk_gate: Box<dyn RiskGate> = if config.risk.is_empty() {
        Box::new(NoopRiskGate)
    } else {
        Box::new(LimitRiskGate::new(config.risk))
    };

    let broker = MatchingBroker::with_costs(
        config.backtest.initial_cash,
        config.backtest.slippage,
        config.backtest.commission,
    );
    let engine_config = EngineConfig {
        initial_cash: config.backtest.initial_cash,
        finalize_positions: config.backtest.finalize_positions,
    };

    let mut engine =
        BacktestEngine::new(Box::new(source), strategy, broker, risk_gate, engine_config);
    let run = engine.run().context("backtest run failed")?;

    let metrics = PerfMetrics::compute(
        &run.trades,
        &run.equity_curve,
        config.backtest.initial_cash,
    );

    Ok(BacktestResult {
        fingerprint,
        config: config.clone(),
        bar_count: run.bar_count,
        final_equity: run.final_equity,
        metrics,
        trades: run.trades,
        equity_curve: run
            .equity_curve
            .into_iter()
            .map(|(timestamp, equity)| EquityPoint { timestamp, equity })
            .collect(),
    })
}

fn load_bars(config: &BacktestConfig) -> Result<Vec<Bar>> {
    if let Some(path) = &config.data.csv {
        return load_bars_csv(path).with_context(|| format!("loading {}", path.display()));
    }
    if let Some(synthetic) = &config.data.synthetic {
        return Ok(random_walk(
            &synthetic.symbol,
            synthetic.start,
            synthetic.bars,
            synthetic.start_price,
            synthetic.daily_volatility,
            synthetic.seed,
        ));
    }
    // from_toml validation rules this out.
    anyhow::bail!("no data source configured")
}
