//! marketsim runner — backtest orchestration on top of the core engine.
//!
//! Loads a TOML run configuration, builds the data source, strategy,
//! risk gate, and broker, runs the engine, and turns the completed
//! ledger into metrics, a text report, and exported artifacts.

pub mod config;
pub mod fingerprint;
pub mod metrics;
pub mod reporting;
pub mod result;
pub mod runner;

pub use config::{BacktestConfig, BacktestSection, ConfigError, DataSection, StrategySection};
pub use fingerprint::config_fingerprint;
pub use metrics::PerfMetrics;
pub use reporting::{format_summary, save_artifacts};
pub use result::{BacktestResult, EquityPoint};
pub use runner::run_backtest;
