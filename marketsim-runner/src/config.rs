//! Run configuration, loaded from TOML.

use chrono::{DateTime, TimeZone, Utc};
use marketsim_core::RiskLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("[data] must set exactly one of `csv` or `synthetic`")]
    AmbiguousDataSource,
}

/// Top-level run configuration.
///
/// ```toml
/// [backtest]
/// initial_cash = 100000.0
/// slippage = 0.05
/// commission = 1.0
/// finalize_positions = true
///
/// [data]
/// csv = "bars.csv"
///
/// [strategy]
/// type = "sma_cross"
/// fast = 10
/// slow = 30
/// quantity = 100.0
///
/// [risk]
/// max_position_size = 500.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub data: DataSection,
    pub strategy: StrategySection,
    #[serde(default)]
    pub risk: RiskLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub initial_cash: f64,
    /// Per-unit slippage applied by the broker.
    #[serde(default)]
    pub slippage: f64,
    /// Per-order commission applied by the broker.
    #[serde(default)]
    pub commission: f64,
    /// Liquidate open positions when the data runs out.
    #[serde(default)]
    pub finalize_positions: bool,
}

/// Where bars come from: a CSV file or a seeded synthetic series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<SyntheticSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSection {
    pub symbol: String,
    pub bars: usize,
    pub start_price: f64,
    pub daily_volatility: f64,
    pub seed: u64,
    /// First bar timestamp; defaults to 2020-01-02 UTC.
    #[serde(default = "default_synthetic_start")]
    pub start: DateTime<Utc>,
}

fn default_synthetic_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap()
}

/// Which strategy to run, selected by the `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategySection {
    BuyAndHold {
        #[serde(default = "default_cash_fraction")]
        cash_fraction: f64,
    },
    SmaCross {
        fast: usize,
        slow: usize,
        quantity: f64,
    },
}

fn default_cash_fraction() -> f64 {
    0.95
}

impl BacktestConfig {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.data.csv, &self.data.synthetic) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(ConfigError::AmbiguousDataSource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[backtest]
initial_cash = 100000.0
slippage = 0.05
commission = 1.0
finalize_positions = true

[data]
csv = "bars.csv"

[strategy]
type = "sma_cross"
fast = 10
slow = 30
quantity = 100.0

[risk]
max_position_size = 500.0
max_drawdown = 0.2
"#;

    #[test]
    fn parses_full_config() {
        let config = BacktestConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.backtest.initial_cash, 100_000.0);
        assert_eq!(config.backtest.slippage, 0.05);
        assert!(config.backtest.finalize_positions);
        assert_eq!(config.data.csv, Some(PathBuf::from("bars.csv")));
        assert_eq!(
            config.strategy,
            StrategySection::SmaCross {
                fast: 10,
                slow: 30,
                quantity: 100.0
            }
        );
        assert_eq!(config.risk.max_position_size, Some(500.0));
        assert_eq!(config.risk.max_drawdown, Some(0.2));
        assert_eq!(config.risk.max_exposure, None);
    }

    #[test]
    fn costs_and_risk_default_to_off() {
        let config = BacktestConfig::from_toml(
            r#"
[backtest]
initial_cash = 50000.0

[data]
synthetic = { symbol = "SYN", bars = 252, start_price = 100.0, daily_volatility = 0.02, seed = 7 }

[strategy]
type = "buy_and_hold"
"#,
        )
        .unwrap();

        assert_eq!(config.backtest.slippage, 0.0);
        assert_eq!(config.backtest.commission, 0.0);
        assert!(!config.backtest.finalize_positions);
        assert!(config.risk.is_empty());
        assert_eq!(
            config.strategy,
            StrategySection::BuyAndHold {
                cash_fraction: 0.95
            }
        );
    }

    #[test]
    fn both_data_sources_rejected() {
        let result = BacktestConfig::from_toml(
            r#"
[backtest]
initial_cash = 50000.0

[data]
csv = "bars.csv"
synthetic = { symbol = "SYN", bars = 10, start_price = 100.0, daily_volatility = 0.02, seed = 7 }

[strategy]
type = "buy_and_hold"
"#,
        );
        assert!(matches!(result, Err(ConfigError::AmbiguousDataSource)));
    }

    #[test]
    fn neither_data_source_rejected() {
        let result = BacktestConfig::from_toml(
            r#"
[backtest]
initial_cash = 50000.0

[data]

[strategy]
type = "buy_and_hold"
"#,
        );
        assert!(matches!(result, Err(ConfigError::AmbiguousDataSource)));
    }

    #[test]
    fn toml_roundtrip_preserves_config() {
        let config = BacktestConfig::from_toml(SAMPLE).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed = BacktestConfig::from_toml(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }
}
