//! Bar — one OHLCV price observation for a single symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OHLCV observation for a single symbol at a single timestamp.
///
/// Only `symbol` and `timestamp` are guaranteed; any price or volume
/// column may be missing in sparse feeds. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl Bar {
    /// The price a mark-to-market pass should use: close, falling back
    /// to open when the close is missing.
    pub fn observation_price(&self) -> Option<f64> {
        self.close.or(self.open)
    }

    /// The price execution starts from: open, falling back to close.
    /// Returns `None` when the bar carries no price at all.
    pub fn execution_open(&self) -> Option<f64> {
        self.open.or(self.close)
    }

    /// Basic OHLC sanity check on fully populated bars. Bars with
    /// missing columns are not rejected here; gaps are handled at the
    /// matching layer.
    pub fn is_sane(&self) -> bool {
        match (self.open, self.high, self.low, self.close) {
            (Some(o), Some(h), Some(l), Some(c)) => {
                h >= l && h >= o && h >= c && l <= o && l <= c && o > 0.0 && c > 0.0
            }
            _ => true,
        }
    }
}

/// One time-aligned batch of observations across all tracked symbols.
///
/// A simulation step consumes exactly one batch. BTreeMap keeps symbol
/// iteration order deterministic across runs.
pub type MultiBar = BTreeMap<String, Bar>;
