//! Trade — a closed-lot record.

use super::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record appended when a fill reduces an existing position. `quantity`
/// is the portion that closed existing holdings; the opening remainder
/// of a crossing fill is absorbed into the position without a trade
/// record. `pnl` is the realized profit for the closed lot, net of the
/// fill's commission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub slippage: f64,
    pub commission: f64,
    pub pnl: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
