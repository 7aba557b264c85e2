//! Fill record.

use super::order::{OrderId, OrderSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one executed order. Exactly one fill per matched order —
/// there are no partial fills in this model. `price` already includes
/// slippage; `slippage` and `commission` are the total costs recorded
/// for the fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub slippage: f64,
    pub commission: f64,
}
