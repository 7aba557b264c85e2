//! Order types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1.0 for buys, -1.0 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// What kind of order and its trigger parameters.
///
/// The trigger price lives inside the variant so an order's type and its
/// price can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill at the bar's open price.
    Market,
    /// Fill at the limit price or better.
    Limit { limit: f64 },
    /// Fill once price trades through the stop level.
    Stop { stop: f64 },
}

impl OrderType {
    /// The limit price, if this is a limit order. Used by the exposure
    /// pre-trade check, which prices market and stop orders at zero.
    pub fn limit_price(&self) -> Option<f64> {
        match self {
            OrderType::Limit { limit } => Some(*limit),
            _ => None,
        }
    }
}

/// Broker-assigned order identifier, monotonic per broker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single order. Quantity is always a positive magnitude; direction is
/// carried by the side. Created by a strategy, consumed exactly once by
/// the matching broker, never mutated in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: OrderSide, quantity: f64, limit: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Limit { limit },
        }
    }

    pub fn stop(symbol: impl Into<String>, side: OrderSide, quantity: f64, stop: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Stop { stop },
        }
    }

    /// Quantity signed by side: positive for buys, negative for sells.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_quantity_follows_side() {
        let buy = Order::market("AAPL", OrderSide::Buy, 10.0);
        let sell = Order::market("AAPL", OrderSide::Sell, 10.0);
        assert_eq!(buy.signed_quantity(), 10.0);
        assert_eq!(sell.signed_quantity(), -10.0);
    }

    #[test]
    fn limit_price_only_for_limit_orders() {
        assert_eq!(
            Order::limit("AAPL", OrderSide::Buy, 5.0, 101.5)
                .order_type
                .limit_price(),
            Some(101.5)
        );
        assert_eq!(
            Order::stop("AAPL", OrderSide::Sell, 5.0, 98.0)
                .order_type
                .limit_price(),
            None
        );
        assert_eq!(
            Order::market("AAPL", OrderSide::Buy, 5.0)
                .order_type
                .limit_price(),
            None
        );
    }

    #[test]
    fn order_serialization_roundtrip() {
        let order = Order::stop("NVDA", OrderSide::Sell, 25.0, 97.25);
        let json = serde_json::to_string(&order).unwrap();
        let deser: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deser);
    }
}
