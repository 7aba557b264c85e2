//! Portfolio — the cash/position/PnL ledger.
//!
//! Applies fills, marks open positions to market, and records the
//! equity curve. Cash may go negative: margin is out of scope and there
//! is deliberately no guard here.

use crate::domain::{Fill, OrderSide, Position, Trade};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Tracks cash, positions, closed-lot trades, and the equity curve for
/// one backtest run.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub initial_cash: f64,
    pub cash: f64,
    positions: HashMap<String, Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<(DateTime<Utc>, f64)>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            positions: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    /// Apply one fill: update cash and the named position, and append a
    /// closed-lot [`Trade`] when the fill reduces existing quantity.
    ///
    /// Buy against a short closes up to the short's magnitude first;
    /// any remainder opens a long lot at the fill price. Sell mirrors
    /// this for longs. Adding to a long folds the commission into the
    /// weighted average entry price; adding to a short does not.
    pub fn apply_fill(&mut self, fill: &Fill) {
        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::flat(fill.symbol.clone()));

        let cost = fill.quantity * fill.price + fill.commission;
        let mut closed: Option<(f64, f64)> = None;

        match fill.side {
            OrderSide::Buy => {
                if position.quantity < 0.0 {
                    // Covering a short: close up to the short's magnitude.
                    let close_quantity = position.quantity.abs().min(fill.quantity);
                    let pnl = (position.avg_price - fill.price) * close_quantity - fill.commission;
                    position.realized_pnl += pnl;
                    position.quantity += close_quantity;
                    self.cash += fill.quantity * fill.price - cost;
                    closed = Some((close_quantity, pnl));

                    if fill.quantity > close_quantity {
                        // Remainder opens a fresh long lot.
                        let remaining = fill.quantity - close_quantity;
                        position.avg_price = fill.price;
                        position.quantity = remaining;
                        self.cash -= remaining * fill.price;
                    }
                } else {
                    // Opening or adding to a long; commission is part of
                    // the basis.
                    let total_cost = position.avg_price * position.quantity + cost;
                    position.quantity += fill.quantity;
                    position.avg_price = if position.quantity > 0.0 {
                        total_cost / position.quantity
                    } else {
                        0.0
                    };
                    self.cash -= cost;
                }
            }
            OrderSide::Sell => {
                if position.quantity > 0.0 {
                    // Reducing a long.
                    let close_quantity = position.quantity.min(fill.quantity);
                    let pnl = (fill.price - position.avg_price) * close_quantity - fill.commission;
                    position.realized_pnl += pnl;
                    position.quantity -= close_quantity;
                    self.cash += close_quantity * fill.price - fill.commission;
                    closed = Some((close_quantity, pnl));

                    if fill.quantity > close_quantity {
                        // Remainder opens a fresh short lot.
                        let remaining = fill.quantity - close_quantity;
                        position.avg_price = fill.price;
                        position.quantity = -remaining;
                        self.cash += remaining * fill.price - fill.commission;
                    }
                } else {
                    // Opening or adding to a short; basis excludes
                    // commission.
                    let total_proceeds =
                        (position.avg_price * position.quantity).abs() + fill.quantity * fill.price;
                    position.quantity -= fill.quantity;
                    position.avg_price = if position.quantity < 0.0 {
                        (total_proceeds / position.quantity).abs()
                    } else {
                        0.0
                    };
                    self.cash += fill.quantity * fill.price - fill.commission;
                }
            }
        }

        // A closed position carries no basis and no open PnL.
        if position.quantity == 0.0 {
            position.avg_price = 0.0;
            position.unrealized_pnl = 0.0;
        }

        if let Some((quantity, pnl)) = closed {
            self.trades.push(Trade {
                timestamp: fill.timestamp,
                symbol: fill.symbol.clone(),
                side: fill.side,
                quantity,
                price: fill.price,
                slippage: fill.slippage,
                commission: fill.commission,
                pnl,
            });
        }
    }

    /// Mark every open position to market for the symbols present in
    /// `current_prices`. Positions without a quoted price keep their
    /// previous mark.
    pub fn update_unrealized_pnl(&mut self, current_prices: &HashMap<String, f64>) {
        for (symbol, position) in &mut self.positions {
            if position.quantity == 0.0 {
                continue;
            }
            let Some(&current_price) = current_prices.get(symbol) else {
                continue;
            };
            position.unrealized_pnl = if position.quantity > 0.0 {
                (current_price - position.avg_price) * position.quantity
            } else {
                (position.avg_price - current_price) * position.quantity.abs()
            };
        }
    }

    /// Total equity: cash plus each position's cost-basis value plus its
    /// unrealized delta — i.e. cash plus mark-to-market value.
    pub fn total_equity(&self) -> f64 {
        let open_value: f64 = self
            .positions
            .values()
            .map(|p| p.basis_value() + p.unrealized_pnl)
            .sum();
        self.cash + open_value
    }

    /// Gross exposure: sum of absolute cost-basis values.
    pub fn gross_exposure(&self) -> f64 {
        self.positions.values().map(|p| p.basis_value().abs()).sum()
    }

    /// Append the current equity to the equity curve.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>) {
        self.equity_curve.push((timestamp, self.total_equity()));
    }

    /// The position for `symbol`, created (flat) on first access so
    /// callers never need an existence check.
    pub fn position(&mut self, symbol: &str) -> &Position {
        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol))
    }

    /// Signed quantity for `symbol` without creating a position.
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[(DateTime<Utc>, f64)] {
        &self.equity_curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderId;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap()
    }

    fn fill(side: OrderSide, quantity: f64, price: f64, commission: f64) -> Fill {
        Fill {
            order_id: OrderId(1),
            timestamp: ts(),
            symbol: "AAPL".into(),
            side,
            quantity,
            price,
            slippage: 0.0,
            commission,
        }
    }

    #[test]
    fn buy_opens_long_position() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 150.0, 1.0));

        let pos = portfolio.position("AAPL");
        assert_eq!(pos.quantity, 10.0);
        // Commission is part of the long basis: (150*10 + 1) / 10.
        assert!((pos.avg_price - 150.1).abs() < 1e-10);
        assert_eq!(portfolio.cash, 100_000.0 - 1_500.0 - 1.0);
        assert!(portfolio.trades().is_empty());
    }

    #[test]
    fn sell_opens_short_position() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Sell, 10.0, 150.0, 1.0));

        let pos = portfolio.position("AAPL");
        assert_eq!(pos.quantity, -10.0);
        // Short basis excludes commission.
        assert_eq!(pos.avg_price, 150.0);
        assert_eq!(portfolio.cash, 100_000.0 + 1_500.0 - 1.0);
        assert!(portfolio.trades().is_empty());
    }

    #[test]
    fn sell_closes_long_and_records_trade() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 150.0, 1.0));
        portfolio.apply_fill(&fill(OrderSide::Sell, 10.0, 155.0, 1.0));

        let pos = portfolio.position("AAPL");
        assert_eq!(pos.quantity, 0.0);
        assert_eq!(pos.avg_price, 0.0);

        assert_eq!(portfolio.trades().len(), 1);
        // (155 - 150.1) * 10 - 1 = 48
        assert!((portfolio.trades()[0].pnl - 48.0).abs() < 1e-10);
    }

    #[test]
    fn buy_closes_short_and_records_trade() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Sell, 10.0, 150.0, 1.0));
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 145.0, 1.0));

        let pos = portfolio.position("AAPL");
        assert_eq!(pos.quantity, 0.0);
        assert_eq!(portfolio.trades().len(), 1);
        // (150 - 145) * 10 - 1 = 49
        assert!((portfolio.trades()[0].pnl - 49.0).abs() < 1e-10);
    }

    #[test]
    fn partial_sell_keeps_original_basis() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 100.0, 0.0));
        portfolio.apply_fill(&fill(OrderSide::Sell, 5.0, 110.0, 0.0));

        let pos = portfolio.position("AAPL");
        assert_eq!(pos.quantity, 5.0);
        assert_eq!(pos.avg_price, 100.0);
        assert_eq!(portfolio.trades().len(), 1);
        assert!((portfolio.trades()[0].pnl - 50.0).abs() < 1e-10);
        assert_eq!(portfolio.trades()[0].quantity, 5.0);
    }

    #[test]
    fn crossing_sell_opens_short_remainder() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 100.0, 0.0));
        portfolio.apply_fill(&fill(OrderSide::Sell, 15.0, 110.0, 0.0));

        let pos = portfolio.position("AAPL");
        assert_eq!(pos.quantity, -5.0);
        assert_eq!(pos.avg_price, 110.0);
        // Only the closing portion produced a trade record.
        assert_eq!(portfolio.trades().len(), 1);
        assert_eq!(portfolio.trades()[0].quantity, 10.0);
    }

    #[test]
    fn buy_averages_into_existing_long() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 50.0, 100.0, 0.0));
        portfolio.apply_fill(&fill(OrderSide::Buy, 50.0, 110.0, 0.0));

        let pos = portfolio.position("AAPL");
        assert_eq!(pos.quantity, 100.0);
        assert!((pos.avg_price - 105.0).abs() < 1e-10);
    }

    #[test]
    fn unrealized_pnl_marks_long_and_short() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 150.0, 0.0));

        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 155.0);
        portfolio.update_unrealized_pnl(&prices);
        assert_eq!(portfolio.position("AAPL").unrealized_pnl, 50.0);

        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Sell, 10.0, 150.0, 0.0));
        prices.insert("AAPL".to_string(), 145.0);
        portfolio.update_unrealized_pnl(&prices);
        assert_eq!(portfolio.position("AAPL").unrealized_pnl, 50.0);
    }

    #[test]
    fn unrealized_pnl_skips_unquoted_symbols() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 150.0, 0.0));

        portfolio.update_unrealized_pnl(&HashMap::new());
        assert_eq!(portfolio.position("AAPL").unrealized_pnl, 0.0);
    }

    #[test]
    fn total_equity_includes_basis_and_mark() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 150.0, 0.0));

        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 155.0);
        portfolio.update_unrealized_pnl(&prices);

        // cash 98500 + basis 1500 + unrealized 50
        assert!((portfolio.total_equity() - 100_050.0).abs() < 1e-10);
    }

    #[test]
    fn long_round_trip_equity_identity() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 100.0, 2.5));
        portfolio.apply_fill(&fill(OrderSide::Sell, 10.0, 110.0, 2.5));

        let pnl_sum: f64 = portfolio.trades().iter().map(|t| t.pnl).sum();
        assert!((portfolio.total_equity() - (100_000.0 + pnl_sum)).abs() < 1e-10);
    }

    #[test]
    fn record_equity_appends_samples() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.record_equity(ts());
        assert_eq!(portfolio.equity_curve().len(), 1);
        assert_eq!(portfolio.equity_curve()[0].1, 100_000.0);
    }

    #[test]
    fn position_access_is_idempotent() {
        let mut portfolio = Portfolio::new(100_000.0);
        let first = portfolio.position("AAPL").clone();
        let second = portfolio.position("AAPL").clone();
        assert_eq!(first, second);
        assert_eq!(portfolio.quantity("AAPL"), 0.0);
    }

    #[test]
    fn cash_may_go_negative() {
        let mut portfolio = Portfolio::new(100.0);
        portfolio.apply_fill(&fill(OrderSide::Buy, 10.0, 150.0, 0.0));
        assert!(portfolio.cash < 0.0);
    }
}
