//! Matching broker — simulates order execution against per-bar quotes.
//!
//! Open orders are evaluated once per simulation step, in FIFO creation
//! order, against the bar for their symbol:
//!
//! - market: fills at the bar's open
//! - limit buy: fills when `low <= limit`, at `min(open, limit)`
//! - limit sell: fills when `high >= limit`, at `max(open, limit)`
//! - stop buy: fills when `high >= stop`, at `max(open, stop)`
//! - stop sell: fills when `low <= stop`, at `min(open, stop)`
//!
//! Open falls back to close when absent; high/low fall back to the open
//! price. A bar with neither open nor close, or a step with no bar for
//! the symbol, leaves the order open. Touching a boundary exactly fills.
//! This table is the compatibility surface of the matching engine — do
//! not change a branch without a pinning test.

use crate::domain::{Bar, Fill, MultiBar, Order, OrderId, OrderSide, OrderType, Position, Trade};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors from order submission.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("zero-quantity order for {0}")]
    ZeroQuantity(String),

    #[error("no price reference for {0}: no bar this step and no cached price")]
    NoPriceReference(String),
}

/// Execution simulator with flat per-unit slippage, flat per-order
/// commission, and lightweight standalone position/trade bookkeeping.
pub struct MatchingBroker {
    open_orders: Vec<(OrderId, Order)>,
    trades: Vec<Trade>,
    closed_trades: Vec<Trade>,
    positions: HashMap<String, Position>,
    cash: f64,
    slippage: f64,
    commission: f64,
    /// Last observed price per symbol, fed by every processed bar.
    last_price: HashMap<String, f64>,
    next_order_id: u64,
}

impl MatchingBroker {
    pub fn new(initial_cash: f64) -> Self {
        Self::with_costs(initial_cash, 0.0, 0.0)
    }

    /// `slippage` is per unit (added for buys, subtracted for sells);
    /// `commission` is per order.
    pub fn with_costs(initial_cash: f64, slippage: f64, commission: f64) -> Self {
        Self {
            open_orders: Vec::new(),
            trades: Vec::new(),
            closed_trades: Vec::new(),
            positions: HashMap::new(),
            cash: initial_cash,
            slippage,
            commission,
            last_price: HashMap::new(),
            next_order_id: 0,
        }
    }

    /// Create and queue an order from a signed quantity. The side is
    /// derived from the sign; the type from which price is supplied.
    /// When both a limit and a stop are given, limit wins.
    ///
    /// Fails on zero quantity; never coerced.
    pub fn new_order(
        &mut self,
        symbol: &str,
        signed_quantity: f64,
        limit: Option<f64>,
        stop: Option<f64>,
    ) -> Result<OrderId, BrokerError> {
        if signed_quantity == 0.0 {
            return Err(BrokerError::ZeroQuantity(symbol.to_string()));
        }
        let side = if signed_quantity > 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let order_type = match (limit, stop) {
            (Some(limit), _) => OrderType::Limit { limit },
            (None, Some(stop)) => OrderType::Stop { stop },
            (None, None) => OrderType::Market,
        };
        let order = Order {
            symbol: symbol.to_string(),
            side,
            quantity: signed_quantity.abs(),
            order_type,
        };
        Ok(self.enqueue(order))
    }

    /// Submit a strategy-built order against the current step.
    ///
    /// With a bar for the order's symbol the order joins the open set
    /// and is matched by this step's [`process_orders`] pass. With no
    /// bar, a market order falls back to the cached last-known price and
    /// fills immediately; limit/stop orders wait for a bar. A market
    /// order with neither a bar nor a cached price is an error.
    ///
    /// [`process_orders`]: MatchingBroker::process_orders
    pub fn submit_order(
        &mut self,
        order: Order,
        current_bar: Option<&Bar>,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Fill>, BrokerError> {
        if order.quantity == 0.0 {
            return Err(BrokerError::ZeroQuantity(order.symbol));
        }

        if current_bar.is_none() && order.order_type == OrderType::Market {
            let Some(&price) = self.last_price.get(&order.symbol) else {
                return Err(BrokerError::NoPriceReference(order.symbol));
            };
            let id = self.allocate_id();
            debug!(order_id = %id, symbol = %order.symbol, price, "market fill at cached price");
            return Ok(Some(self.fill_order(id, &order, price, timestamp)));
        }

        self.enqueue(order);
        Ok(None)
    }

    /// Evaluate every open order once against this step's bars, in FIFO
    /// creation order. Orders whose symbol has no bar this step, or
    /// whose bar has no usable price, stay open. Returns the fills in
    /// execution order.
    pub fn process_orders(&mut self, bars: &MultiBar) -> Vec<Fill> {
        let mut fills = Vec::new();
        let mut still_open = Vec::new();

        for (id, order) in std::mem::take(&mut self.open_orders) {
            let Some(bar) = bars.get(&order.symbol) else {
                still_open.push((id, order));
                continue;
            };
            let Some(open_price) = bar.execution_open() else {
                still_open.push((id, order));
                continue;
            };
            let high = bar.high.unwrap_or(open_price);
            let low = bar.low.unwrap_or(open_price);

            let base_price = match (order.order_type, order.side) {
                (OrderType::Market, _) => Some(open_price),
                (OrderType::Limit { limit }, OrderSide::Buy) if low <= limit => {
                    Some(open_price.min(limit))
                }
                (OrderType::Limit { limit }, OrderSide::Sell) if high >= limit => {
                    Some(open_price.max(limit))
                }
                (OrderType::Stop { stop }, OrderSide::Buy) if high >= stop => {
                    Some(open_price.max(stop))
                }
                (OrderType::Stop { stop }, OrderSide::Sell) if low <= stop => {
                    Some(open_price.min(stop))
                }
                _ => None,
            };

            match base_price {
                Some(base) => fills.push(self.fill_order(id, &order, base, bar.timestamp)),
                None => still_open.push((id, order)),
            }
        }

        self.open_orders = still_open;

        // Refresh the last-known price cache from this step's bars.
        for (symbol, bar) in bars {
            if let Some(price) = bar.observation_price() {
                self.last_price.insert(symbol.clone(), price);
            }
        }

        fills
    }

    fn enqueue(&mut self, order: Order) -> OrderId {
        let id = self.allocate_id();
        debug!(order_id = %id, symbol = %order.symbol, side = ?order.side,
               quantity = order.quantity, order_type = ?order.order_type, "order queued");
        self.open_orders.push((id, order));
        id
    }

    fn allocate_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId(self.next_order_id)
    }

    /// Execute an order at `base_price`: apply slippage and commission,
    /// update the standalone books, and record the trade.
    fn fill_order(
        &mut self,
        id: OrderId,
        order: &Order,
        base_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Fill {
        let fill_price = match order.side {
            OrderSide::Buy => base_price + self.slippage,
            OrderSide::Sell => base_price - self.slippage,
        };
        let slippage_cost = order.quantity * self.slippage;

        let realized = self.apply_to_books(order, fill_price);
        let pnl = realized - self.commission;

        match order.side {
            OrderSide::Buy => self.cash -= order.quantity * fill_price + self.commission,
            OrderSide::Sell => self.cash += order.quantity * fill_price - self.commission,
        }

        let trade = Trade {
            timestamp,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: fill_price,
            slippage: slippage_cost,
            commission: self.commission,
            pnl,
        };
        self.trades.push(trade.clone());
        if pnl != 0.0 {
            self.closed_trades.push(trade);
        }

        debug!(order_id = %id, symbol = %order.symbol, price = fill_price, pnl, "order filled");

        Fill {
            order_id: id,
            timestamp,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: fill_price,
            slippage: slippage_cost,
            commission: self.commission,
        }
    }

    /// Update the broker's own position books and return the realized
    /// PnL of any closed portion. Basis here is a plain volume-weighted
    /// average, commission excluded — lighter than the ledger's.
    fn apply_to_books(&mut self, order: &Order, fill_price: f64) -> f64 {
        let position = self
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position::flat(order.symbol.clone()));

        let mut realized = 0.0;
        match order.side {
            OrderSide::Buy => {
                if position.quantity < 0.0 {
                    let close_quantity = position.quantity.abs().min(order.quantity);
                    realized = (position.avg_price - fill_price) * close_quantity;
                    position.realized_pnl += realized;
                    position.quantity += close_quantity;
                    if order.quantity > close_quantity {
                        position.quantity = order.quantity - close_quantity;
                        position.avg_price = fill_price;
                    }
                } else {
                    let total = position.avg_price * position.quantity
                        + fill_price * order.quantity;
                    position.quantity += order.quantity;
                    position.avg_price = total / position.quantity;
                }
            }
            OrderSide::Sell => {
                if position.quantity > 0.0 {
                    let close_quantity = position.quantity.min(order.quantity);
                    realized = (fill_price - position.avg_price) * close_quantity;
                    position.realized_pnl += realized;
                    position.quantity -= close_quantity;
                    if order.quantity > close_quantity {
                        position.quantity = -(order.quantity - close_quantity);
                        position.avg_price = fill_price;
                    }
                } else {
                    let total = position.avg_price * position.quantity.abs()
                        + fill_price * order.quantity;
                    position.quantity -= order.quantity;
                    position.avg_price = total / position.quantity.abs();
                }
            }
        }
        if position.quantity == 0.0 {
            position.avg_price = 0.0;
            position.unrealized_pnl = 0.0;
        }
        realized
    }

    pub fn open_orders(&self) -> &[(OrderId, Order)] {
        &self.open_orders
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_price.get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_bar(symbol: &str, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: None,
        }
    }

    fn single(bar: Bar) -> MultiBar {
        let mut bars = MultiBar::new();
        bars.insert(bar.symbol.clone(), bar);
        bars
    }

    #[test]
    fn market_order_fills_on_open() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, None, None).unwrap();

        let fills = broker.process_orders(&single(make_bar("AAPL", 100.0, 105.0, 95.0, 102.0)));

        assert_eq!(fills.len(), 1);
        assert!(broker.open_orders().is_empty());
        assert_eq!(broker.trades().len(), 1);
        assert_eq!(broker.trades()[0].price, 100.0);
        assert_eq!(broker.positions()["AAPL"].quantity, 10.0);
        assert_eq!(broker.positions()["AAPL"].avg_price, 100.0);
    }

    #[test]
    fn limit_buy_fills_at_limit_or_open() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, Some(100.0), None).unwrap();

        // low 99 <= limit 100 → fills at min(open 105, limit 100) = 100.
        let fills = broker.process_orders(&single(make_bar("AAPL", 105.0, 106.0, 99.0, 104.0)));

        assert_eq!(fills.len(), 1);
        assert_eq!(broker.trades()[0].price, 100.0);
        assert_eq!(broker.positions()["AAPL"].avg_price, 100.0);
    }

    #[test]
    fn limit_buy_improves_when_open_below_limit() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, Some(100.0), None).unwrap();

        // Open 97 below the limit: fill at the better open price.
        let fills = broker.process_orders(&single(make_bar("AAPL", 97.0, 101.0, 96.0, 99.0)));
        assert_eq!(fills[0].price, 97.0);
    }

    #[test]
    fn limit_sell_fills_at_limit_or_open() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", -10.0, Some(105.0), None).unwrap();

        // high 106 >= limit 105 → fills at max(open 100, limit 105) = 105.
        let fills = broker.process_orders(&single(make_bar("AAPL", 100.0, 106.0, 99.0, 104.0)));
        assert_eq!(fills[0].price, 105.0);
    }

    #[test]
    fn stop_sell_triggers_at_stop_or_open() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", -5.0, None, Some(98.0)).unwrap();

        // low 95 <= stop 98 → fills at min(open 100, stop 98) = 98.
        let fills = broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 95.0, 97.0)));

        assert_eq!(fills.len(), 1);
        assert_eq!(broker.trades()[0].price, 98.0);
        assert_eq!(broker.positions()["AAPL"].quantity, -5.0);
        assert_eq!(broker.positions()["AAPL"].avg_price, 98.0);
    }

    #[test]
    fn stop_buy_triggers_on_high() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 5.0, None, Some(104.0)).unwrap();

        // high 105 >= stop 104 → fills at max(open 100, stop 104) = 104.
        let fills = broker.process_orders(&single(make_bar("AAPL", 100.0, 105.0, 99.0, 103.0)));
        assert_eq!(fills[0].price, 104.0);
    }

    #[test]
    fn boundary_touch_fills_exactly() {
        // Limit buy where the low touches the limit exactly.
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, Some(99.0), None).unwrap();
        let fills = broker.process_orders(&single(make_bar("AAPL", 105.0, 106.0, 99.0, 104.0)));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 99.0);

        // Stop sell where the low touches the stop exactly.
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", -5.0, None, Some(98.0)).unwrap();
        let fills = broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 98.0, 99.0)));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 98.0);
    }

    #[test]
    fn unfilled_limit_stays_open() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", -5.0, Some(105.0), None).unwrap();

        let fills = broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 99.0, 100.0)));

        assert!(fills.is_empty());
        assert_eq!(broker.open_orders().len(), 1);
        assert!(broker.trades().is_empty());
    }

    #[test]
    fn missing_bar_leaves_order_open() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, None, None).unwrap();

        let fills = broker.process_orders(&single(make_bar("MSFT", 100.0, 101.0, 99.0, 100.0)));
        assert!(fills.is_empty());
        assert_eq!(broker.open_orders().len(), 1);
    }

    #[test]
    fn bar_without_prices_leaves_order_open() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, None, None).unwrap();

        let mut bar = make_bar("AAPL", 0.0, 0.0, 0.0, 0.0);
        bar.open = None;
        bar.high = None;
        bar.low = None;
        bar.close = None;
        let fills = broker.process_orders(&single(bar));
        assert!(fills.is_empty());
        assert_eq!(broker.open_orders().len(), 1);
    }

    #[test]
    fn open_falls_back_to_close() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, None, None).unwrap();

        let mut bar = make_bar("AAPL", 0.0, 0.0, 0.0, 102.0);
        bar.open = None;
        bar.high = None;
        bar.low = None;
        let fills = broker.process_orders(&single(bar));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 102.0);
    }

    #[test]
    fn high_low_fall_back_to_open() {
        // Stop sell with stop above the open: without a low column the
        // low is taken as the open, so stop 103 does not trigger at
        // open 105 but stop 105 does.
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", -5.0, None, Some(103.0)).unwrap();
        let mut bar = make_bar("AAPL", 105.0, 0.0, 0.0, 104.0);
        bar.high = None;
        bar.low = None;
        assert!(broker.process_orders(&single(bar.clone())).is_empty());

        broker.new_order("AAPL", -5.0, None, Some(105.0)).unwrap();
        let fills = broker.process_orders(&single(bar));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 105.0);
    }

    #[test]
    fn close_position_realizes_pnl() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker.new_order("AAPL", 10.0, None, None).unwrap();
        broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 99.0, 100.0)));

        broker.new_order("AAPL", -5.0, None, None).unwrap();
        broker.process_orders(&single(make_bar("AAPL", 110.0, 111.0, 109.0, 110.0)));

        assert_eq!(broker.positions()["AAPL"].quantity, 5.0);
        assert_eq!(broker.positions()["AAPL"].avg_price, 100.0);
        assert_eq!(broker.closed_trades().len(), 1);
        assert_eq!(broker.closed_trades()[0].pnl, 50.0);
    }

    #[test]
    fn slippage_adjusts_fill_price_and_records_cost() {
        let mut broker = MatchingBroker::with_costs(100_000.0, 0.5, 0.0);
        broker.new_order("AAPL", 10.0, None, None).unwrap();
        broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 99.0, 100.0)));

        assert_eq!(broker.trades().len(), 1);
        assert_eq!(broker.trades()[0].price, 100.5);
        assert_eq!(broker.trades()[0].slippage, 5.0);

        broker.new_order("AAPL", -5.0, None, None).unwrap();
        broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 99.0, 100.0)));

        assert_eq!(broker.trades().len(), 2);
        assert_eq!(broker.trades()[1].price, 99.5);
        assert_eq!(broker.trades()[1].slippage, 2.5);
    }

    #[test]
    fn commission_reduces_pnl_and_records_cost() {
        let mut broker = MatchingBroker::with_costs(100_000.0, 0.0, 2.5);
        broker.new_order("AAPL", 10.0, None, None).unwrap();
        broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 99.0, 100.0)));

        broker.new_order("AAPL", -10.0, None, None).unwrap();
        broker.process_orders(&single(make_bar("AAPL", 110.0, 111.0, 109.0, 110.0)));

        // The opening fill's pnl is -commission, so both land in the
        // closed-trade list.
        assert_eq!(broker.closed_trades().len(), 2);
        assert_eq!(broker.closed_trades()[1].pnl, 97.5);
        assert_eq!(broker.closed_trades()[1].commission, 2.5);
    }

    #[test]
    fn zero_quantity_order_is_rejected() {
        let mut broker = MatchingBroker::new(100_000.0);
        assert!(matches!(
            broker.new_order("AAPL", 0.0, None, None),
            Err(BrokerError::ZeroQuantity(_))
        ));
    }

    #[test]
    fn limit_wins_over_stop_when_both_supplied() {
        let mut broker = MatchingBroker::new(100_000.0);
        broker
            .new_order("AAPL", 10.0, Some(100.0), Some(95.0))
            .unwrap();
        assert_eq!(
            broker.open_orders()[0].1.order_type,
            OrderType::Limit { limit: 100.0 }
        );
    }

    #[test]
    fn orders_fill_in_fifo_order() {
        let mut broker = MatchingBroker::new(100_000.0);
        let first = broker.new_order("AAPL", 1.0, None, None).unwrap();
        let second = broker.new_order("AAPL", 2.0, None, None).unwrap();

        let fills = broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 99.0, 100.0)));
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].order_id, first);
        assert_eq!(fills[1].order_id, second);
    }

    #[test]
    fn order_ids_are_monotonic_per_instance() {
        let mut broker = MatchingBroker::new(100_000.0);
        let a = broker.new_order("AAPL", 1.0, None, None).unwrap();
        let b = broker.new_order("AAPL", 1.0, None, None).unwrap();
        assert!(b > a);

        // A second instance starts its own counter.
        let mut other = MatchingBroker::new(100_000.0);
        let c = other.new_order("AAPL", 1.0, None, None).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn submit_without_bar_uses_cached_price() {
        let mut broker = MatchingBroker::new(100_000.0);
        // Seed the cache with a processed bar.
        broker.process_orders(&single(make_bar("AAPL", 100.0, 101.0, 99.0, 102.0)));

        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let fill = broker
            .submit_order(Order::market("AAPL", OrderSide::Sell, 5.0), None, ts)
            .unwrap()
            .expect("market order should fill at cached price");
        assert_eq!(fill.price, 102.0);
    }

    #[test]
    fn submit_without_bar_or_cache_fails() {
        let mut broker = MatchingBroker::new(100_000.0);
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let result = broker.submit_order(Order::market("AAPL", OrderSide::Buy, 5.0), None, ts);
        assert!(matches!(result, Err(BrokerError::NoPriceReference(_))));
    }

    #[test]
    fn submit_with_bar_queues_for_processing() {
        let mut broker = MatchingBroker::new(100_000.0);
        let bar = make_bar("AAPL", 100.0, 101.0, 99.0, 100.0);
        let ts = bar.timestamp;

        let immediate = broker
            .submit_order(Order::market("AAPL", OrderSide::Buy, 5.0), Some(&bar), ts)
            .unwrap();
        assert!(immediate.is_none());
        assert_eq!(broker.open_orders().len(), 1);

        let fills = broker.process_orders(&single(bar));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 100.0);
    }
}
