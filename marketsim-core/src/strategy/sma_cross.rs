//! Moving-average crossover strategy.

use super::{Strategy, StrategyContext};
use crate::domain::{Bar, Order, OrderSide};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Rolling simple moving average over a fixed window.
#[derive(Debug, Clone)]
struct RollingSma {
    window: VecDeque<f64>,
    period: usize,
    sum: f64,
}

impl RollingSma {
    fn new(period: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(period),
            period,
            sum: 0.0,
        }
    }

    fn push(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        (self.window.len() == self.period).then(|| self.sum / self.period as f64)
    }
}

#[derive(Debug, Clone)]
struct SymbolState {
    fast: RollingSma,
    slow: RollingSma,
    /// Some(true) when fast was above slow on the previous bar.
    fast_above: Option<bool>,
    holding: f64,
}

/// Per-symbol fast/slow SMA crossover: buy a fixed quantity on the
/// golden cross, sell the holding back on the death cross. Emits market
/// orders only.
pub struct SmaCross {
    fast_period: usize,
    slow_period: usize,
    order_quantity: f64,
    states: HashMap<String, SymbolState>,
    pending: Vec<Order>,
}

impl SmaCross {
    pub fn new(fast_period: usize, slow_period: usize, order_quantity: f64) -> Self {
        Self {
            fast_period,
            slow_period,
            order_quantity,
            states: HashMap::new(),
            pending: Vec::new(),
        }
    }
}

impl Strategy for SmaCross {
    fn initialize(&mut self, _context: &StrategyContext) {}

    fn on_event(&mut self, bar: &Bar) {
        let Some(price) = bar.observation_price() else {
            return;
        };

        let state = self
            .states
            .entry(bar.symbol.clone())
            .or_insert_with(|| SymbolState {
                fast: RollingSma::new(self.fast_period),
                slow: RollingSma::new(self.slow_period),
                fast_above: None,
                holding: 0.0,
            });

        let fast = state.fast.push(price);
        let slow = state.slow.push(price);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return;
        };

        let now_above = fast > slow;
        let was_above = state.fast_above.replace(now_above);

        match (was_above, now_above) {
            (Some(false), true) if state.holding == 0.0 => {
                debug!(symbol = %bar.symbol, fast, slow, "golden cross");
                self.pending.push(Order::market(
                    bar.symbol.clone(),
                    OrderSide::Buy,
                    self.order_quantity,
                ));
                state.holding = self.order_quantity;
            }
            (Some(true), false) if state.holding > 0.0 => {
                debug!(symbol = %bar.symbol, fast, slow, "death cross");
                self.pending.push(Order::market(
                    bar.symbol.clone(),
                    OrderSide::Sell,
                    state.holding,
                ));
                state.holding = 0.0;
            }
            _ => {}
        }
    }

    fn drain_orders(&mut self) -> Vec<Order> {
        std::mem::take(&mut self.pending)
    }
}
