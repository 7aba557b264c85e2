//! Buy-and-hold: one market buy on the first priced observation.

use super::{Strategy, StrategyContext};
use crate::domain::{Bar, Fill, Order, OrderSide};
use crate::portfolio::Portfolio;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

/// Spends a fraction of available cash on whole shares of the first
/// symbol it observes, then holds for the rest of the run.
pub struct BuyAndHold {
    cash_fraction: f64,
    portfolio: Option<Rc<RefCell<Portfolio>>>,
    pending: Vec<Order>,
    has_ordered: bool,
}

impl BuyAndHold {
    pub fn new(cash_fraction: f64) -> Self {
        Self {
            cash_fraction,
            portfolio: None,
            pending: Vec::new(),
            has_ordered: false,
        }
    }
}

impl Default for BuyAndHold {
    fn default() -> Self {
        Self::new(0.95)
    }
}

impl Strategy for BuyAndHold {
    fn initialize(&mut self, context: &StrategyContext) {
        self.portfolio = Some(context.portfolio.clone());
    }

    fn on_event(&mut self, bar: &Bar) {
        if self.has_ordered {
            return;
        }
        let Some(price) = bar.observation_price() else {
            return;
        };
        let Some(portfolio) = &self.portfolio else {
            return;
        };

        let available = portfolio.borrow().cash;
        let quantity = (available * self.cash_fraction / price).floor();
        if quantity > 0.0 {
            info!(symbol = %bar.symbol, quantity, price, "placing initial buy");
            self.pending
                .push(Order::market(bar.symbol.clone(), OrderSide::Buy, quantity));
            self.has_ordered = true;
        } else {
            info!(symbol = %bar.symbol, price, available, "not enough cash for one share");
        }
    }

    fn on_fill(&mut self, fill: &Fill) {
        debug!(symbol = %fill.symbol, quantity = fill.quantity, price = fill.price, "fill received");
    }

    fn drain_orders(&mut self) -> Vec<Order> {
        std::mem::take(&mut self.pending)
    }
}
