//! Strategy contract and built-in strategies.

pub mod buy_and_hold;
pub mod sma_cross;

pub use buy_and_hold::BuyAndHold;
pub use sma_cross::SmaCross;

use crate::domain::{Bar, Fill, Order};
use crate::portfolio::Portfolio;
use std::cell::RefCell;
use std::rc::Rc;

/// Handles the engine passes to a strategy at initialization.
#[derive(Clone)]
pub struct StrategyContext {
    pub initial_cash: f64,
    pub portfolio: Rc<RefCell<Portfolio>>,
}

/// A pluggable trading policy. Driven once per simulation step; must not
/// block. Rejected orders produce no callback — a strategy infers
/// rejection from the absence of a later fill.
pub trait Strategy {
    /// Called once before the first observation.
    fn initialize(&mut self, _context: &StrategyContext) {}

    /// Handle one price observation.
    fn on_event(&mut self, bar: &Bar);

    /// Handle a fill for one of this strategy's orders.
    fn on_fill(&mut self, _fill: &Fill) {}

    /// Hand pending orders to the engine. The pending list is emptied
    /// atomically on read; calling twice without new signals returns an
    /// empty vector the second time.
    fn drain_orders(&mut self) -> Vec<Order>;
}

impl Strategy for Box<dyn Strategy> {
    fn initialize(&mut self, context: &StrategyContext) {
        (**self).initialize(context);
    }

    fn on_event(&mut self, bar: &Bar) {
        (**self).on_event(bar);
    }

    fn on_fill(&mut self, fill: &Fill) {
        (**self).on_fill(fill);
    }

    fn drain_orders(&mut self) -> Vec<Order> {
        (**self).drain_orders()
    }
}
