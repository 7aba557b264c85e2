//! Backtest engine — the replay control loop.
//!
//! One step per observation batch:
//!
//! 1. Publish a `PriceUpdate` per priced symbol — the ledger marks open
//!    positions, records equity, and emits a derived `EquityUpdate`.
//! 2. Deliver the observations to the strategy and drain its orders.
//! 3. Route each order through the risk gate (rejections are dropped
//!    silently) and into the broker.
//! 4. Publish a `Fill` per execution — the ledger applies it, the
//!    strategy hears it, and a fresh `EquityUpdate` follows.
//!
//! All dispatch is a direct nested call stack: effects of a price update
//! complete before orders are processed, and fill effects complete
//! before the next observation is consumed.

use crate::broker::{BrokerError, MatchingBroker};
use crate::bus::EventBus;
use crate::data::{DataError, MarketDataSource};
use crate::domain::{Fill, MultiBar, Order, OrderSide, Trade};
use crate::events::{DomainEvent, EquityUpdate, EventKind, FillEvent, PriceUpdate};
use crate::portfolio::Portfolio;
use crate::risk::RiskGate;
use crate::strategy::{Strategy, StrategyContext};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Run configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_cash: f64,
    /// Close every open position with a market order after the source
    /// is exhausted. Requires the broker to have seen a price for each
    /// open symbol.
    pub finalize_positions: bool,
}

impl EngineConfig {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            finalize_positions: false,
        }
    }

    pub fn with_finalization(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            finalize_positions: true,
        }
    }
}

/// Engine lifecycle. A single run per instance; re-entrant `run` calls
/// are not guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Running,
    Finalizing,
    Reporting,
    Done,
}

/// Result of a completed run. The full ledger stays available through
/// the engine's portfolio handle; this carries the pieces reporting
/// needs.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Number of observation batches processed.
    pub bar_count: usize,
    pub final_equity: f64,
    /// Closed-lot trades, in chronological order.
    pub trades: Vec<Trade>,
    /// `(timestamp, equity)` samples — at least one per processed
    /// observation, plus one per fill.
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
}

/// The orchestrator: owns the broker and the data source, shares the
/// ledger, strategy, and risk gate with the event bus.
pub struct BacktestEngine {
    source: Box<dyn MarketDataSource>,
    strategy: Rc<RefCell<dyn Strategy>>,
    portfolio: Rc<RefCell<Portfolio>>,
    risk_gate: Rc<RefCell<dyn RiskGate>>,
    broker: MatchingBroker,
    bus: Rc<EventBus>,
    config: EngineConfig,
    phase: EnginePhase,
    steps: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

impl BacktestEngine {
    pub fn new(
        source: Box<dyn MarketDataSource>,
        strategy: impl Strategy + 'static,
        broker: MatchingBroker,
        risk_gate: impl RiskGate + 'static,
        config: EngineConfig,
    ) -> Self {
        let bus = Rc::new(EventBus::new());
        let portfolio = Rc::new(RefCell::new(Portfolio::new(config.initial_cash)));
        let strategy: Rc<RefCell<dyn Strategy>> = Rc::new(RefCell::new(strategy));
        let risk_gate: Rc<RefCell<dyn RiskGate>> = Rc::new(RefCell::new(risk_gate));

        Self::wire(&bus, &portfolio, &strategy, &risk_gate);

        strategy.borrow_mut().initialize(&StrategyContext {
            initial_cash: config.initial_cash,
            portfolio: portfolio.clone(),
        });

        Self {
            source,
            strategy,
            portfolio,
            risk_gate,
            broker,
            bus,
            config,
            phase: EnginePhase::Idle,
            steps: 0,
            last_timestamp: None,
        }
    }

    /// Subscribe the ledger, strategy, and risk gate. Registration
    /// order on `Fill` matters: the ledger applies the fill before the
    /// strategy hears about it.
    fn wire(
        bus: &Rc<EventBus>,
        portfolio: &Rc<RefCell<Portfolio>>,
        strategy: &Rc<RefCell<dyn Strategy>>,
        risk_gate: &Rc<RefCell<dyn RiskGate>>,
    ) {
        // Price update → mark to market, record equity, emit equity.
        {
            let portfolio = portfolio.clone();
            let bus_handle = Rc::downgrade(bus);
            bus.subscribe(EventKind::PriceUpdate, move |event| {
                let DomainEvent::PriceUpdate(update) = event else {
                    return;
                };
                let equity = {
                    let mut ledger = portfolio.borrow_mut();
                    let mut prices = HashMap::new();
                    prices.insert(update.symbol.clone(), update.price);
                    ledger.update_unrealized_pnl(&prices);
                    ledger.record_equity(update.timestamp);
                    ledger.total_equity()
                };
                if let Some(bus) = bus_handle.upgrade() {
                    bus.publish(&DomainEvent::EquityUpdate(EquityUpdate {
                        equity,
                        timestamp: update.timestamp,
                    }));
                }
            });
        }

        // Fill → apply to the ledger and record equity.
        {
            let portfolio = portfolio.clone();
            bus.subscribe(EventKind::Fill, move |event| {
                let DomainEvent::Fill(fill_event) = event else {
                    return;
                };
                let mut ledger = portfolio.borrow_mut();
                ledger.apply_fill(&fill_event.fill);
                ledger.record_equity(fill_event.timestamp);
            });
        }

        // Fill → notify the strategy (after the ledger handler above).
        {
            let strategy = strategy.clone();
            bus.subscribe(EventKind::Fill, move |event| {
                let DomainEvent::Fill(fill_event) = event else {
                    return;
                };
                strategy.borrow_mut().on_fill(&fill_event.fill);
            });
        }

        // Fill → emit the fresh equity, last in the fill sequence.
        {
            let portfolio = portfolio.clone();
            let bus_handle = Rc::downgrade(bus);
            bus.subscribe(EventKind::Fill, move |event| {
                let DomainEvent::Fill(fill_event) = event else {
                    return;
                };
                let equity = portfolio.borrow().total_equity();
                if let Some(bus) = bus_handle.upgrade() {
                    bus.publish(&DomainEvent::EquityUpdate(EquityUpdate {
                        equity,
                        timestamp: fill_event.timestamp,
                    }));
                }
            });
        }

        // Equity update → passive peak tracking.
        {
            let risk_gate = risk_gate.clone();
            bus.subscribe(EventKind::EquityUpdate, move |event| {
                let DomainEvent::EquityUpdate(update) = event else {
                    return;
                };
                risk_gate.borrow_mut().on_equity_update(update.equity);
            });
        }
    }

    /// Replay the source to exhaustion. Exhaustion is the only normal
    /// termination; configuration errors abort immediately.
    pub fn run(&mut self) -> Result<RunResult, EngineError> {
        self.phase = EnginePhase::Running;
        info!(initial_cash = self.config.initial_cash, "backtest started");

        while let Some(batch) = self.source.next_batch()? {
            self.step(&batch)?;
        }

        if self.config.finalize_positions {
            self.phase = EnginePhase::Finalizing;
            self.liquidate_open_positions()?;
        }

        self.phase = EnginePhase::Reporting;
        let result = self.build_result();
        self.phase = EnginePhase::Done;
        info!(
            bars = result.bar_count,
            trades = result.trades.len(),
            final_equity = result.final_equity,
            "backtest finished"
        );
        Ok(result)
    }

    fn step(&mut self, batch: &MultiBar) -> Result<(), EngineError> {
        let Some(step_timestamp) = batch.values().next().map(|bar| bar.timestamp) else {
            return Ok(());
        };
        self.steps += 1;
        self.last_timestamp = Some(step_timestamp);

        // Phase 1+2: publish prices and drive the strategy.
        for bar in batch.values() {
            if let Some(price) = bar.observation_price() {
                self.bus.publish(&DomainEvent::PriceUpdate(PriceUpdate {
                    symbol: bar.symbol.clone(),
                    price,
                    timestamp: bar.timestamp,
                }));
            }
            self.strategy.borrow_mut().on_event(bar);
        }

        // Phase 3: validate and submit, in emission order.
        let orders = self.strategy.borrow_mut().drain_orders();
        for order in orders {
            let approved = self
                .risk_gate
                .borrow_mut()
                .validate_order(&order, &self.portfolio.borrow());
            if !approved {
                // Fire-and-forget: no signal back to the strategy.
                debug!(symbol = %order.symbol, quantity = order.quantity,
                       "order dropped by risk gate");
                continue;
            }
            let current_bar = batch.get(&order.symbol);
            if let Some(fill) = self.broker.submit_order(order, current_bar, step_timestamp)? {
                self.publish_fill(fill);
            }
        }

        // Phase 4: match the open set against this step's bars.
        for fill in self.broker.process_orders(batch) {
            self.publish_fill(fill);
        }

        Ok(())
    }

    /// Synthesize one closing market order per open position, filled at
    /// the broker's cached last price. Liquidation bypasses the risk
    /// gate: a configured cap must not be able to block closing out.
    fn liquidate_open_positions(&mut self) -> Result<(), EngineError> {
        let Some(timestamp) = self.last_timestamp else {
            return Ok(());
        };

        let mut open: Vec<(String, f64)> = self
            .portfolio
            .borrow()
            .positions()
            .iter()
            .filter(|(_, position)| position.quantity != 0.0)
            .map(|(symbol, position)| (symbol.clone(), position.quantity))
            .collect();
        open.sort_by(|a, b| a.0.cmp(&b.0));

        for (symbol, quantity) in open {
            let side = if quantity > 0.0 {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            info!(symbol = %symbol, ?side, quantity = quantity.abs(), "liquidating open position");
            let order = Order::market(symbol, side, quantity.abs());
            if let Some(fill) = self.broker.submit_order(order, None, timestamp)? {
                self.publish_fill(fill);
            }
        }
        Ok(())
    }

    fn publish_fill(&self, fill: Fill) {
        let timestamp = fill.timestamp;
        self.bus
            .publish(&DomainEvent::Fill(FillEvent { fill, timestamp }));
    }

    fn build_result(&self) -> RunResult {
        let ledger = self.portfolio.borrow();
        RunResult {
            bar_count: self.steps,
            final_equity: ledger.total_equity(),
            trades: ledger.trades().to_vec(),
            equity_curve: ledger.equity_curve().to_vec(),
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Shared ledger handle; reporting reads it after the run.
    pub fn portfolio(&self) -> Rc<RefCell<Portfolio>> {
        self.portfolio.clone()
    }

    pub fn broker(&self) -> &MatchingBroker {
        &self.broker
    }
}
