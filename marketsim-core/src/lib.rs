//! marketsim core — a deterministic discrete-event market simulator.
//!
//! Replays a chronological sequence of OHLCV observations through a
//! strategy, matches orders against per-bar quotes, and maintains an
//! authoritative ledger of cash, positions, and realized/unrealized
//! profit:
//!
//! - Domain types (bars, orders, fills, positions, trades)
//! - Type-keyed synchronous event bus with three domain events
//! - Portfolio ledger with per-fill cash/PnL accounting
//! - Matching broker with the market/limit/stop tie-break table
//! - Risk gate (position-size / exposure / drawdown caps)
//! - Replay engine: Idle → Running → Finalizing → Reporting → Done
//!
//! The whole simulation is single-threaded and synchronous by contract;
//! event dispatch is a direct nested call stack with no queues.

pub mod broker;
pub mod bus;
pub mod data;
pub mod domain;
pub mod engine;
pub mod events;
pub mod portfolio;
pub mod risk;
pub mod strategy;

pub use broker::{BrokerError, MatchingBroker};
pub use bus::EventBus;
pub use data::{MarketDataSource, MemorySource};
pub use domain::{Bar, Fill, MultiBar, Order, OrderId, OrderSide, OrderType, Position, Trade};
pub use engine::{BacktestEngine, EngineConfig, EngineError, EnginePhase, RunResult};
pub use events::{DomainEvent, EquityUpdate, EventKind, FillEvent, PriceUpdate};
pub use portfolio::Portfolio;
pub use risk::{LimitRiskGate, NoopRiskGate, RiskGate, RiskLimits};
pub use strategy::{BuyAndHold, SmaCross, Strategy, StrategyContext};
