//! Domain events — the only messages the event bus transports.

use crate::domain::Fill;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A new observed price for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// An order was executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub fill: Fill,
    pub timestamp: DateTime<Utc>,
}

/// The ledger's total equity changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityUpdate {
    pub equity: f64,
    pub timestamp: DateTime<Utc>,
}

/// Closed union of everything that can travel over the bus. Value
/// objects; never mutated after publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    PriceUpdate(PriceUpdate),
    Fill(FillEvent),
    EquityUpdate(EquityUpdate),
}

/// Subscription key: which variant of [`DomainEvent`] a handler wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    PriceUpdate,
    Fill,
    EquityUpdate,
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::PriceUpdate(_) => EventKind::PriceUpdate,
            DomainEvent::Fill(_) => EventKind::Fill,
            DomainEvent::EquityUpdate(_) => EventKind::EquityUpdate,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::PriceUpdate(e) => e.timestamp,
            DomainEvent::Fill(e) => e.timestamp,
            DomainEvent::EquityUpdate(e) => e.timestamp,
        }
    }
}
