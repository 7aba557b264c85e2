//! Event bus — type-keyed synchronous pub/sub for domain events.
//!
//! Delivery happens entirely inside `publish`: handlers for the event's
//! variant run in registration order, and a handler that publishes
//! another event recurses depth-first before the outer dispatch resumes.
//! That nesting is the ordering guarantee the simulator relies on — a
//! fill updates the ledger, which emits an equity update consumed by the
//! risk gate, all before the next order is touched.
//!
//! Each bus instance owns its subscriber table; there is no shared or
//! global state.

use crate::events::{DomainEvent, EventKind};
use std::cell::RefCell;
use std::rc::Rc;

type Handler = Rc<RefCell<dyn FnMut(&DomainEvent)>>;

#[derive(Default)]
struct HandlerTable {
    price_update: Vec<Handler>,
    fill: Vec<Handler>,
    equity_update: Vec<Handler>,
}

impl HandlerTable {
    fn slot(&self, kind: EventKind) -> &Vec<Handler> {
        match kind {
            EventKind::PriceUpdate => &self.price_update,
            EventKind::Fill => &self.fill,
            EventKind::EquityUpdate => &self.equity_update,
        }
    }

    fn slot_mut(&mut self, kind: EventKind) -> &mut Vec<Handler> {
        match kind {
            EventKind::PriceUpdate => &mut self.price_update,
            EventKind::Fill => &mut self.fill,
            EventKind::EquityUpdate => &mut self.equity_update,
        }
    }
}

/// Synchronous dispatcher for [`DomainEvent`]s.
///
/// The closed event union makes the original failure modes
/// unrepresentable: there is no way to publish a non-domain event or to
/// subscribe under an unknown key.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<HandlerTable>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event variant. Handlers for the same
    /// variant are invoked in registration order.
    pub fn subscribe(&self, kind: EventKind, handler: impl FnMut(&DomainEvent) + 'static) {
        self.handlers
            .borrow_mut()
            .slot_mut(kind)
            .push(Rc::new(RefCell::new(handler)));
    }

    /// Deliver `event` to every handler registered for its variant, in
    /// registration order, before returning.
    ///
    /// The handler list is snapshotted up front so a handler may publish
    /// further events (or subscribe new handlers) while dispatch is in
    /// flight. A handler that transitively re-enters itself is a
    /// programming error and panics via the cell borrow.
    pub fn publish(&self, event: &DomainEvent) {
        let snapshot: Vec<Handler> = self.handlers.borrow().slot(event.kind()).to_vec();
        for handler in snapshot {
            (handler.borrow_mut())(event);
        }
    }

    /// Number of handlers registered for a variant.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.borrow().slot(kind).len()
    }
}
