//! Risk gate — pre-trade order validation and peak-equity tracking.

use crate::domain::{Order, OrderSide};
use crate::portfolio::Portfolio;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pre-trade validator. The engine invokes the gate unconditionally for
/// every strategy order; use [`NoopRiskGate`] when no limits apply.
pub trait RiskGate {
    /// True unless a configured constraint is violated. Pure with
    /// respect to the portfolio; may update internal peak-equity state.
    fn validate_order(&mut self, order: &Order, portfolio: &Portfolio) -> bool;

    /// Passive peak-tracking hook, driven by equity-update events.
    fn on_equity_update(&mut self, equity: f64);
}

impl RiskGate for Box<dyn RiskGate> {
    fn validate_order(&mut self, order: &Order, portfolio: &Portfolio) -> bool {
        (**self).validate_order(order, portfolio)
    }

    fn on_equity_update(&mut self, equity: f64) {
        (**self).on_equity_update(equity);
    }
}

/// Gate that approves everything. Used when no risk limits are
/// configured so the engine never needs an is-there-a-gate branch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRiskGate;

impl RiskGate for NoopRiskGate {
    fn validate_order(&mut self, _order: &Order, _portfolio: &Portfolio) -> bool {
        true
    }

    fn on_equity_update(&mut self, _equity: f64) {}
}

/// Optional caps; a `None` limit is never enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum absolute position size per symbol, in units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_position_size: Option<f64>,
    /// Maximum gross portfolio exposure, in currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_exposure: Option<f64>,
    /// Maximum fractional drawdown from peak equity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
}

impl RiskLimits {
    pub fn is_empty(&self) -> bool {
        self.max_position_size.is_none()
            && self.max_exposure.is_none()
            && self.max_drawdown.is_none()
    }
}

/// Gate enforcing the configured [`RiskLimits`].
#[derive(Debug, Clone)]
pub struct LimitRiskGate {
    limits: RiskLimits,
    peak_equity: Option<f64>,
}

impl LimitRiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            peak_equity: None,
        }
    }

    pub fn peak_equity(&self) -> Option<f64> {
        self.peak_equity
    }

    fn update_peak(&mut self, equity: f64) {
        if self.peak_equity.map_or(true, |peak| equity > peak) {
            self.peak_equity = Some(equity);
        }
    }
}

impl RiskGate for LimitRiskGate {
    fn validate_order(&mut self, order: &Order, portfolio: &Portfolio) -> bool {
        // Position-size cap: project the post-fill quantity.
        if let Some(max_position) = self.limits.max_position_size {
            let current = portfolio.quantity(&order.symbol);
            let projected = match order.side {
                OrderSide::Buy => current + order.quantity,
                OrderSide::Sell => current - order.quantity,
            };
            if projected.abs() > max_position {
                debug!(
                    symbol = %order.symbol,
                    projected,
                    max_position,
                    "order rejected: position size cap"
                );
                return false;
            }
        }

        // Exposure cap. Approximate pre-trade check: the order is priced
        // at its limit, or at zero for market/stop orders.
        if let Some(max_exposure) = self.limits.max_exposure {
            let order_value = order.quantity * order.order_type.limit_price().unwrap_or(0.0);
            if portfolio.gross_exposure() + order_value > max_exposure {
                debug!(symbol = %order.symbol, max_exposure, "order rejected: exposure cap");
                return false;
            }
        }

        // Drawdown cap. Updating the peak is a deliberate side effect of
        // validation, so the gate works even without bus wiring.
        if let Some(max_drawdown) = self.limits.max_drawdown {
            let equity = portfolio.total_equity();
            self.update_peak(equity);
            if let Some(peak) = self.peak_equity {
                let drawdown = (peak - equity) / peak;
                if drawdown > max_drawdown {
                    debug!(drawdown, max_drawdown, "order rejected: drawdown cap");
                    return false;
                }
            }
        }

        true
    }

    fn on_equity_update(&mut self, equity: f64) {
        self.update_peak(equity);
    }
}
