//! Cost model: slippage and commission as fractions.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Commission is charged on the filled notional, both sides.

use serde::{Deserialize, Serialize};

use macdlab_core::config::BacktestSection;
use macdlab_core::domain::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Fraction of price, e.g. 0.001 = 0.1%.
    pub slippage: f64,
    /// Fraction of notional.
    pub commission: f64,
}

impl CostModel {
    pub fn new(slippage: f64, commission: f64) -> Self {
        Self {
            slippage,
            commission,
        }
    }

    pub fn from_config(backtest: &BacktestSection) -> Self {
        Self::new(backtest.slippage, backtest.commission)
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Apply slippage to a raw fill price.
    ///
    /// Returns `(slipped_price, slippage_amount)`.
    pub fn apply_slippage(&self, raw_price: f64, side: OrderSide, quantity: f64) -> (f64, f64) {
        if self.slippage == 0.0 {
            return (raw_price, 0.0);
        }
        match side {
            OrderSide::Buy => {
                let slipped = raw_price * (1.0 + self.slippage);
                (slipped, (slipped - raw_price) * quantity)
            }
            OrderSide::Sell => {
                let slipped = raw_price * (1.0 - self.slippage);
                (slipped, (raw_price - slipped) * quantity)
            }
        }
    }

    pub fn compute_commission(&self, fill_price: f64, quantity: f64) -> f64 {
        fill_price * quantity * self.commission
    }

    /// Largest buy quantity whose notional plus commission fits in `cash`.
    pub fn affordable_quantity(&self, cash: f64, fill_price: f64) -> f64 {
        if cash <= 0.0 || fill_price <= 0.0 {
            return 0.0;
        }
        cash / (fill_price * (1.0 + self.commission))
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::frictionless()
    }
}
