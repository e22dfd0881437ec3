//! Signal policy: histogram sign plus balances to an order intent.
//!
//! All-in / all-out: a bullish bar spends the available cash, a bearish bar
//! sells the whole holding. No partial sizing, no pyramiding, no stops.
//!
//! The policy stores nothing between bars. Whether the account is "in cash"
//! or "in the asset" is read from the balances every time, so the same
//! (histogram, balances, price) always yields the same decision.

pub mod intent;

pub use intent::TradeIntent;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Balances, OrderIntent};

/// Minimum order sizes and limit-price offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyLimits {
    /// Smallest asset quantity the venue accepts for a sell.
    pub min_asset_qty: f64,
    /// Smallest cash amount the venue accepts for a buy.
    pub min_cash_amount: f64,
    /// Buy limit = price * (1 + buy_markup).
    pub buy_markup: f64,
    /// Sell limit = price * (1 - sell_markdown).
    pub sell_markdown: f64,
    /// Fraction of the affordable quantity actually ordered on a buy.
    pub cash_utilization: f64,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            min_asset_qty: 0.001,
            min_cash_amount: 1.0,
            buy_markup: 0.02,
            sell_markdown: 0.02,
            cash_utilization: 0.98,
        }
    }
}

/// Why a bar produced no order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoActionReason {
    NoSignal,
    InsufficientCash,
    InsufficientPosition,
    InvalidPrice,
}

impl fmt::Display for NoActionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NoActionReason::NoSignal => "no signal",
            NoActionReason::InsufficientCash => "insufficient cash",
            NoActionReason::InsufficientPosition => "insufficient position",
            NoActionReason::InvalidPrice => "invalid price",
        };
        f.write_str(text)
    }
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Order(OrderIntent),
    NoAction(NoActionReason),
}

impl Decision {
    pub fn order(&self) -> Option<&OrderIntent> {
        match self {
            Decision::Order(intent) => Some(intent),
            Decision::NoAction(_) => None,
        }
    }
}

/// Full-position MACD sign policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalPolicy {
    limits: PolicyLimits,
}

impl SignalPolicy {
    pub fn new(limits: PolicyLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PolicyLimits {
        &self.limits
    }

    /// Map the latest histogram value to an order intent.
    ///
    /// - `h > 0`: buy `cash / (p * (1 + markup)) * utilization` at `p * (1 + markup)`
    ///   if `cash >= min_cash_amount`.
    /// - `h < 0`: sell all `qty` at `p * (1 - markdown)` if `qty >= min_asset_qty`.
    /// - otherwise: no signal.
    pub fn decide(&self, histogram: f64, balances: &Balances, price: f64) -> Decision {
        let intent = TradeIntent::from_histogram(histogram);
        if intent == TradeIntent::Hold {
            return Decision::NoAction(NoActionReason::NoSignal);
        }
        if !price.is_finite() || price <= 0.0 {
            return Decision::NoAction(NoActionReason::InvalidPrice);
        }

        match intent {
            TradeIntent::EnterLong => {
                if balances.cash < self.limits.min_cash_amount {
                    return Decision::NoAction(NoActionReason::InsufficientCash);
                }
                let limit_price = price * (1.0 + self.limits.buy_markup);
                let quantity = balances.cash / limit_price * self.limits.cash_utilization;
                Decision::Order(OrderIntent::buy(quantity, limit_price))
            }
            TradeIntent::ExitToCash => {
                if balances.asset_qty < self.limits.min_asset_qty {
                    return Decision::NoAction(NoActionReason::InsufficientPosition);
                }
                let limit_price = price * (1.0 - self.limits.sell_markdown);
                Decision::Order(OrderIntent::sell(balances.asset_qty, limit_price))
            }
            TradeIntent::Hold => Decision::NoAction(NoActionReason::NoSignal),
        }
    }
}
