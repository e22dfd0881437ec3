//! Order intents handed to the host, and the account snapshot read from it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("Buy"),
            OrderSide::Sell => f.write_str("Sell"),
        }
    }
}

/// A limit order the strategy wants the host to place.
///
/// Produced fresh by the signal policy each bar; the host owns execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: OrderSide,
    pub quantity: f64,
    pub limit_price: f64,
}

impl OrderIntent {
    pub fn buy(quantity: f64, limit_price: f64) -> Self {
        Self {
            side: OrderSide::Buy,
            quantity,
            limit_price,
        }
    }

    pub fn sell(quantity: f64, limit_price: f64) -> Self {
        Self {
            side: OrderSide::Sell,
            quantity,
            limit_price,
        }
    }

    /// Quantity times limit price.
    pub fn notional(&self) -> f64 {
        self.quantity * self.limit_price
    }
}

/// Host acknowledgement of a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: u64,
}

/// Cash and asset holdings as reported by the host. Read-only to the core.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Balances {
    pub cash: f64,
    pub asset_qty: f64,
}

impl Balances {
    pub fn new(cash: f64, asset_qty: f64) -> Self {
        Self { cash, asset_qty }
    }

    /// Cash plus holdings valued at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.asset_qty * price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_constructors() {
        let buy = OrderIntent::buy(2.0, 100.0);
        assert_eq!(buy.side, OrderSide::Buy);
        assert_eq!(buy.notional(), 200.0);

        let sell = OrderIntent::sell(1.5, 19_600.0);
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.quantity, 1.5);
    }

    #[test]
    fn equity_marks_holdings() {
        let b = Balances::new(1_000.0, 2.0);
        assert_eq!(b.equity(50.0), 1_100.0);
    }
}
