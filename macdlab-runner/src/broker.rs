//! Paper broker: an order queue the strategy submits to, and a paper account
//! that fills queued limit orders against the bar close.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use macdlab_core::domain::{Balances, OrderAck, OrderIntent, OrderSide, PriceBar, Symbol};
use macdlab_core::host::{AccountQuery, HostError, OrderSink};

use crate::cost::CostModel;

/// An accepted order waiting for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOrder {
    pub order_id: u64,
    pub symbol: Symbol,
    pub intent: OrderIntent,
}

/// `OrderSink` that collects intents with sequential ids.
#[derive(Debug, Default)]
pub struct OrderQueue {
    next_id: u64,
    pending: Vec<QueuedOrder>,
}

impl OrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending order, oldest first.
    pub fn drain(&mut self) -> Vec<QueuedOrder> {
        std::mem::take(&mut self.pending)
    }
}

impl OrderSink for OrderQueue {
    fn submit_limit_order(
        &mut self,
        symbol: &str,
        intent: OrderIntent,
    ) -> Result<OrderAck, HostError> {
        if !(intent.quantity.is_finite() && intent.quantity > 0.0) {
            return Err(HostError::Rejected(format!(
                "quantity must be positive, got {}",
                intent.quantity
            )));
        }
        if !(intent.limit_price.is_finite() && intent.limit_price > 0.0) {
            return Err(HostError::Rejected(format!(
                "limit price must be positive, got {}",
                intent.limit_price
            )));
        }
        self.next_id += 1;
        self.pending.push(QueuedOrder {
            order_id: self.next_id,
            symbol: symbol.to_string(),
            intent,
        });
        Ok(OrderAck {
            order_id: self.next_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: u64,
    pub timestamp: NaiveDateTime,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
    pub slippage: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Slipped price is on the wrong side of the limit.
    LimitNotReached { limit: f64, price: f64 },
    InsufficientCash,
    InsufficientAsset,
    InvalidPrice,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::LimitNotReached { limit, price } => {
                write!(f, "limit {limit:.4} not reached at {price:.4}")
            }
            RejectReason::InsufficientCash => f.write_str("insufficient cash"),
            RejectReason::InsufficientAsset => f.write_str("insufficient asset"),
            RejectReason::InvalidPrice => f.write_str("invalid bar price"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejection {
    pub order_id: u64,
    pub timestamp: NaiveDateTime,
    pub side: OrderSide,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Filled(Fill),
    Rejected(OrderRejection),
}

/// Single-security cash/asset account with simulated fills.
#[derive(Debug, Clone)]
pub struct PaperAccount {
    balances: Balances,
    cost: CostModel,
    fills: Vec<Fill>,
    rejections: Vec<OrderRejection>,
}

impl PaperAccount {
    pub fn new(initial: Balances, cost: CostModel) -> Self {
        Self {
            balances: initial,
            cost,
            fills: Vec::new(),
            rejections: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Balances {
        self.balances
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn rejections(&self) -> &[OrderRejection] {
        &self.rejections
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.balances.equity(price)
    }

    /// Execute a queued order against `bar`.
    ///
    /// Fills at the close adjusted by slippage when that price respects the
    /// limit. Buys are clamped to what the cash covers including commission,
    /// sells to the holding.
    pub fn execute(&mut self, order: &QueuedOrder, bar: &PriceBar) -> Execution {
        let intent = order.intent;
        let reject = |reason| OrderRejection {
            order_id: order.order_id,
            timestamp: bar.timestamp,
            side: intent.side,
            reason,
        };

        if bar.is_void() || bar.close <= 0.0 {
            return self.record_rejection(reject(RejectReason::InvalidPrice));
        }

        let (price, _) = self.cost.apply_slippage(bar.close, intent.side, intent.quantity);
        let crosses = match intent.side {
            OrderSide::Buy => price <= intent.limit_price,
            OrderSide::Sell => price >= intent.limit_price,
        };
        if !crosses {
            return self.record_rejection(reject(RejectReason::LimitNotReached {
                limit: intent.limit_price,
                price,
            }));
        }

        let quantity = match intent.side {
            OrderSide::Buy => intent
                .quantity
                .min(self.cost.affordable_quantity(self.balances.cash, price)),
            OrderSide::Sell => intent.quantity.min(self.balances.asset_qty),
        };
        if quantity <= 0.0 {
            let reason = match intent.side {
                OrderSide::Buy => RejectReason::InsufficientCash,
                OrderSide::Sell => RejectReason::InsufficientAsset,
            };
            return self.record_rejection(reject(reason));
        }

        let (_, slippage) = self.cost.apply_slippage(bar.close, intent.side, quantity);
        let commission = self.cost.compute_commission(price, quantity);
        let notional = price * quantity;
        match intent.side {
            OrderSide::Buy => {
                self.balances.cash = (self.balances.cash - notional - commission).max(0.0);
                self.balances.asset_qty += quantity;
            }
            OrderSide::Sell => {
                self.balances.cash += notional - commission;
                self.balances.asset_qty = (self.balances.asset_qty - quantity).max(0.0);
            }
        }

        let fill = Fill {
            order_id: order.order_id,
            timestamp: bar.timestamp,
            side: intent.side,
            quantity,
            price,
            commission,
            slippage,
        };
        debug!(
            order_id = fill.order_id,
            side = %fill.side,
            quantity = fill.quantity,
            price = fill.price,
            commission = fill.commission,
            "order filled"
        );
        self.fills.push(fill.clone());
        Execution::Filled(fill)
    }

    fn record_rejection(&mut self, rejection: OrderRejection) -> Execution {
        debug!(
            order_id = rejection.order_id,
            side = %rejection.side,
            reason = %rejection.reason,
            "order not filled"
        );
        self.rejections.push(rejection.clone());
        Execution::Rejected(rejection)
    }
}

impl AccountQuery for PaperAccount {
    fn balances(&self) -> Result<Balances, HostError> {
        Ok(self.balances)
    }
}
