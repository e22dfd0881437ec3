//! Host interfaces the strategy consumes.
//!
//! The trading platform owns market data, account bookkeeping and order
//! execution. The strategy sees them only through these three traits, so any
//! host (live venue, paper account, test double) can drive it.
//!
//! Logging is not a trait here: the strategy emits `tracing` events and the
//! host decides where they go by installing a subscriber.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Balances, Frequency, OrderAck, OrderIntent, PriceSeries};

/// Failures reported by a host.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum HostError {
    #[error("host data unavailable: {0}")]
    Unavailable(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("order rejected by host: {0}")]
    Rejected(String),
}

/// Price history provider.
pub trait MarketData {
    /// The most recent `count` bars of `symbol` at `frequency`, oldest first.
    ///
    /// May return fewer than `count` bars when the history is not available yet.
    fn price_history(
        &self,
        symbol: &str,
        count: usize,
        frequency: Frequency,
    ) -> Result<PriceSeries, HostError>;
}

/// Read-only view of the account.
pub trait AccountQuery {
    fn balances(&self) -> Result<Balances, HostError>;
}

/// Order entry. Fire-and-forget: execution results are not fed back.
pub trait OrderSink {
    fn submit_limit_order(
        &mut self,
        symbol: &str,
        intent: OrderIntent,
    ) -> Result<OrderAck, HostError>;
}
