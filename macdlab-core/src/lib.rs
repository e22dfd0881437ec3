//! MacdLab Core: MACD indicator engine, signal policy, host interfaces, bar entry point.
//!
//! This crate holds everything a host needs to run the strategy:
//! - Domain types (price bars and series, frequencies, order intents, balances)
//! - SMA-seeded EMA and MACD, in batch and streaming form
//! - The full-position signal policy
//! - Host traits for market data, account queries and order entry
//! - `MacdStrategy::on_bar`, the per-bar entry point
//! - TOML configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod host;
pub mod indicators;
pub mod policy;
pub mod strategy;

pub use config::{Config, ConfigError};
pub use error::IndicatorError;
pub use host::{AccountQuery, HostError, MarketData, OrderSink};
pub use strategy::{Action, BarOutcome, EvaluationMode, MacdStrategy, SkipReason};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can move to a worker thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::OrderIntent>();
        require_sync::<domain::OrderIntent>();
        require_send::<indicators::MacdStream>();
        require_sync::<indicators::MacdStream>();
        require_send::<policy::SignalPolicy>();
        require_sync::<policy::SignalPolicy>();
        require_send::<MacdStrategy>();
        require_sync::<MacdStrategy>();
        require_send::<BarOutcome>();
        require_sync::<BarOutcome>();
        require_send::<Config>();
        require_sync::<Config>();
    }
}
