//! MacdLab Runner: a paper host for the MACD strategy.
//!
//! This crate builds on `macdlab-core` to provide:
//! - A bar feed from CSV or a seeded random walk, acting as the market-data host
//! - A paper account and order queue with slippage and commission
//! - The backtest loop and its performance metrics
//! - JSON and CSV artifacts

pub mod backtest;
pub mod broker;
pub mod cost;
pub mod feed;
pub mod metrics;
pub mod report;

pub use backtest::{run_backtest, BacktestResult, EquityPoint, RunCounts, RunError, SCHEMA_VERSION};
pub use broker::{Execution, Fill, OrderQueue, OrderRejection, PaperAccount, QueuedOrder, RejectReason};
pub use cost::CostModel;
pub use feed::{BarFeed, FeedError};
pub use metrics::PerformanceMetrics;
pub use report::{
    load_result_json, save_artifacts, write_equity_csv, write_fills_csv, write_result_json,
};
