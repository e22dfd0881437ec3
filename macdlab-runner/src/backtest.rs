//! Backtest loop: replay a bar feed through `MacdStrategy::on_bar`.
//!
//! Per bar inside `[start_time, end_time]`:
//! 1. advance the feed cursor to the bar;
//! 2. call `on_bar` with the feed, the paper account and the order queue;
//! 3. execute every queued order against the same bar;
//! 4. mark equity at the bar close.
//!
//! Bars before `start_time` are visible as history but never evaluated.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use macdlab_core::config::{Config, ConfigError};
use macdlab_core::domain::{Balances, Frequency, Symbol};
use macdlab_core::strategy::{Action, BarOutcome, MacdStrategy};

use crate::broker::{Execution, Fill, OrderQueue, OrderRejection, PaperAccount};
use crate::cost::CostModel;
use crate::feed::BarFeed;
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("feed carries {feed}, config trades {config}")]
    SecurityMismatch { feed: String, config: String },

    #[error("feed frequency {feed} does not match configured {config}")]
    FrequencyMismatch { feed: Frequency, config: Frequency },

    #[error("no bars between {start} and {end}")]
    EmptyWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub cash: f64,
    pub asset_qty: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub bars: usize,
    pub evaluated: usize,
    pub skipped: usize,
    pub no_action: usize,
    pub submitted: usize,
    pub submit_failed: usize,
    pub filled: usize,
    pub rejected: usize,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// BLAKE3 of the config fingerprint and the dataset hash.
    pub run_id: String,
    pub config_fingerprint: String,
    pub dataset_hash: String,
    pub security: Symbol,
    pub benchmark: Option<Symbol>,
    pub frequency: Frequency,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub counts: RunCounts,
    /// Skipped bars by reason kind.
    pub skips: BTreeMap<String, usize>,
    /// No-action bars by reason.
    pub no_actions: BTreeMap<String, usize>,
    pub fills: Vec<Fill>,
    pub rejections: Vec<OrderRejection>,
    pub initial_balances: Balances,
    pub final_balances: Balances,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().map_or(0.0, |p| p.equity)
    }
}

/// Run the configured strategy over `feed`.
pub fn run_backtest(config: &Config, mut feed: BarFeed) -> Result<BacktestResult, RunError> {
    config.validate()?;
    if feed.security() != config.strategy.security {
        return Err(RunError::SecurityMismatch {
            feed: feed.security().to_string(),
            config: config.strategy.security.clone(),
        });
    }
    if feed.frequency() != config.strategy.frequency {
        return Err(RunError::FrequencyMismatch {
            feed: feed.frequency(),
            config: config.strategy.frequency,
        });
    }

    let start = config.start_time()?;
    let end = config.end_time()?;
    let window: Vec<usize> = feed
        .series()
        .iter()
        .enumerate()
        .filter(|(_, bar)| bar.timestamp >= start && bar.timestamp <= end)
        .map(|(i, _)| i)
        .collect();
    if window.is_empty() {
        return Err(RunError::EmptyWindow { start, end });
    }

    let config_fingerprint = config.fingerprint()?;
    let dataset_hash = feed.dataset_hash();
    let run_id = {
        let mut hasher = blake3::Hasher::new();
        hasher.update(config_fingerprint.as_bytes());
        hasher.update(dataset_hash.as_bytes());
        hasher.finalize().to_hex().to_string()
    };

    let initial_balances = Balances::new(
        config.backtest.initial_cash,
        config.backtest.initial_asset_qty,
    );
    let mut strategy = MacdStrategy::from_config(config);
    let mut account = PaperAccount::new(initial_balances, CostModel::from_config(&config.backtest));
    let mut queue = OrderQueue::new();

    info!(
        run_id = %run_id,
        security = %config.strategy.security,
        frequency = %config.strategy.frequency,
        mode = ?config.strategy.mode,
        bars = window.len(),
        "backtest started"
    );

    let mut counts = RunCounts::default();
    let mut skips: BTreeMap<String, usize> = BTreeMap::new();
    let mut no_actions: BTreeMap<String, usize> = BTreeMap::new();
    let mut equity_curve = Vec::with_capacity(window.len());
    let mut closes = Vec::with_capacity(window.len());

    for &index in &window {
        feed.set_cursor(index + 1);
        let Some(bar) = feed.current().copied() else {
            continue;
        };
        counts.bars += 1;

        match strategy.on_bar(&feed, &account, &mut queue) {
            BarOutcome::Skipped(reason) => {
                counts.skipped += 1;
                *skips.entry(reason.kind().to_string()).or_default() += 1;
            }
            BarOutcome::Evaluated { action, .. } => {
                counts.evaluated += 1;
                match action {
                    Action::Submitted { .. } => counts.submitted += 1,
                    Action::Rejected { .. } => counts.submit_failed += 1,
                    Action::NoAction(reason) => {
                        counts.no_action += 1;
                        *no_actions.entry(reason.to_string()).or_default() += 1;
                    }
                }
            }
        }

        for order in queue.drain() {
            match account.execute(&order, &bar) {
                Execution::Filled(_) => counts.filled += 1,
                Execution::Rejected(_) => counts.rejected += 1,
            }
        }

        let balances = account.snapshot();
        let price = if bar.is_void() {
            equity_curve
                .last()
                .map_or(0.0, |p: &EquityPoint| p.price)
        } else {
            bar.close
        };
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            price,
            cash: balances.cash,
            asset_qty: balances.asset_qty,
            equity: balances.equity(price),
        });
        closes.push(price);
    }

    let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    let metrics = PerformanceMetrics::compute(&equity, &closes, config.strategy.frequency);

    info!(
        run_id = %run_id,
        evaluated = counts.evaluated,
        skipped = counts.skipped,
        filled = counts.filled,
        total_return = metrics.total_return,
        benchmark_return = metrics.benchmark_return,
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config_fingerprint,
        dataset_hash,
        security: config.strategy.security.clone(),
        benchmark: config.backtest.benchmark.clone(),
        frequency: config.strategy.frequency,
        start_time: start,
        end_time: end,
        counts,
        skips,
        no_actions,
        fills: account.fills().to_vec(),
        rejections: account.rejections().to_vec(),
        initial_balances,
        final_balances: account.snapshot(),
        equity_curve,
        metrics,
    })
}
