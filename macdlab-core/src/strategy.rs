//! MACD strategy entry point: one `on_bar` call per host bar.
//!
//! Per bar:
//! 1. fetch the latest `required_history()` bars from the market-data host;
//! 2. evaluate the MACD histogram (batch recompute or streaming update);
//! 3. read balances and let the signal policy decide;
//! 4. hand any order intent to the order sink.
//!
//! Any failure in steps 1–3 skips the bar: it is logged at `warn` and
//! reported as [`BarOutcome::Skipped`], never propagated as a panic. The next
//! bar is the retry.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::{Frequency, OrderAck, OrderIntent, PriceSeries, Symbol};
use crate::error::IndicatorError;
use crate::host::{AccountQuery, HostError, MarketData, OrderSink};
use crate::indicators::{latest_macd, MacdParams, MacdResult, MacdStream};
use crate::policy::{Decision, NoActionReason, SignalPolicy};

/// How the histogram is produced each bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Recompute from the fetched window every bar. Stateless.
    #[default]
    Batch,
    /// Prime once from a full window, then feed only bars not seen before.
    Streaming,
}

/// Why a bar was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    Indicator(IndicatorError),
    MarketData(HostError),
    Account(HostError),
}

impl SkipReason {
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::Indicator(e) => e.kind(),
            SkipReason::MarketData(_) => "market_data",
            SkipReason::Account(_) => "account",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Indicator(e) => write!(f, "{e}"),
            SkipReason::MarketData(e) => write!(f, "market data: {e}"),
            SkipReason::Account(e) => write!(f, "account query: {e}"),
        }
    }
}

/// What happened after a successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Submitted { intent: OrderIntent, ack: OrderAck },
    Rejected { intent: OrderIntent, reason: HostError },
    NoAction(NoActionReason),
}

/// Result of one `on_bar` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BarOutcome {
    Skipped(SkipReason),
    Evaluated {
        timestamp: NaiveDateTime,
        price: f64,
        macd: MacdResult,
        action: Action,
    },
}

impl BarOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, BarOutcome::Skipped(_))
    }

    pub fn histogram(&self) -> Option<f64> {
        match self {
            BarOutcome::Evaluated { macd, .. } => Some(macd.histogram),
            BarOutcome::Skipped(_) => None,
        }
    }

    pub fn submitted(&self) -> Option<&OrderIntent> {
        match self {
            BarOutcome::Evaluated {
                action: Action::Submitted { intent, .. },
                ..
            } => Some(intent),
            _ => None,
        }
    }
}

/// The MACD crossover strategy for one security.
#[derive(Debug, Clone)]
pub struct MacdStrategy {
    security: Symbol,
    frequency: Frequency,
    params: MacdParams,
    policy: SignalPolicy,
    mode: EvaluationMode,
    stream: MacdStream,
    last_consumed: Option<NaiveDateTime>,
}

impl MacdStrategy {
    pub fn new(
        security: impl Into<Symbol>,
        frequency: Frequency,
        params: MacdParams,
        policy: SignalPolicy,
        mode: EvaluationMode,
    ) -> Self {
        Self {
            security: security.into(),
            frequency,
            params,
            policy,
            mode,
            stream: MacdStream::new(params),
            last_consumed: None,
        }
    }

    /// Build from a validated config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.strategy.security.clone(),
            config.strategy.frequency,
            config.macd_params(),
            SignalPolicy::new(config.policy),
            config.strategy.mode,
        )
    }

    pub fn security(&self) -> &str {
        &self.security
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn params(&self) -> &MacdParams {
        &self.params
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn stream(&self) -> &MacdStream {
        &self.stream
    }

    /// Evaluate one bar against the injected host interfaces.
    pub fn on_bar(
        &mut self,
        market: &dyn MarketData,
        account: &dyn AccountQuery,
        orders: &mut dyn OrderSink,
    ) -> BarOutcome {
        let history = match market.price_history(
            &self.security,
            self.params.required_history(),
            self.frequency,
        ) {
            Ok(history) => history,
            Err(e) => return self.skip(SkipReason::MarketData(e)),
        };

        let (timestamp, price, macd, staged) = match self.evaluate(&history) {
            Ok(evaluated) => evaluated,
            Err(e) => return self.skip(SkipReason::Indicator(e)),
        };
        info!(
            security = %self.security,
            %timestamp,
            dif = macd.dif_line,
            signal = macd.signal_line,
            histogram = macd.histogram,
            "MACD evaluated"
        );

        let balances = match account.balances() {
            Ok(balances) => balances,
            Err(e) => return self.skip(SkipReason::Account(e)),
        };
        if let Some(staged) = staged {
            self.stream = staged.stream;
            self.last_consumed = staged.last_consumed;
        }

        let action = match self.policy.decide(macd.histogram, &balances, price) {
            Decision::NoAction(reason) => {
                info!(
                    security = %self.security,
                    %timestamp,
                    cash = balances.cash,
                    asset_qty = balances.asset_qty,
                    %reason,
                    "no order this bar"
                );
                Action::NoAction(reason)
            }
            Decision::Order(intent) => match orders.submit_limit_order(&self.security, intent) {
                Ok(ack) => {
                    info!(
                        security = %self.security,
                        %timestamp,
                        side = %intent.side,
                        quantity = intent.quantity,
                        limit_price = intent.limit_price,
                        order_id = ack.order_id,
                        "limit order submitted"
                    );
                    Action::Submitted { intent, ack }
                }
                Err(e) => {
                    error!(
                        security = %self.security,
                        %timestamp,
                        side = %intent.side,
                        error = %e,
                        "order submission failed"
                    );
                    Action::Rejected { intent, reason: e }
                }
            },
        };

        BarOutcome::Evaluated {
            timestamp,
            price,
            macd,
            action,
        }
    }

    fn skip(&self, reason: SkipReason) -> BarOutcome {
        warn!(
            security = %self.security,
            kind = reason.kind(),
            %reason,
            "bar skipped, waiting for next bar"
        );
        BarOutcome::Skipped(reason)
    }

    /// Compute this bar's MACD. Streaming progress is returned staged and
    /// only committed by `on_bar` once the bar is past every skip point.
    fn evaluate(
        &self,
        history: &PriceSeries,
    ) -> Result<(NaiveDateTime, f64, MacdResult, Option<StagedStream>), IndicatorError> {
        let required = self.params.required_history();
        let last = *history.last().ok_or(IndicatorError::InsufficientHistory {
            required,
            available: 0,
        })?;

        let (macd, staged) = match self.mode {
            EvaluationMode::Batch => (latest_macd(&history.closes(), &self.params)?, None),
            EvaluationMode::Streaming => self.advance_stream(history)?,
        };
        Ok((last.timestamp, last.close, macd, staged))
    }

    /// Feed a copy of the stream the bars it has not consumed yet.
    ///
    /// Primes from the full window on first use, or when the window no longer
    /// overlaps what was consumed. A repeated bar stages nothing.
    fn advance_stream(
        &self,
        history: &PriceSeries,
    ) -> Result<(MacdResult, Option<StagedStream>), IndicatorError> {
        let fresh = match self.last_consumed {
            Some(last) if self.stream.is_ready() => history.since(last),
            _ => return self.prime_stream(history),
        };

        if fresh.is_empty() {
            let repeated = self.stream.latest().ok_or_else(|| {
                IndicatorError::ComputationError("stream has no value to repeat".into())
            })?;
            return Ok((repeated, None));
        }
        if fresh.len() == history.len() {
            warn!(
                security = %self.security,
                "bars missed since last evaluation, re-priming from window"
            );
            return self.prime_stream(history);
        }

        let mut stream = self.stream.clone();
        for bar in fresh {
            stream.update(bar.close)?;
        }
        let result = stream.latest().ok_or_else(|| {
            IndicatorError::ComputationError("stream not ready after update".into())
        })?;
        let staged = StagedStream {
            stream,
            last_consumed: fresh.last().map(|b| b.timestamp),
        };
        Ok((result, Some(staged)))
    }

    fn prime_stream(
        &self,
        history: &PriceSeries,
    ) -> Result<(MacdResult, Option<StagedStream>), IndicatorError> {
        let mut stream = self.stream.clone();
        let result = stream.prime(&history.closes())?;
        let staged = StagedStream {
            stream,
            last_consumed: history.last().map(|b| b.timestamp),
        };
        Ok((result, Some(staged)))
    }
}

/// Streaming state computed for a bar but not yet committed.
#[derive(Debug)]
struct StagedStream {
    stream: MacdStream,
    last_consumed: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Balances, OrderSide, PriceBar};
    use crate::policy::PolicyLimits;
    use chrono::{Duration, NaiveDate};
    use std::cell::RefCell;

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(i as i64)
    }

    /// In-memory host: full price path plus a cursor the test advances.
    struct FakeMarket {
        closes: Vec<f64>,
        cursor: RefCell<usize>,
        fail: bool,
    }

    impl FakeMarket {
        fn new(closes: Vec<f64>) -> Self {
            let cursor = RefCell::new(closes.len());
            Self {
                closes,
                cursor,
                fail: false,
            }
        }

        fn at(&self, end: usize) {
            *self.cursor.borrow_mut() = end;
        }
    }

    impl MarketData for FakeMarket {
        fn price_history(
            &self,
            symbol: &str,
            count: usize,
            _frequency: Frequency,
        ) -> Result<PriceSeries, HostError> {
            if self.fail {
                return Err(HostError::Unavailable("feed down".into()));
            }
            if symbol != "BTC" {
                return Err(HostError::UnknownSymbol(symbol.into()));
            }
            let end = *self.cursor.borrow();
            let start = end.saturating_sub(count);
            let bars = (start..end)
                .map(|i| PriceBar::new(ts(i), self.closes[i]))
                .collect();
            PriceSeries::from_bars(bars).map_err(|e| HostError::Unavailable(e.to_string()))
        }
    }

    struct FakeAccount(Balances);

    impl AccountQuery for FakeAccount {
        fn balances(&self) -> Result<Balances, HostError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        orders: Vec<OrderIntent>,
        reject: bool,
    }

    impl OrderSink for RecordingSink {
        fn submit_limit_order(
            &mut self,
            _symbol: &str,
            intent: OrderIntent,
        ) -> Result<OrderAck, HostError> {
            if self.reject {
                return Err(HostError::Rejected("venue closed".into()));
            }
            self.orders.push(intent);
            Ok(OrderAck {
                order_id: self.orders.len() as u64,
            })
        }
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5 + (i as f64 * 0.7).sin()).collect()
    }

    fn strategy(mode: EvaluationMode) -> MacdStrategy {
        MacdStrategy::new(
            "BTC",
            Frequency::OneDay,
            MacdParams::default(),
            SignalPolicy::new(PolicyLimits::default()),
            mode,
        )
    }

    #[test]
    fn short_history_skips_bar() {
        let market = FakeMarket::new(rising(99));
        let account = FakeAccount(Balances::new(100_000.0, 0.0));
        let mut sink = RecordingSink::default();
        let mut strat = strategy(EvaluationMode::Batch);

        let outcome = strat.on_bar(&market, &account, &mut sink);
        assert_eq!(
            outcome,
            BarOutcome::Skipped(SkipReason::Indicator(IndicatorError::InsufficientHistory {
                required: 100,
                available: 99
            }))
        );
        assert!(sink.orders.is_empty());
    }

    #[test]
    fn market_data_failure_skips_bar() {
        let mut market = FakeMarket::new(rising(120));
        market.fail = true;
        let account = FakeAccount(Balances::new(100_000.0, 0.0));
        let mut sink = RecordingSink::default();
        let outcome = strategy(EvaluationMode::Batch).on_bar(&market, &account, &mut sink);
        assert!(matches!(
            outcome,
            BarOutcome::Skipped(SkipReason::MarketData(HostError::Unavailable(_)))
        ));
    }

    #[test]
    fn bullish_bar_submits_buy() {
        let market = FakeMarket::new(rising(120));
        let account = FakeAccount(Balances::new(100_000.0, 0.0));
        let mut sink = RecordingSink::default();
        let mut strat = strategy(EvaluationMode::Batch);

        let outcome = strat.on_bar(&market, &account, &mut sink);
        let histogram = outcome.histogram().unwrap();
        if histogram > 0.0 {
            let intent = outcome.submitted().copied().unwrap();
            assert_eq!(intent.side, OrderSide::Buy);
            assert_eq!(sink.orders, vec![intent]);
        } else {
            assert!(sink.orders.is_empty());
        }
    }

    #[test]
    fn rejected_order_is_reported_not_fatal() {
        // Accelerating prices keep the histogram positive
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i * i) as f64 * 0.01).collect();
        let market = FakeMarket::new(closes);
        let account = FakeAccount(Balances::new(100_000.0, 0.0));
        let mut sink = RecordingSink {
            reject: true,
            ..RecordingSink::default()
        };
        let outcome = strategy(EvaluationMode::Batch).on_bar(&market, &account, &mut sink);
        match outcome {
            BarOutcome::Evaluated {
                action: Action::Rejected { reason, .. },
                ..
            } => assert_eq!(reason, HostError::Rejected("venue closed".into())),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn streaming_agrees_with_batch_on_first_bar() {
        let market = FakeMarket::new(rising(150));
        let account = FakeAccount(Balances::new(0.0, 0.0));
        let mut sink = RecordingSink::default();

        let batch = strategy(EvaluationMode::Batch).on_bar(&market, &account, &mut sink);
        let streaming = strategy(EvaluationMode::Streaming).on_bar(&market, &account, &mut sink);
        assert_eq!(batch.histogram(), streaming.histogram());
    }

    #[test]
    fn streaming_consumes_only_new_bars() {
        let market = FakeMarket::new(rising(130));
        let account = FakeAccount(Balances::new(0.0, 0.0));
        let mut sink = RecordingSink::default();
        let mut strat = strategy(EvaluationMode::Streaming);

        market.at(100);
        assert!(!strat.on_bar(&market, &account, &mut sink).is_skipped());
        assert_eq!(strat.stream().bars_seen(), 100);

        for end in 101..=130 {
            market.at(end);
            assert!(!strat.on_bar(&market, &account, &mut sink).is_skipped());
        }
        assert_eq!(strat.stream().bars_seen(), 130);

        // The stream, primed on the first 100 bars and then fed, equals a
        // batch evaluation over all 130 bars.
        let all = rising(130);
        let expected = latest_macd(&all, &MacdParams::default()).unwrap();
        let got = strat.stream().latest().unwrap();
        assert!((got.histogram - expected.histogram).abs() <= 1e-9 * expected.histogram.abs().max(1.0));
    }

    #[test]
    fn streaming_repeated_bar_reuses_value() {
        let market = FakeMarket::new(rising(120));
        let account = FakeAccount(Balances::new(0.0, 0.0));
        let mut sink = RecordingSink::default();
        let mut strat = strategy(EvaluationMode::Streaming);

        let first = strat.on_bar(&market, &account, &mut sink);
        let second = strat.on_bar(&market, &account, &mut sink);
        assert_eq!(first.histogram(), second.histogram());
        assert_eq!(
            strat.stream().bars_seen(),
            MacdParams::default().required_history()
        );
    }

    struct FlakyAccount {
        balances: Balances,
        down: RefCell<bool>,
    }

    impl AccountQuery for FlakyAccount {
        fn balances(&self) -> Result<Balances, HostError> {
            if *self.down.borrow() {
                Err(HostError::Unavailable("account service down".into()))
            } else {
                Ok(self.balances)
            }
        }
    }

    #[test]
    fn account_failure_leaves_stream_untouched() {
        let market = FakeMarket::new(rising(101));
        let account = FlakyAccount {
            balances: Balances::new(0.0, 0.0),
            down: RefCell::new(false),
        };
        let mut sink = RecordingSink::default();
        let mut strat = strategy(EvaluationMode::Streaming);

        market.at(100);
        assert!(!strat.on_bar(&market, &account, &mut sink).is_skipped());
        let before = strat.stream().clone();

        market.at(101);
        *account.down.borrow_mut() = true;
        let outcome = strat.on_bar(&market, &account, &mut sink);
        assert!(matches!(
            outcome,
            BarOutcome::Skipped(SkipReason::Account(HostError::Unavailable(_)))
        ));
        assert_eq!(strat.stream(), &before);
        assert_eq!(strat.stream().bars_seen(), 100);

        // The skipped bar is consumed on the retry
        *account.down.borrow_mut() = false;
        assert!(!strat.on_bar(&market, &account, &mut sink).is_skipped());
        assert_eq!(strat.stream().bars_seen(), 101);
    }

    #[test]
    fn account_failure_on_first_bar_does_not_prime() {
        let market = FakeMarket::new(rising(100));
        let account = FlakyAccount {
            balances: Balances::new(0.0, 0.0),
            down: RefCell::new(true),
        };
        let mut sink = RecordingSink::default();
        let mut strat = strategy(EvaluationMode::Streaming);

        assert!(strat.on_bar(&market, &account, &mut sink).is_skipped());
        assert!(!strat.stream().is_ready());
        assert_eq!(strat.stream().bars_seen(), 0);
    }

    #[test]
    fn streaming_short_history_leaves_stream_untouched() {
        let market = FakeMarket::new(rising(99));
        let account = FakeAccount(Balances::new(0.0, 0.0));
        let mut sink = RecordingSink::default();
        let mut strat = strategy(EvaluationMode::Streaming);
        let before = strat.stream().clone();

        assert!(strat.on_bar(&market, &account, &mut sink).is_skipped());
        assert_eq!(strat.stream(), &before);
    }

    #[test]
    fn skip_reason_display_and_kind() {
        let r = SkipReason::Account(HostError::Unavailable("timeout".into()));
        assert_eq!(r.kind(), "account");
        assert_eq!(r.to_string(), "account query: host data unavailable: timeout");
    }
}
