//! MACD (Moving Average Convergence Divergence).
//!
//! DIF       = EMA(short) - EMA(long)
//! Signal    = EMA(signal) of DIF
//! Histogram = DIF - Signal
//!
//! Both EMAs are SMA-seeded (see `ema`). DIF exists from index `long - 1`,
//! the signal line from `long + signal - 2`, which is therefore the first
//! usable histogram index. Earlier positions are `f64::NAN` in batch output.

use serde::{Deserialize, Serialize};

use crate::error::{validate_window, IndicatorError};
use crate::indicators::ema::{ema_of_series, Ema};

/// Periods and history requirement for one MACD configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub short_period: usize,
    pub long_period: usize,
    pub signal_period: usize,
    /// Minimum window length before any value is produced.
    pub longest_history: usize,
}

impl MacdParams {
    pub fn new(
        short_period: usize,
        long_period: usize,
        signal_period: usize,
        longest_history: usize,
    ) -> Self {
        assert!(short_period >= 1, "short period must be >= 1");
        assert!(
            short_period < long_period,
            "short period must be less than long period"
        );
        assert!(signal_period >= 1, "signal period must be >= 1");
        Self {
            short_period,
            long_period,
            signal_period,
            longest_history,
        }
    }

    /// Bars needed before the first histogram value exists.
    pub fn warmup_len(&self) -> usize {
        self.long_period + self.signal_period - 1
    }

    /// First index whose histogram value may be read.
    pub fn first_valid_index(&self) -> usize {
        self.warmup_len() - 1
    }

    /// Effective minimum input length: `longest_history`, or the warmup if larger.
    pub fn required_history(&self) -> usize {
        self.longest_history.max(self.warmup_len())
    }
}

impl Default for MacdParams {
    fn default() -> Self {
        Self::new(12, 26, 5, 100)
    }
}

/// One evaluation of the oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    pub dif_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// Full batch output, aligned with the input prices.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub dif: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
    pub first_valid: usize,
}

impl MacdSeries {
    pub fn len(&self) -> usize {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Result at `index`, or `None` inside the warmup range or out of bounds.
    pub fn get(&self, index: usize) -> Option<MacdResult> {
        if index < self.first_valid || index >= self.len() {
            return None;
        }
        Some(MacdResult {
            dif_line: self.dif[index],
            signal_line: self.signal[index],
            histogram: self.histogram[index],
        })
    }

    pub fn latest(&self) -> Option<MacdResult> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Histogram values from the first usable index onward.
    pub fn usable_histogram(&self) -> &[f64] {
        &self.histogram[self.first_valid.min(self.len())..]
    }
}

/// Batch MACD over a full price window.
///
/// Checks length, then finiteness, before any arithmetic. Independent calls
/// share no state.
pub fn compute_macd(prices: &[f64], params: &MacdParams) -> Result<MacdSeries, IndicatorError> {
    validate_window(prices, params.required_history())?;

    let n = prices.len();
    let dif_start = params.long_period - 1;
    let first_valid = params.first_valid_index();

    let short = ema_of_series(prices, params.short_period);
    let long = ema_of_series(prices, params.long_period);

    let mut dif = vec![f64::NAN; n];
    for i in dif_start..n {
        dif[i] = short[i] - long[i];
    }

    let mut signal = vec![f64::NAN; n];
    let signal_tail = ema_of_series(&dif[dif_start..], params.signal_period);
    signal[dif_start..].copy_from_slice(&signal_tail);

    let mut histogram = vec![f64::NAN; n];
    for i in first_valid..n {
        histogram[i] = dif[i] - signal[i];
    }

    if let Some(i) = (first_valid..n)
        .find(|&i| !(dif[i].is_finite() && signal[i].is_finite() && histogram[i].is_finite()))
    {
        return Err(IndicatorError::ComputationError(format!(
            "non-finite MACD value at index {i}"
        )));
    }

    Ok(MacdSeries {
        dif,
        signal,
        histogram,
        first_valid,
    })
}

/// Batch MACD, last value only.
pub fn latest_macd(prices: &[f64], params: &MacdParams) -> Result<MacdResult, IndicatorError> {
    compute_macd(prices, params)?
        .latest()
        .ok_or_else(|| IndicatorError::ComputationError("empty MACD output".into()))
}

/// Incremental MACD: three EMA accumulators fed one price at a time.
///
/// Fed from empty, it reproduces [`compute_macd`] over the same sequence.
/// Every mutating call validates first and commits a staged copy only when
/// the new state is finite, so a failed call leaves the stream untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdStream {
    params: MacdParams,
    short: Ema,
    long: Ema,
    signal: Ema,
    seen: usize,
    last: Option<MacdResult>,
}

impl MacdStream {
    pub fn new(params: MacdParams) -> Self {
        Self {
            short: Ema::new(params.short_period),
            long: Ema::new(params.long_period),
            signal: Ema::new(params.signal_period),
            params,
            seen: 0,
            last: None,
        }
    }

    pub fn params(&self) -> &MacdParams {
        &self.params
    }

    pub fn bars_seen(&self) -> usize {
        self.seen
    }

    /// True once `required_history()` prices have been consumed.
    pub fn is_ready(&self) -> bool {
        self.seen >= self.params.required_history() && self.last.is_some()
    }

    /// Latest result, `None` until ready.
    pub fn latest(&self) -> Option<MacdResult> {
        if self.is_ready() {
            self.last
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.params);
    }

    /// Feed one price. Returns `Ok(None)` while warming up.
    pub fn update(&mut self, price: f64) -> Result<Option<MacdResult>, IndicatorError> {
        if !price.is_finite() {
            return Err(IndicatorError::InvalidInput {
                index: self.seen,
                value: price,
            });
        }
        let mut staged = self.clone();
        staged.apply(price)?;
        *self = staged;
        Ok(self.latest())
    }

    /// Discard current state and rebuild from a full window.
    ///
    /// The window is validated (length, then finiteness) before any
    /// accumulator is touched.
    pub fn prime(&mut self, window: &[f64]) -> Result<MacdResult, IndicatorError> {
        validate_window(window, self.params.required_history())?;
        let mut staged = Self::new(self.params);
        for &price in window {
            staged.apply(price)?;
        }
        let result = staged
            .latest()
            .ok_or_else(|| IndicatorError::ComputationError("stream not ready after prime".into()))?;
        *self = staged;
        Ok(result)
    }

    fn apply(&mut self, price: f64) -> Result<(), IndicatorError> {
        let bar = self.seen;
        self.seen += 1;
        let short = self.short.update(price);
        let long = self.long.update(price);

        if short.into_iter().chain(long).any(|v| !v.is_finite()) {
            return Err(IndicatorError::ComputationError(format!(
                "non-finite EMA value at bar {bar}"
            )));
        }
        let (Some(s), Some(l)) = (short, long) else {
            return Ok(());
        };

        let dif = s - l;
        if !dif.is_finite() {
            return Err(IndicatorError::ComputationError(format!(
                "non-finite DIF value at bar {bar}"
            )));
        }
        if let Some(sig) = self.signal.update(dif) {
            let histogram = dif - sig;
            if !(sig.is_finite() && histogram.is_finite()) {
                return Err(IndicatorError::ComputationError(format!(
                    "non-finite signal value at bar {bar}"
                )));
            }
            self.last = Some(MacdResult {
                dif_line: dif,
                signal_line: sig,
                histogram,
            });
        }
        Ok(())
    }
}
