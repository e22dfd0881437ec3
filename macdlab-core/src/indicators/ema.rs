//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1)
//! Seed: EMA[period-1] = SMA of the first `period` values.
//! Lookback: period - 1.
//!
//! The batch helper and the streaming [`Ema`] use the same seed and the same
//! arithmetic order, so feeding a sequence through `Ema::update` reproduces
//! `ema_of_series` bit for bit.

use serde::{Deserialize, Serialize};

/// Smoothing constant for a given period.
pub fn alpha(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Compute EMA values over a slice. Warmup positions are `f64::NAN`.
///
/// A NaN inside the seed window yields an all-NaN result; a NaN after the
/// seed taints every later value.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let alpha = alpha(period);

    // Seed: SMA of first `period` values
    let mut sum = 0.0;
    for &v in values.iter().take(period) {
        if v.is_nan() {
            return result;
        }
        sum += v;
    }
    let seed = sum / period as f64;
    result[period - 1] = seed;

    let mut prev = seed;
    for i in period..n {
        if values[i].is_nan() {
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }
        let ema = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = ema;
        prev = ema;
    }

    result
}

/// Streaming EMA accumulator.
///
/// Holds the smoothing constant, the seed accumulator and the last value.
/// Owned by exactly one indicator; mutated once per price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    count: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            alpha: alpha(period),
            seed_sum: 0.0,
            count: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of bars before the first value.
    pub fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    /// Values consumed so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Last computed value, `None` during warmup.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    /// Feed one value; returns the EMA once the seed window is complete.
    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.count += 1;
        match self.value {
            Some(prev) => {
                let ema = self.alpha * x + (1.0 - self.alpha) * prev;
                self.value = Some(ema);
            }
            None => {
                self.seed_sum += x;
                if self.count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.count = 0;
        self.value = None;
    }
}
