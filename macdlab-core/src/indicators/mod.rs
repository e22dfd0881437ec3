//! Indicator engine: SMA-seeded EMAs feeding the MACD oscillator.
//!
//! Two ways to evaluate the same math:
//! - batch (`compute_macd`, `latest_macd`): stateless, recomputed from a full window;
//! - streaming (`MacdStream`): persistent EMA accumulators fed one price per bar.

pub mod ema;
pub mod macd;

pub use ema::{ema_of_series, Ema};
pub use macd::{compute_macd, latest_macd, MacdParams, MacdResult, MacdSeries, MacdStream};

/// Deterministic wavy price path for tests.
#[cfg(test)]
pub fn make_prices(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.2).sin() * 10.0 + i as f64 * 0.05)
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
