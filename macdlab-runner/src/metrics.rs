//! Performance metrics: pure functions over the equity curve.

use serde::{Deserialize, Serialize};

use macdlab_core::domain::Frequency;

/// Aggregate performance metrics for one backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    /// Buy-and-hold return of the security over the same window.
    pub benchmark_return: f64,
    /// `total_return - benchmark_return`.
    pub excess_return: f64,
}

impl PerformanceMetrics {
    pub fn compute(equity_curve: &[f64], closes: &[f64], frequency: Frequency) -> Self {
        let total = total_return(equity_curve);
        let benchmark = total_return(closes);
        Self {
            total_return: total,
            max_drawdown: max_drawdown(equity_curve),
            sharpe: sharpe_ratio(equity_curve, periods_per_year(frequency)),
            benchmark_return: benchmark,
            excess_return: total - benchmark,
        }
    }
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(curve: &[f64]) -> f64 {
    match (curve.first(), curve.last()) {
        (Some(&initial), Some(&last)) if curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Bar-to-bar simple returns.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio with zero risk-free rate.
///
/// Returns 0.0 if variance is zero or there are fewer than two returns.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    mean / std * periods_per_year.sqrt()
}

/// Bars per year. Crypto venues trade around the clock.
pub fn periods_per_year(frequency: Frequency) -> f64 {
    let minutes = frequency.duration().num_minutes() as f64;
    365.0 * 24.0 * 60.0 / minutes
}
