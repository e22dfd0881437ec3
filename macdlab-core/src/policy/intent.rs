//! Trade intent: what the histogram sign asks for, before balances are consulted.

use serde::{Deserialize, Serialize};

/// Desired exposure derived purely from the MACD histogram.
///
/// The sign is the only trigger: there is no hysteresis band, so any sign
/// flip between consecutive bars flips the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeIntent {
    /// Histogram above zero: hold the asset.
    EnterLong,

    /// Histogram below zero: hold cash.
    ExitToCash,

    /// Histogram exactly zero (or undefined): do nothing.
    Hold,
}

impl TradeIntent {
    pub fn from_histogram(histogram: f64) -> Self {
        if histogram > 0.0 {
            TradeIntent::EnterLong
        } else if histogram < 0.0 {
            TradeIntent::ExitToCash
        } else {
            TradeIntent::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_maps_to_intent() {
        assert_eq!(TradeIntent::from_histogram(0.3), TradeIntent::EnterLong);
        assert_eq!(TradeIntent::from_histogram(-0.2), TradeIntent::ExitToCash);
        assert_eq!(TradeIntent::from_histogram(0.0), TradeIntent::Hold);
        assert_eq!(TradeIntent::from_histogram(-0.0), TradeIntent::Hold);
        assert_eq!(TradeIntent::from_histogram(f64::NAN), TradeIntent::Hold);
    }

    #[test]
    fn tiny_values_still_flip() {
        assert_eq!(TradeIntent::from_histogram(1e-300), TradeIntent::EnterLong);
        assert_eq!(TradeIntent::from_histogram(-1e-300), TradeIntent::ExitToCash);
    }
}
