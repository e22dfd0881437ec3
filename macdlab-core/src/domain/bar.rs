//! Price bars and the append-only chronological price series.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp layouts accepted from config files and CSV data.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a bar timestamp. A bare date (`YYYY-MM-DD`) means midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Close price of one bar at its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub close: f64,
}

impl PriceBar {
    pub fn new(timestamp: NaiveDateTime, close: f64) -> Self {
        Self { timestamp, close }
    }

    /// Returns true if the close is NaN or infinite (void bar).
    pub fn is_void(&self) -> bool {
        !self.close.is_finite()
    }
}

/// Ordering violations rejected by [`PriceSeries`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("duplicate timestamp {0}")]
    DuplicateTimestamp(NaiveDateTime),

    #[error("bar at {got} is earlier than the last bar at {last}")]
    NotChronological {
        last: NaiveDateTime,
        got: NaiveDateTime,
    },
}

/// Ordered sequence of bars: append-only, strictly increasing timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from bars, checking the ordering invariant.
    pub fn from_bars(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        let mut series = Self {
            bars: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            series.push(bar)?;
        }
        Ok(series)
    }

    /// Append a bar. Its timestamp must be strictly after the last one.
    pub fn push(&mut self, bar: PriceBar) -> Result<(), SeriesError> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp == last.timestamp {
                return Err(SeriesError::DuplicateTimestamp(bar.timestamp));
            }
            if bar.timestamp < last.timestamp {
                return Err(SeriesError::NotChronological {
                    last: last.timestamp,
                    got: bar.timestamp,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn get(&self, index: usize) -> Option<&PriceBar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceBar> {
        self.bars.iter()
    }

    pub fn as_slice(&self) -> &[PriceBar] {
        &self.bars
    }

    /// Close prices in chronological order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// The last `count` bars (all of them if the series is shorter).
    pub fn tail(&self, count: usize) -> &[PriceBar] {
        let start = self.bars.len().saturating_sub(count);
        &self.bars[start..]
    }

    /// Bars strictly after `timestamp`.
    pub fn since(&self, timestamp: NaiveDateTime) -> &[PriceBar] {
        let start = self.bars.partition_point(|b| b.timestamp <= timestamp);
        &self.bars[start..]
    }
}

impl<'a> IntoIterator for &'a PriceSeries {
    type Item = &'a PriceBar;
    type IntoIter = std::slice::Iter<'a, PriceBar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(day)
    }

    fn series(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(ts(i as i64), c))
            .collect();
        PriceSeries::from_bars(bars).unwrap()
    }

    #[test]
    fn push_rejects_duplicate_timestamp() {
        let mut s = series(&[1.0]);
        let err = s.push(PriceBar::new(ts(0), 2.0)).unwrap_err();
        assert_eq!(err, SeriesError::DuplicateTimestamp(ts(0)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn push_rejects_out_of_order() {
        let mut s = series(&[1.0, 2.0, 3.0]);
        let err = s.push(PriceBar::new(ts(1), 4.0)).unwrap_err();
        assert!(matches!(err, SeriesError::NotChronological { .. }));
    }

    #[test]
    fn tail_and_since() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let tail: Vec<f64> = s.tail(2).iter().map(|b| b.close).collect();
        assert_eq!(tail, vec![4.0, 5.0]);
        assert_eq!(s.tail(10).len(), 5);

        let since: Vec<f64> = s.since(ts(2)).iter().map(|b| b.close).collect();
        assert_eq!(since, vec![4.0, 5.0]);
        assert!(s.since(ts(4)).is_empty());
    }

    #[test]
    fn parses_supported_timestamp_layouts() {
        let midnight = ts(0);
        assert_eq!(parse_timestamp("2024-01-01"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp(" 2024-01-01T00:00:00 "), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-01 00:00"), Some(midnight));
        assert_eq!(parse_timestamp("01/01/2024"), None);
    }

    #[test]
    fn void_bar_detection() {
        assert!(PriceBar::new(ts(0), f64::NAN).is_void());
        assert!(PriceBar::new(ts(0), f64::INFINITY).is_void());
        assert!(!PriceBar::new(ts(0), 1.0).is_void());
    }
}
