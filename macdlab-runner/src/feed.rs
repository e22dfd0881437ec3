//! Bar feed: one security's full price history plus a replay cursor.
//!
//! The feed is the market-data host for the backtest. `price_history` only
//! sees bars up to the cursor, so the strategy can never look ahead.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use macdlab_core::domain::{parse_timestamp, Frequency, PriceBar, PriceSeries, SeriesError, Symbol};
use macdlab_core::host::{HostError, MarketData};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("read bars {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("parse bars: {0}")]
    Parse(#[from] csv::Error),

    #[error("row {row}: unrecognized timestamp {value:?}")]
    Timestamp { row: usize, value: String },

    #[error("bars out of order: {0}")]
    Series(#[from] SeriesError),

    #[error("no bars loaded")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    close: f64,
}

#[derive(Debug, Clone)]
pub struct BarFeed {
    security: Symbol,
    frequency: Frequency,
    series: PriceSeries,
    cursor: usize,
}

impl BarFeed {
    /// Wrap an existing series. The cursor starts before the first bar.
    pub fn new(security: impl Into<Symbol>, frequency: Frequency, series: PriceSeries) -> Self {
        Self {
            security: security.into(),
            frequency,
            series,
            cursor: 0,
        }
    }

    /// Load `timestamp,close` rows from a CSV file. Extra columns are ignored.
    pub fn from_csv(
        path: &Path,
        security: impl Into<Symbol>,
        frequency: Frequency,
    ) -> Result<Self, FeedError> {
        let file = std::fs::File::open(path).map_err(|e| FeedError::Csv {
            path: path.to_path_buf(),
            source: csv::Error::from(e),
        })?;
        Self::from_reader(file, security, frequency)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        security: impl Into<Symbol>,
        frequency: Frequency,
    ) -> Result<Self, FeedError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut series = PriceSeries::new();
        for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row?;
            // Header is line 1
            let timestamp = parse_timestamp(&row.timestamp).ok_or(FeedError::Timestamp {
                row: i + 2,
                value: row.timestamp.clone(),
            })?;
            series.push(PriceBar::new(timestamp, row.close))?;
        }
        if series.is_empty() {
            return Err(FeedError::Empty);
        }
        Ok(Self::new(security, frequency, series))
    }

    /// Seeded random walk from `start` to `end` (inclusive) at `frequency`.
    ///
    /// The same security, window and seed always give the same bars.
    pub fn synthetic(
        security: impl Into<Symbol>,
        frequency: Frequency,
        start: NaiveDateTime,
        end: NaiveDateTime,
        seed: u64,
    ) -> Self {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let security = security.into();
        let mut hasher = blake3::Hasher::new();
        hasher.update(security.as_bytes());
        hasher.update(&seed.to_le_bytes());
        let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

        let step = frequency.duration();
        let mut bars = Vec::new();
        let mut price = 1_000.0_f64;
        let mut current = start;
        while current <= end {
            let ret: f64 = rng.gen_range(-0.04..0.04);
            price *= 1.0 + ret;
            bars.push(PriceBar::new(current, price));
            current += step;
        }

        Self {
            security,
            frequency,
            series: PriceSeries::from_bars(bars).unwrap_or_default(),
            cursor: 0,
        }
    }

    pub fn security(&self) -> &str {
        &self.security
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn series(&self) -> &PriceSeries {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of bars visible to `price_history`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Make the first `visible` bars available. Clamped to the series length.
    pub fn set_cursor(&mut self, visible: usize) {
        self.cursor = visible.min(self.series.len());
    }

    /// The most recent visible bar.
    pub fn current(&self) -> Option<&PriceBar> {
        self.cursor.checked_sub(1).and_then(|i| self.series.get(i))
    }

    /// BLAKE3 over security, timestamps and closes.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.security.as_bytes());
        hasher.update(self.frequency.as_str().as_bytes());
        for bar in &self.series {
            hasher.update(bar.timestamp.to_string().as_bytes());
            hasher.update(&bar.close.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl MarketData for BarFeed {
    fn price_history(
        &self,
        symbol: &str,
        count: usize,
        frequency: Frequency,
    ) -> Result<PriceSeries, HostError> {
        if symbol != self.security {
            return Err(HostError::UnknownSymbol(symbol.to_string()));
        }
        if frequency != self.frequency {
            return Err(HostError::Unavailable(format!(
                "feed has {} bars, {frequency} requested",
                self.frequency
            )));
        }
        let visible = &self.series.as_slice()[..self.cursor];
        let start = visible.len().saturating_sub(count);
        PriceSeries::from_bars(visible[start..].to_vec())
            .map_err(|e| HostError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
timestamp,open,close,volume
2017-01-01,1.0,100.0,5
2017-01-02 00:00:00,1.0,101.5,5
2017-01-03T00:00:00,1.0,99.25,5
";

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn loads_csv_ignoring_extra_columns() {
        let feed = BarFeed::from_reader(CSV.as_bytes(), "BTC", Frequency::OneDay).unwrap();
        assert_eq!(feed.len(), 3);
        assert_eq!(feed.series().closes(), vec![100.0, 101.5, 99.25]);
        assert_eq!(feed.cursor(), 0);
    }

    #[test]
    fn bad_timestamp_reports_row() {
        let csv = "timestamp,close\n2017-01-01,1.0\nnot-a-date,2.0\n";
        let err = BarFeed::from_reader(csv.as_bytes(), "BTC", Frequency::OneDay).unwrap_err();
        assert!(matches!(err, FeedError::Timestamp { row: 3, .. }));
    }

    #[test]
    fn unordered_rows_are_rejected() {
        let csv = "timestamp,close\n2017-01-02,1.0\n2017-01-01,2.0\n";
        let err = BarFeed::from_reader(csv.as_bytes(), "BTC", Frequency::OneDay).unwrap_err();
        assert!(matches!(err, FeedError::Series(SeriesError::NotChronological { .. })));
    }

    #[test]
    fn empty_csv_is_error() {
        let err = BarFeed::from_reader("timestamp,close\n".as_bytes(), "BTC", Frequency::OneDay)
            .unwrap_err();
        assert!(matches!(err, FeedError::Empty));
    }

    #[test]
    fn history_stops_at_cursor() {
        let mut feed = BarFeed::from_reader(CSV.as_bytes(), "BTC", Frequency::OneDay).unwrap();
        assert!(feed
            .price_history("BTC", 10, Frequency::OneDay)
            .unwrap()
            .is_empty());

        feed.set_cursor(2);
        let hist = feed.price_history("BTC", 10, Frequency::OneDay).unwrap();
        assert_eq!(hist.closes(), vec![100.0, 101.5]);
        assert_eq!(feed.current().unwrap().timestamp, ts("2017-01-02"));

        let hist = feed.price_history("BTC", 1, Frequency::OneDay).unwrap();
        assert_eq!(hist.closes(), vec![101.5]);

        feed.set_cursor(99);
        assert_eq!(feed.cursor(), 3);
    }

    #[test]
    fn wrong_symbol_or_frequency_is_host_error() {
        let feed = BarFeed::from_reader(CSV.as_bytes(), "BTC", Frequency::OneDay).unwrap();
        assert_eq!(
            feed.price_history("LTC", 10, Frequency::OneDay),
            Err(HostError::UnknownSymbol("LTC".into()))
        );
        assert!(matches!(
            feed.price_history("BTC", 10, Frequency::FourHours),
            Err(HostError::Unavailable(_))
        ));
    }

    #[test]
    fn synthetic_is_deterministic_per_seed() {
        let start = ts("2016-01-01");
        let end = ts("2016-03-01");
        let a = BarFeed::synthetic("BTC", Frequency::OneDay, start, end, 7);
        let b = BarFeed::synthetic("BTC", Frequency::OneDay, start, end, 7);
        let c = BarFeed::synthetic("BTC", Frequency::OneDay, start, end, 8);
        assert_eq!(a.len(), 61);
        assert_eq!(a.series(), b.series());
        assert_eq!(a.dataset_hash(), b.dataset_hash());
        assert_ne!(a.dataset_hash(), c.dataset_hash());
        assert!(a.series().iter().all(|bar| bar.close > 0.0));
    }
}
