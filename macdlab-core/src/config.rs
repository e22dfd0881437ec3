//! TOML configuration for a strategy instance and its backtest.
//!
//! ```toml
//! [strategy]
//! security = "huobi_cny_btc"
//! frequency = "1d"
//! short_period = 12
//! long_period = 26
//! signal_period = 5
//! longest_history = 100
//! mode = "batch"
//!
//! [policy]
//! min_cash_amount = 1.0
//!
//! [backtest]
//! start_time = "2015-01-01 00:00:00"
//! end_time = "2017-07-01 00:00:00"
//! ```
//!
//! Every section and field is optional; missing values take the defaults.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{parse_timestamp, Frequency, Symbol};
use crate::indicators::MacdParams;
use crate::policy::PolicyLimits;
use crate::strategy::EvaluationMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("serialize config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Security, bar frequency, MACD periods and evaluation mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    pub security: Symbol,
    pub frequency: Frequency,
    pub short_period: usize,
    pub long_period: usize,
    pub signal_period: usize,
    pub longest_history: usize,
    pub mode: EvaluationMode,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            security: "huobi_cny_btc".into(),
            frequency: Frequency::OneDay,
            short_period: 12,
            long_period: 26,
            signal_period: 5,
            longest_history: 100,
            mode: EvaluationMode::Batch,
        }
    }
}

/// Backtest window, costs and starting balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub start_time: String,
    pub end_time: String,
    /// Commission as a fraction of notional.
    pub commission: f64,
    /// Slippage as a fraction of price.
    pub slippage: f64,
    pub initial_cash: f64,
    pub initial_asset_qty: f64,
    /// Label for the buy-and-hold comparison. Reporting only.
    pub benchmark: Option<Symbol>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            start_time: "2015-01-01 00:00:00".into(),
            end_time: "2017-07-01 00:00:00".into(),
            commission: 0.002,
            slippage: 0.001,
            initial_cash: 100_000.0,
            initial_asset_qty: 0.0,
            benchmark: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub strategy: StrategySection,
    pub policy: PolicyLimits,
    pub backtest: BacktestSection,
}

impl Config {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy;
        if s.security.trim().is_empty() {
            return invalid("strategy.security must not be empty");
        }
        if s.short_period < 1 || s.signal_period < 1 {
            return invalid("strategy periods must be >= 1");
        }
        if s.short_period >= s.long_period {
            return invalid(format!(
                "strategy.short_period ({}) must be less than long_period ({})",
                s.short_period, s.long_period
            ));
        }
        let warmup = s.long_period + s.signal_period - 1;
        if s.longest_history < warmup {
            return invalid(format!(
                "strategy.longest_history ({}) must be at least long_period + signal_period - 1 ({warmup})",
                s.longest_history
            ));
        }

        let p = &self.policy;
        for (name, value) in [
            ("policy.min_asset_qty", p.min_asset_qty),
            ("policy.min_cash_amount", p.min_cash_amount),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be a non-negative number"));
            }
        }
        for (name, value) in [
            ("policy.buy_markup", p.buy_markup),
            ("policy.sell_markdown", p.sell_markdown),
        ] {
            if !(0.0..1.0).contains(&value) {
                return invalid(format!("{name} must be in [0, 1)"));
            }
        }
        if !(p.cash_utilization > 0.0 && p.cash_utilization <= 1.0) {
            return invalid("policy.cash_utilization must be in (0, 1]");
        }

        let b = &self.backtest;
        for (name, value) in [
            ("backtest.commission", b.commission),
            ("backtest.slippage", b.slippage),
        ] {
            if !(0.0..1.0).contains(&value) {
                return invalid(format!("{name} must be in [0, 1)"));
            }
        }
        for (name, value) in [
            ("backtest.initial_cash", b.initial_cash),
            ("backtest.initial_asset_qty", b.initial_asset_qty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be a non-negative number"));
            }
        }
        let start = self.start_time()?;
        let end = self.end_time()?;
        if start >= end {
            return invalid(format!(
                "backtest.start_time ({start}) must be before end_time ({end})"
            ));
        }
        Ok(())
    }

    pub fn macd_params(&self) -> MacdParams {
        MacdParams::new(
            self.strategy.short_period,
            self.strategy.long_period,
            self.strategy.signal_period,
            self.strategy.longest_history,
        )
    }

    pub fn start_time(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_time("backtest.start_time", &self.backtest.start_time)
    }

    pub fn end_time(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_time("backtest.end_time", &self.backtest.end_time)
    }

    /// BLAKE3 hex digest of the canonical JSON form.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}

fn parse_time(field: &str, value: &str) -> Result<NaiveDateTime, ConfigError> {
    parse_timestamp(value)
        .ok_or_else(|| ConfigError::Invalid(format!("{field}: unrecognized timestamp {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.strategy.security, "huobi_cny_btc");
        assert_eq!(config.macd_params(), MacdParams::default());
        assert_eq!(config.backtest.initial_cash, 100_000.0);
        assert_eq!(config.strategy.mode, EvaluationMode::Batch);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = Config::from_toml(
            r#"
            [strategy]
            frequency = "4h"
            mode = "streaming"

            [policy]
            min_cash_amount = 25.0

            [backtest]
            start_time = "2016-03-01"
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy.frequency, Frequency::FourHours);
        assert_eq!(config.strategy.mode, EvaluationMode::Streaming);
        assert_eq!(config.strategy.long_period, 26);
        assert_eq!(config.policy.min_cash_amount, 25.0);
        assert_eq!(config.policy.min_asset_qty, 0.001);
        assert_eq!(
            config.start_time().unwrap(),
            parse_timestamp("2016-03-01 00:00:00").unwrap()
        );
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let mut config = Config::default();
        config.strategy.short_period = 8;
        let text = config.to_toml().unwrap();
        assert!(!text.contains("benchmark"));
        let reloaded = Config::from_toml(&text).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.fingerprint().unwrap(), config.fingerprint().unwrap());

        config.backtest.benchmark = Some("huobi_cny_btc".into());
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn rejects_short_not_below_long() {
        let err = Config::from_toml("[strategy]\nshort_period = 26\nlong_period = 26").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("short_period")));
    }

    #[test]
    fn rejects_history_shorter_than_warmup() {
        let err = Config::from_toml("[strategy]\nlongest_history = 29").unwrap_err();
        assert!(err.to_string().contains("longest_history"));
        assert!(Config::from_toml("[strategy]\nlongest_history = 30").is_ok());
    }

    #[test]
    fn rejects_bad_rates_and_balances() {
        assert!(Config::from_toml("[backtest]\ncommission = 1.0").is_err());
        assert!(Config::from_toml("[backtest]\nslippage = -0.1").is_err());
        assert!(Config::from_toml("[backtest]\ninitial_cash = -5.0").is_err());
        assert!(Config::from_toml("[policy]\ncash_utilization = 0.0").is_err());
        assert!(Config::from_toml("[policy]\nbuy_markup = 1.5").is_err());
    }

    #[test]
    fn rejects_inverted_window_and_bad_timestamps() {
        let err = Config::from_toml(
            "[backtest]\nstart_time = \"2017-01-01\"\nend_time = \"2016-01-01\"",
        )
        .unwrap_err();
        assert!(err.to_string().contains("before end_time"));

        let err = Config::from_toml("[backtest]\nstart_time = \"yesterday\"").unwrap_err();
        assert!(err.to_string().contains("backtest.start_time"));
    }

    #[test]
    fn unknown_frequency_is_parse_error() {
        let err = Config::from_toml("[strategy]\nfrequency = \"2d\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = Config::default();
        let mut b = Config::default();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
        b.policy.sell_markdown = 0.03;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn from_file_reports_path() {
        let missing = Path::new("/nonexistent/macdlab.toml");
        let err = Config::from_file(missing).unwrap_err();
        assert!(err.to_string().contains("macdlab.toml"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strategy.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[strategy]\nsecurity = \"okcoin_cny_btc\"").unwrap();
        drop(file);
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.strategy.security, "okcoin_cny_btc");
    }
}
