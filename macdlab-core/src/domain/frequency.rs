//! Bar frequency as spelled by the host ("1m" .. "1w").

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
    #[serde(rename = "4h")]
    FourHours,
    #[default]
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Frequency {
    pub const ALL: [Frequency; 8] = [
        Frequency::OneMinute,
        Frequency::FiveMinutes,
        Frequency::FifteenMinutes,
        Frequency::ThirtyMinutes,
        Frequency::SixtyMinutes,
        Frequency::FourHours,
        Frequency::OneDay,
        Frequency::OneWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::OneMinute => "1m",
            Frequency::FiveMinutes => "5m",
            Frequency::FifteenMinutes => "15m",
            Frequency::ThirtyMinutes => "30m",
            Frequency::SixtyMinutes => "60m",
            Frequency::FourHours => "4h",
            Frequency::OneDay => "1d",
            Frequency::OneWeek => "1w",
        }
    }

    /// Wall-clock length of one bar.
    pub fn duration(&self) -> Duration {
        match self {
            Frequency::OneMinute => Duration::minutes(1),
            Frequency::FiveMinutes => Duration::minutes(5),
            Frequency::FifteenMinutes => Duration::minutes(15),
            Frequency::ThirtyMinutes => Duration::minutes(30),
            Frequency::SixtyMinutes => Duration::minutes(60),
            Frequency::FourHours => Duration::hours(4),
            Frequency::OneDay => Duration::days(1),
            Frequency::OneWeek => Duration::weeks(1),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                format!("unknown frequency '{s}'. Valid: 1m, 5m, 15m, 30m, 60m, 4h, 1d, 1w")
            })
    }
}
