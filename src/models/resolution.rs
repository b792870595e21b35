use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Bar resolution enumeration
///
/// Represents the fixed time step between bars of a series. Intraday
/// resolutions are regularized onto the 09:30-16:00 session grid, daily bars
/// onto one slot per trading date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Resolution {
    #[serde(rename = "5m")]
    FiveMinutes,

    #[serde(rename = "15m")]
    FifteenMinutes,

    #[serde(rename = "1d")]
    OneDay,
}

impl Resolution {
    /// API string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::FiveMinutes => "5m",
            Resolution::FifteenMinutes => "15m",
            Resolution::OneDay => "1d",
        }
    }

    /// Parse API string to Resolution enum
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "5m" | "5min" => Some(Resolution::FiveMinutes),
            "15m" | "15min" => Some(Resolution::FifteenMinutes),
            "1d" | "1day" | "daily" => Some(Resolution::OneDay),
            _ => None,
        }
    }

    /// Interval name used by the market-data provider and in file names
    pub fn provider_interval(&self) -> &'static str {
        match self {
            Resolution::FiveMinutes => "5min",
            Resolution::FifteenMinutes => "15min",
            Resolution::OneDay => "1day",
        }
    }

    /// Folder holding the raw/clean tables of this resolution
    pub fn chart_dir(&self) -> &'static str {
        match self {
            Resolution::FiveMinutes => "5minutecharts",
            Resolution::FifteenMinutes => "15minutecharts",
            Resolution::OneDay => "dailycharts",
        }
    }

    /// Resolutions refreshed by the end-of-day synchronizer
    pub fn intraday() -> Vec<Self> {
        vec![Resolution::FiveMinutes, Resolution::FifteenMinutes]
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, Resolution::OneDay)
    }

    /// Get duration in seconds
    pub fn duration_seconds(&self) -> i64 {
        match self {
            Resolution::FiveMinutes => 300,
            Resolution::FifteenMinutes => 900,
            Resolution::OneDay => 86400,
        }
    }

    pub fn step(&self) -> Duration {
        Duration::seconds(self.duration_seconds())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_as_str() {
        assert_eq!(Resolution::FiveMinutes.as_str(), "5m");
        assert_eq!(Resolution::FifteenMinutes.as_str(), "15m");
        assert_eq!(Resolution::OneDay.as_str(), "1d");
    }

    #[test]
    fn test_resolution_from_str() {
        assert_eq!(Resolution::from_str("5m"), Some(Resolution::FiveMinutes));
        assert_eq!(Resolution::from_str("15min"), Some(Resolution::FifteenMinutes));
        assert_eq!(Resolution::from_str("1d"), Some(Resolution::OneDay));
        assert_eq!(Resolution::from_str("1h"), None);
    }

    #[test]
    fn test_provider_naming() {
        assert_eq!(Resolution::FiveMinutes.provider_interval(), "5min");
        assert_eq!(Resolution::FifteenMinutes.chart_dir(), "15minutecharts");
        assert_eq!(Resolution::OneDay.provider_interval(), "1day");
    }

    #[test]
    fn test_intraday_set() {
        let intraday = Resolution::intraday();
        assert_eq!(intraday.len(), 2);
        assert!(intraday.iter().all(|r| r.is_intraday()));
        assert!(!Resolution::OneDay.is_intraday());
    }

    #[test]
    fn test_resolution_duration() {
        assert_eq!(Resolution::FiveMinutes.duration_seconds(), 300);
        assert_eq!(Resolution::FifteenMinutes.step(), Duration::minutes(15));
        assert_eq!(Resolution::OneDay.duration_seconds(), 86400);
    }
}
