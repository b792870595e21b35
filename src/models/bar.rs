use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Decimal places kept for prices and volumes on write
pub const ROUND_DECIMALS: i32 = 6;

/// Round a value to [`ROUND_DECIMALS`] places
pub fn round_value(value: f64) -> f64 {
    let factor = 10f64.powi(ROUND_DECIMALS);
    (value * factor).round() / factor
}

/// One OHLCV observation for a symbol at a given resolution
///
/// Column order matches the raw table layout:
/// `timestamp, open, high, low, close, volume`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Bar {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Copy of this bar with every value rounded to the persisted precision
    pub fn rounded(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            open: round_value(self.open),
            high: round_value(self.high),
            low: round_value(self.low),
            close: round_value(self.close),
            volume: round_value(self.volume),
        }
    }

    /// All prices are finite numbers
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One slot of a regularized, model-ready series
///
/// Column order matches the clean table layout:
/// `item_id, timestamp, target, open, high, low, volume`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CleanBar {
    /// Symbol the series belongs to
    pub item_id: String,
    pub timestamp: DateTime<Utc>,
    /// Close price (the forecasting target)
    pub target: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl CleanBar {
    /// Slot taken from an actually observed bar
    pub fn observed(item_id: &str, bar: &Bar) -> Self {
        Self {
            item_id: item_id.to_string(),
            timestamp: bar.timestamp,
            target: round_value(bar.close),
            open: round_value(bar.open),
            high: round_value(bar.high),
            low: round_value(bar.low),
            volume: round_value(bar.volume),
        }
    }

    /// Gap slot carrying the previous close forward with zero volume
    pub fn filled(item_id: &str, timestamp: DateTime<Utc>, previous_close: f64) -> Self {
        let price = round_value(previous_close);
        Self {
            item_id: item_id.to_string(),
            timestamp,
            target: price,
            open: price,
            high: price,
            low: price,
            volume: 0.0,
        }
    }
}
