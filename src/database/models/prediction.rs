use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Persisted forecast for one ticker and horizon
///
/// Written once by the prediction scheduler and never updated.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::database::schema::stock_predictions)]
#[diesel(primary_key(id))]
pub struct Prediction {
    pub id: i64,

    /// Normalized ticker (e.g. "AAPL", "BRK-B")
    pub ticker: String,

    /// Point forecast (mean, or median when no mean is available)
    pub predicted_price: f64,

    /// Lower bound of the 80% interval (0.1 quantile)
    pub confidence_low: Option<f64>,

    /// Upper bound of the 80% interval (0.9 quantile)
    pub confidence_high: Option<f64>,

    /// Instant the forecast is for
    pub prediction_time: DateTime<Utc>,

    /// Minutes ahead of the last observed bar
    pub horizon_minutes: i32,

    pub model_version: String,

    pub created_at: DateTime<Utc>,
}

/// New prediction for insertion
#[derive(Debug, Clone, PartialEq, Insertable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::database::schema::stock_predictions)]
pub struct NewPrediction {
    pub ticker: String,
    pub predicted_price: f64,
    pub confidence_low: Option<f64>,
    pub confidence_high: Option<f64>,
    pub prediction_time: DateTime<Utc>,
    pub horizon_minutes: i32,
    pub model_version: String,
}

impl NewPrediction {
    pub fn new(
        ticker: impl Into<String>,
        predicted_price: f64,
        prediction_time: DateTime<Utc>,
        horizon_minutes: i32,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            predicted_price,
            confidence_low: None,
            confidence_high: None,
            prediction_time,
            horizon_minutes,
            model_version: model_version.into(),
        }
    }

    /// Set the confidence interval
    pub fn with_interval(mut self, low: Option<f64>, high: Option<f64>) -> Self {
        self.confidence_low = low;
        self.confidence_high = high;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_prediction_builder() {
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        let prediction = NewPrediction::new("AAPL", 185.25, time, 5, "chronos-bolt-base")
            .with_interval(Some(184.9), None);

        assert_eq!(prediction.ticker, "AAPL");
        assert_eq!(prediction.horizon_minutes, 5);
        assert_eq!(prediction.confidence_low, Some(184.9));
        assert!(prediction.confidence_high.is_none());
    }
}
