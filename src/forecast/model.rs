//! Forecasting collaborator
//!
//! The model itself is served out of process. A model directory holds a
//! `predictor.json` manifest naming the serving endpoint and the shape of
//! the forecasts it returns:
//!
//! ```json
//! {
//!   "model_version": "chronos-bolt-base",
//!   "endpoint": "http://127.0.0.1:8081/predict",
//!   "prediction_length": 78,
//!   "freq": "5min",
//!   "quantile_levels": [0.1, 0.5, 0.9]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::CleanBar;

pub const MANIFEST_FILE: &str = "predictor.json";
/// The models are trained on the 5-minute grid only
pub const REQUIRED_FREQ: &str = "5min";
const FORECASTER_ID: &str = "forecaster";
const PREDICT_TIMEOUT_SECS: u64 = 30;

/// One forecast row keyed by `(item_id, timestamp)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub item_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub mean: Option<f64>,
    /// Quantile level (as written by the model, e.g. "0.1") to value
    #[serde(default)]
    pub quantiles: BTreeMap<String, f64>,
}

impl ForecastPoint {
    pub fn quantile(&self, level: f64) -> Option<f64> {
        self.quantiles.iter().find_map(|(key, value)| {
            key.parse::<f64>()
                .ok()
                .filter(|k| (k - level).abs() < 1e-9)
                .map(|_| *value)
        })
    }

    /// Mean, falling back to the median
    pub fn point_forecast(&self) -> Option<f64> {
        self.mean.or_else(|| self.quantile(0.5))
    }
}

/// Forecast rows for one item, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastFrame {
    pub points: Vec<ForecastPoint>,
}

impl ForecastFrame {
    /// Row `steps` ahead of the last observation (1-based)
    pub fn at_step(&self, steps: usize) -> Option<&ForecastPoint> {
        steps.checked_sub(1).and_then(|i| self.points.get(i))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A loaded forecasting model
#[async_trait]
pub trait Forecaster: Send + Sync {
    fn model_version(&self) -> &str;

    /// Predict forward from a regularized 5-minute history window
    async fn predict(&self, item_id: &str, history: &[CleanBar]) -> Result<ForecastFrame, ServiceError>;
}

/// Loads a [`Forecaster`] from a model directory
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Arc<dyn Forecaster>, ServiceError>;
}

/// Contents of `predictor.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model_version: String,
    pub endpoint: String,
    #[serde(default = "default_prediction_length")]
    pub prediction_length: usize,
    pub freq: String,
    #[serde(default = "default_quantile_levels")]
    pub quantile_levels: Vec<f64>,
}

fn default_prediction_length() -> usize {
    78
}

fn default_quantile_levels() -> Vec<f64> {
    vec![0.1, 0.5, 0.9]
}

impl ModelManifest {
    pub fn parse(contents: &str) -> Result<Self, ServiceError> {
        let manifest: ModelManifest = serde_json::from_str(contents)
            .map_err(|e| ServiceError::ModelLoadFailure(format!("Invalid {}: {}", MANIFEST_FILE, e)))?;

        if manifest.freq != REQUIRED_FREQ {
            return Err(ServiceError::ModelLoadFailure(format!(
                "Model frequency is {}, expected {}",
                manifest.freq, REQUIRED_FREQ
            )));
        }
        if manifest.prediction_length == 0 {
            return Err(ServiceError::ModelLoadFailure(
                "prediction_length must be positive".to_string(),
            ));
        }
        Ok(manifest)
    }
}

/// Reads `predictor.json` and builds a [`RemoteForecaster`] from it
#[derive(Debug, Default, Clone)]
pub struct ManifestModelLoader;

#[async_trait]
impl ModelLoader for ManifestModelLoader {
    async fn load(&self, path: &Path) -> Result<Arc<dyn Forecaster>, ServiceError> {
        let manifest_path = path.join(MANIFEST_FILE);
        let contents = tokio::fs::read_to_string(&manifest_path).await.map_err(|e| {
            ServiceError::ModelLoadFailure(format!("Cannot read {}: {}", manifest_path.display(), e))
        })?;

        let manifest = ModelManifest::parse(&contents)?;
        tracing::info!(
            "📦 Loaded model {} from {} (horizon {} steps)",
            manifest.model_version,
            path.display(),
            manifest.prediction_length
        );
        Ok(Arc::new(RemoteForecaster::new(manifest)))
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    item_id: &'a str,
    freq: &'a str,
    prediction_length: usize,
    quantile_levels: &'a [f64],
    history: &'a [CleanBar],
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<ForecastPoint>,
}

/// Forecaster backed by the manifest's HTTP serving endpoint
pub struct RemoteForecaster {
    client: Client,
    manifest: ModelManifest,
}

impl RemoteForecaster {
    pub fn new(manifest: ModelManifest) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(PREDICT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, manifest }
    }
}

#[async_trait]
impl Forecaster for RemoteForecaster {
    fn model_version(&self) -> &str {
        &self.manifest.model_version
    }

    async fn predict(&self, item_id: &str, history: &[CleanBar]) -> Result<ForecastFrame, ServiceError> {
        let body = PredictRequest {
            item_id,
            freq: &self.manifest.freq,
            prediction_length: self.manifest.prediction_length,
            quantile_levels: &self.manifest.quantile_levels,
            history,
        };

        let response = self
            .client
            .post(&self.manifest.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::provider(FORECASTER_ID, format!("Prediction for {} timed out", item_id))
                } else {
                    ServiceError::provider(FORECASTER_ID, format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::provider(
                FORECASTER_ID,
                format!("HTTP {} for {}", status.as_u16(), item_id),
            ));
        }

        let mut parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::provider(FORECASTER_ID, format!("Invalid response body: {}", e)))?;

        parsed.predictions.retain(|p| p.item_id == item_id);
        parsed.predictions.sort_by_key(|p| p.timestamp);
        Ok(ForecastFrame {
            points: parsed.predictions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn point(mean: Option<f64>, quantiles: &[(&str, f64)]) -> ForecastPoint {
        ForecastPoint {
            item_id: "AAPL".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap(),
            mean,
            quantiles: quantiles.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_point_forecast_falls_back_to_median() {
        let p = point(None, &[("0.1", 99.0), ("0.5", 100.0), ("0.9", 101.0)]);
        assert_eq!(p.point_forecast(), Some(100.0));
        assert_eq!(p.quantile(0.1), Some(99.0));

        let p = point(Some(100.4), &[]);
        assert_eq!(p.point_forecast(), Some(100.4));
        assert_eq!(p.quantile(0.9), None);
    }

    #[test]
    fn test_frame_at_step_is_one_based() {
        let frame = ForecastFrame {
            points: vec![point(Some(1.0), &[]), point(Some(2.0), &[])],
        };
        assert_eq!(frame.at_step(1).and_then(|p| p.mean), Some(1.0));
        assert_eq!(frame.at_step(2).and_then(|p| p.mean), Some(2.0));
        assert!(frame.at_step(0).is_none());
        assert!(frame.at_step(3).is_none());
    }

    #[test]
    fn test_manifest_rejects_other_frequency() {
        let err = ModelManifest::parse(
            r#"{"model_version": "m", "endpoint": "http://x", "freq": "1h"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ModelLoadFailure(_)));
    }

    #[test]
    fn test_manifest_defaults() {
        let manifest = ModelManifest::parse(
            r#"{"model_version": "m", "endpoint": "http://x", "freq": "5min"}"#,
        )
        .unwrap();
        assert_eq!(manifest.prediction_length, 78);
        assert_eq!(manifest.quantile_levels, vec![0.1, 0.5, 0.9]);
    }

    #[tokio::test]
    async fn test_missing_manifest_is_load_failure() {
        let dir = TempDir::new().unwrap();
        let result = ManifestModelLoader.load(dir.path()).await;
        assert!(matches!(result, Err(ServiceError::ModelLoadFailure(_))));
    }

    #[tokio::test]
    async fn test_load_from_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"model_version": "chronos-test", "endpoint": "http://127.0.0.1:9/predict", "freq": "5min"}"#,
        )
        .unwrap();

        let forecaster = ManifestModelLoader.load(dir.path()).await.unwrap();
        assert_eq!(forecaster.model_version(), "chronos-test");
    }
}
