use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::ServiceError;
use crate::forecast::PredictionStatus;
use crate::models::{Bar, CleanBar, Resolution};
use crate::sync::EodStatus;

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Errors returned by the HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Service(err) => {
                let (status, error_type) = match &err {
                    ServiceError::ModelLoadFailure(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable")
                    }
                    ServiceError::ProviderUnavailable { .. } => {
                        (StatusCode::BAD_GATEWAY, "provider_unavailable")
                    }
                    ServiceError::InsufficientHistory { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_history")
                    }
                    ServiceError::PersistenceFailure(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure")
                    }
                };
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", err);
                }
                (status, error_type, err.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Optional list of tickers in a request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TickersRequest {
    #[serde(default)]
    pub tickers: Option<Vec<String>>,
}

impl TickersRequest {
    /// The tickers, or a 400 when none were given
    pub fn required(self) -> Result<Vec<String>, ApiError> {
        match self.tickers {
            Some(tickers) if tickers.iter().any(|t| !t.trim().is_empty()) => Ok(tickers),
            _ => Err(ApiError::BadRequest("At least one ticker is required".to_string())),
        }
    }
}

/// Response to a start request
#[derive(Debug, Serialize, ToSchema)]
pub struct StartPredictionsResponse {
    /// False when the scheduler was already running
    pub started: bool,
    pub status: PredictionStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartEodResponse {
    pub started: bool,
    pub status: EodStatus,
}

/// Liveness plus a summary of the background workers
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub database_configured: bool,
    pub eod: EodStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<PredictionStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LatestQuery {
    /// Restrict to one ticker
    pub ticker: Option<String>,
    /// Maximum rows (1..=100)
    #[serde(default = "default_latest_limit")]
    pub limit: i64,
}

fn default_latest_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    #[serde(default = "default_hours_back")]
    pub hours_back: i64,
}

fn default_hours_back() -> i64 {
    24
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SeriesQuery {
    /// 5m, 15m or 1d
    #[serde(default = "default_resolution")]
    pub resolution: String,
    /// raw or clean
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_resolution() -> String {
    "5m".to_string()
}

fn default_kind() -> String {
    "clean".to_string()
}

/// Persisted series rows; exactly one of `raw` / `clean` is set
#[derive(Debug, Serialize, ToSchema)]
pub struct SeriesResponse {
    pub symbol: String,
    pub resolution: Resolution,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<Bar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean: Option<Vec<CleanBar>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BarsQuery {
    #[serde(default = "default_resolution")]
    pub resolution: String,
    /// First date (YYYY-MM-DD), default five days before `to`
    pub from: Option<chrono::NaiveDate>,
    /// Last date (YYYY-MM-DD), default today
    pub to: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NewsQuery {
    #[serde(default = "default_news_limit")]
    pub limit: usize,
}

fn default_news_limit() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status_codes() {
        let cases = [
            (ServiceError::ModelLoadFailure("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::provider("FMP", "down"), StatusCode::BAD_GATEWAY),
            (ServiceError::PersistenceFailure("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_tickers_required() {
        assert!(TickersRequest { tickers: None }.required().is_err());
        assert!(TickersRequest {
            tickers: Some(vec![" ".to_string()])
        }
        .required()
        .is_err());
        assert_eq!(
            TickersRequest {
                tickers: Some(vec!["AAPL".to_string()])
            }
            .required()
            .unwrap(),
            vec!["AAPL"]
        );
    }
}
