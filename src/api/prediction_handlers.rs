use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::responses::{
    ApiError, HistoryQuery, LatestQuery, StartPredictionsResponse, TickersRequest,
};
use crate::database::models::Prediction;
use crate::forecast::{GeneratedPrediction, PredictionService, PredictionStatus};

pub type PredictionState = Arc<PredictionService>;

/// Latest stored predictions
#[utoipa::path(
    get,
    path = "/api/v1/predictions/latest",
    tag = "Predictions",
    params(LatestQuery),
    responses(
        (status = 200, description = "Newest predictions first", body = Vec<Prediction>),
        (status = 500, description = "Prediction store unavailable", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn get_latest_predictions(
    State(service): State<PredictionState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Vec<Prediction>>, ApiError> {
    let rows = service.latest(query.ticker, query.limit).await?;
    Ok(Json(rows))
}

/// Most recent prediction for one ticker
#[utoipa::path(
    get,
    path = "/api/v1/predictions/{ticker}/latest",
    tag = "Predictions",
    params(("ticker" = String, Path, description = "Ticker symbol (e.g., AAPL)")),
    responses(
        (status = 200, description = "Most recent prediction", body = Prediction),
        (status = 404, description = "No prediction stored for ticker", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn get_ticker_latest_prediction(
    State(service): State<PredictionState>,
    Path(ticker): Path<String>,
) -> Result<Json<Prediction>, ApiError> {
    service
        .latest(Some(ticker.clone()), 1)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No predictions found for {}", ticker)))
}

/// Predictions for a ticker within the last `hours_back` hours
#[utoipa::path(
    get,
    path = "/api/v1/predictions/history/{ticker}",
    tag = "Predictions",
    params(
        ("ticker" = String, Path, description = "Ticker symbol"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Prediction history, newest first", body = Vec<Prediction>)
    )
)]
pub async fn get_prediction_history(
    State(service): State<PredictionState>,
    Path(ticker): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Prediction>>, ApiError> {
    if query.hours_back <= 0 {
        return Err(ApiError::BadRequest("hours_back must be positive".to_string()));
    }
    Ok(Json(service.history(&ticker, query.hours_back).await?))
}

/// Start the prediction scheduler
#[utoipa::path(
    post,
    path = "/api/v1/predictions/start",
    tag = "Predictions",
    request_body = TickersRequest,
    responses(
        (status = 200, description = "Scheduler running", body = StartPredictionsResponse),
        (status = 503, description = "Model could not be loaded", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn start_predictions(
    State(service): State<PredictionState>,
    body: Option<Json<TickersRequest>>,
) -> Result<Json<StartPredictionsResponse>, ApiError> {
    let tickers = body.and_then(|Json(req)| req.tickers);
    let started = service.start(tickers).await?;

    Ok(Json(StartPredictionsResponse {
        started,
        status: service.status(),
    }))
}

/// Stop the prediction scheduler
#[utoipa::path(
    post,
    path = "/api/v1/predictions/stop",
    tag = "Predictions",
    responses((status = 200, description = "Scheduler stopped", body = PredictionStatus))
)]
pub async fn stop_predictions(State(service): State<PredictionState>) -> Json<PredictionStatus> {
    service.stop().await;
    Json(service.status())
}

#[utoipa::path(
    get,
    path = "/api/v1/predictions/status",
    tag = "Predictions",
    responses((status = 200, description = "Scheduler status", body = PredictionStatus))
)]
pub async fn get_prediction_status(State(service): State<PredictionState>) -> Json<PredictionStatus> {
    Json(service.status())
}

/// Predict now without storing the result
#[utoipa::path(
    post,
    path = "/api/v1/predictions/generate",
    tag = "Predictions",
    request_body = TickersRequest,
    responses(
        (status = 200, description = "Per-ticker predictions or errors", body = Vec<GeneratedPrediction>),
        (status = 400, description = "No tickers given", body = crate::api::responses::ErrorResponse),
        (status = 503, description = "Model could not be loaded", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn generate_predictions(
    State(service): State<PredictionState>,
    Json(request): Json<TickersRequest>,
) -> Result<Json<Vec<GeneratedPrediction>>, ApiError> {
    let tickers = request.required()?;
    Ok(Json(service.generate(&tickers).await?))
}
