use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use super::responses::HealthResponse;
use crate::forecast::PredictionService;
use crate::sync::EodUpdater;

/// State for the health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub eod: Arc<EodUpdater>,
    pub predictions: Option<Arc<PredictionService>>,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        database_configured: state.predictions.is_some(),
        eod: state.eod.status(),
        predictions: state.predictions.as_ref().map(|p| p.status()),
    })
}
