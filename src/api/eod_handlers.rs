use axum::{extract::State, Json};
use std::sync::Arc;

use super::responses::{ApiError, StartEodResponse, TickersRequest};
use crate::sync::{EodStatus, EodUpdater, SyncReport};

pub type EodState = Arc<EodUpdater>;

/// Synchronize the given tickers now
#[utoipa::path(
    post,
    path = "/api/v1/eod/update",
    tag = "EOD",
    request_body = TickersRequest,
    responses(
        (status = 200, description = "Per-series outcome of the pass", body = SyncReport),
        (status = 400, description = "No tickers given", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn update_tickers(
    State(eod): State<EodState>,
    Json(request): Json<TickersRequest>,
) -> Result<Json<SyncReport>, ApiError> {
    let tickers = request.required()?;
    Ok(Json(eod.update(&tickers).await))
}

/// Synchronize every tracked ticker now
#[utoipa::path(
    post,
    path = "/api/v1/eod/update-all",
    tag = "EOD",
    responses((status = 200, description = "Per-series outcome of the pass", body = SyncReport))
)]
pub async fn update_all(State(eod): State<EodState>) -> Json<SyncReport> {
    Json(eod.update_all().await)
}

#[utoipa::path(
    post,
    path = "/api/v1/eod/start",
    tag = "EOD",
    request_body = TickersRequest,
    responses((status = 200, description = "Updater running", body = StartEodResponse))
)]
pub async fn start_eod(
    State(eod): State<EodState>,
    body: Option<Json<TickersRequest>>,
) -> Json<StartEodResponse> {
    let tickers = body.and_then(|Json(req)| req.tickers);
    let started = eod.start(tickers).await;
    Json(StartEodResponse {
        started,
        status: eod.status(),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/eod/stop",
    tag = "EOD",
    responses((status = 200, description = "Updater stopped", body = EodStatus))
)]
pub async fn stop_eod(State(eod): State<EodState>) -> Json<EodStatus> {
    eod.stop().await;
    Json(eod.status())
}

#[utoipa::path(
    get,
    path = "/api/v1/eod/status",
    tag = "EOD",
    responses((status = 200, description = "Updater status", body = EodStatus))
)]
pub async fn get_eod_status(State(eod): State<EodState>) -> Json<EodStatus> {
    Json(eod.status())
}
