use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::forecast::PredictionService;
use crate::sync::EodUpdater;

use super::eod_handlers::*;
use super::handlers::{health_check, HealthState};
use super::market_handlers::*;
use super::openapi::ApiDoc;
use super::prediction_handlers::*;

/// Create the API router with Swagger UI
///
/// Prediction routes are only mounted when a prediction store is configured.
pub fn create_router(
    market: MarketState,
    eod: Arc<EodUpdater>,
    predictions: Option<Arc<PredictionService>>,
) -> Router {
    let health_state = HealthState {
        eod: eod.clone(),
        predictions: predictions.clone(),
    };

    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/v1/health", get(health_check))
        .with_state(health_state)
        // Market data (pass-through to the provider)
        .route("/api/v1/stocks/quote/:symbol", get(get_quote))
        .route("/api/v1/stocks/bars/:symbol", get(get_bars))
        .route("/api/v1/stocks/search", get(search_symbols))
        .route("/api/v1/stocks/movers/:direction", get(get_movers))
        .route("/api/v1/stocks/profile/:symbol", get(get_profile))
        .route("/api/v1/stocks/news/:symbol", get(get_news))
        // Persisted series
        .route("/api/v1/series/:symbol", get(get_series))
        .with_state(market)
        // EOD updater
        .route("/api/v1/eod/update", post(update_tickers))
        .route("/api/v1/eod/update-all", post(update_all))
        .route("/api/v1/eod/start", post(start_eod))
        .route("/api/v1/eod/stop", post(stop_eod))
        .route("/api/v1/eod/status", get(get_eod_status))
        .with_state(eod);

    if let Some(service) = predictions {
        let prediction_router = Router::new()
            .route("/api/v1/predictions/latest", get(get_latest_predictions))
            .route("/api/v1/predictions/:ticker/latest", get(get_ticker_latest_prediction))
            .route("/api/v1/predictions/history/:ticker", get(get_prediction_history))
            .route("/api/v1/predictions/start", post(start_predictions))
            .route("/api/v1/predictions/stop", post(stop_predictions))
            .route("/api/v1/predictions/status", get(get_prediction_status))
            .route("/api/v1/predictions/generate", post(generate_predictions))
            .with_state(service);

        router.merge(prediction_router)
    } else {
        router
    }
}
