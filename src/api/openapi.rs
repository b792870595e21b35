use utoipa::OpenApi;

use crate::api::responses::*;
use crate::api::{eod_handlers, handlers, market_handlers, prediction_handlers};
use crate::database::models::{NewPrediction, Prediction};
use crate::forecast::{GeneratedPrediction, Horizon, PredictionStatus};
use crate::lifecycle::WorkerState;
use crate::models::{
    Bar, CleanBar, CompanyProfile, MoverDirection, MoverEntry, NewsArticle, Quote, Resolution,
    SymbolSearchResult,
};
use crate::sync::{EodStatus, SyncEntry, SyncReport, SyncStatus};

/// OpenAPI document served at /api-docs/openapi.json
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stock Insights API",
        version = "1.0.0",
        description = "Incremental OHLCV synchronization, end-of-day updates and price predictions",
        license(
            name = "MIT"
        )
    ),
    paths(
        handlers::health_check,
        market_handlers::get_quote,
        market_handlers::get_bars,
        market_handlers::search_symbols,
        market_handlers::get_movers,
        market_handlers::get_profile,
        market_handlers::get_news,
        market_handlers::get_series,
        eod_handlers::update_tickers,
        eod_handlers::update_all,
        eod_handlers::start_eod,
        eod_handlers::stop_eod,
        eod_handlers::get_eod_status,
        prediction_handlers::get_latest_predictions,
        prediction_handlers::get_ticker_latest_prediction,
        prediction_handlers::get_prediction_history,
        prediction_handlers::start_predictions,
        prediction_handlers::stop_predictions,
        prediction_handlers::get_prediction_status,
        prediction_handlers::generate_predictions,
    ),
    components(
        schemas(
            Bar,
            CleanBar,
            Resolution,
            Quote,
            SymbolSearchResult,
            MoverDirection,
            MoverEntry,
            CompanyProfile,
            NewsArticle,
            SeriesResponse,
            Prediction,
            NewPrediction,
            GeneratedPrediction,
            Horizon,
            PredictionStatus,
            WorkerState,
            EodStatus,
            SyncEntry,
            SyncStatus,
            SyncReport,
            TickersRequest,
            StartPredictionsResponse,
            StartEodResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and worker summary"),
        (name = "Stocks", description = "Market data from the upstream provider"),
        (name = "Series", description = "Persisted raw and regularized bar series"),
        (name = "EOD", description = "End-of-day synchronization"),
        (name = "Predictions", description = "Price prediction scheduler and results"),
    )
)]
pub struct ApiDoc;
