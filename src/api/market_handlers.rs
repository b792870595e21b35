use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Duration;
use std::sync::Arc;

use super::responses::{
    ApiError, BarsQuery, NewsQuery, SearchQuery, SeriesQuery, SeriesResponse,
};
use crate::forecast::WorkerPool;
use crate::market_data::{MarketDataProvider, ProfileCache};
use crate::models::{
    Bar, CompanyProfile, MoverDirection, MoverEntry, NewsArticle, Quote, Resolution,
    SymbolSearchResult,
};
use crate::storage::{SeriesKind, SeriesStore};
use crate::timeseries::{exchange_today, DateRange};
use crate::utils::tickers::normalize_symbol;

/// Default lookback of the bars endpoint
const DEFAULT_BARS_DAYS: i64 = 5;
const MAX_NEWS: usize = 50;

/// Shared state for market data and series handlers
#[derive(Clone)]
pub struct MarketState {
    pub provider: Arc<dyn MarketDataProvider>,
    pub profiles: Arc<ProfileCache>,
    pub pool: WorkerPool,
    pub store: SeriesStore,
}

fn parse_resolution(raw: &str) -> Result<Resolution, ApiError> {
    Resolution::from_str(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown resolution '{}' (use 5m, 15m or 1d)", raw)))
}

/// Latest quote
#[utoipa::path(
    get,
    path = "/api/v1/stocks/quote/{symbol}",
    tag = "Stocks",
    params(("symbol" = String, Path, description = "Ticker symbol")),
    responses(
        (status = 200, description = "Quote", body = Quote),
        (status = 404, description = "Unknown symbol", body = crate::api::responses::ErrorResponse),
        (status = 502, description = "Provider unavailable", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn get_quote(
    State(state): State<MarketState>,
    Path(symbol): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let symbol = normalize_symbol(&symbol);
    state
        .pool
        .run(state.provider.get_quote(&symbol))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No quote for {}", symbol)))
}

/// Bars straight from the provider (not persisted)
#[utoipa::path(
    get,
    path = "/api/v1/stocks/bars/{symbol}",
    tag = "Stocks",
    params(("symbol" = String, Path, description = "Ticker symbol"), BarsQuery),
    responses(
        (status = 200, description = "Bars in ascending time order", body = Vec<Bar>),
        (status = 400, description = "Invalid resolution or date range", body = crate::api::responses::ErrorResponse),
        (status = 502, description = "Provider unavailable", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn get_bars(
    State(state): State<MarketState>,
    Path(symbol): Path<String>,
    Query(query): Query<BarsQuery>,
) -> Result<Json<Vec<Bar>>, ApiError> {
    let symbol = normalize_symbol(&symbol);
    let resolution = parse_resolution(&query.resolution)?;
    let to = query.to.unwrap_or_else(exchange_today);
    let from = query.from.unwrap_or(to - Duration::days(DEFAULT_BARS_DAYS));
    let range = DateRange::new(from, to)
        .ok_or_else(|| ApiError::BadRequest(format!("from ({}) is after to ({})", from, to)))?;

    let mut bars = state
        .pool
        .run(state.provider.get_bars(&symbol, resolution, range.start, range.end))
        .await?;
    bars.sort_by_key(|b| b.timestamp);
    Ok(Json(bars))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/search",
    tag = "Stocks",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching symbols", body = Vec<SymbolSearchResult>),
        (status = 400, description = "Empty query", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn search_symbols(
    State(state): State<MarketState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SymbolSearchResult>>, ApiError> {
    let q = query.query.trim();
    if q.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    Ok(Json(state.pool.run(state.provider.search(q)).await?))
}

/// Gainers, losers or most active
#[utoipa::path(
    get,
    path = "/api/v1/stocks/movers/{direction}",
    tag = "Stocks",
    params(("direction" = String, Path, description = "gainers, losers or actives")),
    responses(
        (status = 200, description = "Movers", body = Vec<MoverEntry>),
        (status = 400, description = "Unknown direction", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn get_movers(
    State(state): State<MarketState>,
    Path(direction): Path<String>,
) -> Result<Json<Vec<MoverEntry>>, ApiError> {
    let direction = MoverDirection::from_str(&direction).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown direction '{}' (use gainers, losers or actives)", direction))
    })?;
    Ok(Json(state.pool.run(state.provider.get_movers(direction)).await?))
}

/// Company profile, cached for 12 hours
#[utoipa::path(
    get,
    path = "/api/v1/stocks/profile/{symbol}",
    tag = "Stocks",
    params(("symbol" = String, Path, description = "Ticker symbol")),
    responses(
        (status = 200, description = "Company profile", body = CompanyProfile),
        (status = 404, description = "Unknown symbol", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<MarketState>,
    Path(symbol): Path<String>,
) -> Result<Json<CompanyProfile>, ApiError> {
    let symbol = normalize_symbol(&symbol);
    state
        .pool
        .run(state.profiles.get(&symbol))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No profile for {}", symbol)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/news/{symbol}",
    tag = "Stocks",
    params(("symbol" = String, Path, description = "Ticker symbol"), NewsQuery),
    responses((status = 200, description = "Recent articles", body = Vec<NewsArticle>))
)]
pub async fn get_news(
    State(state): State<MarketState>,
    Path(symbol): Path<String>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<Vec<NewsArticle>>, ApiError> {
    let symbol = normalize_symbol(&symbol);
    let limit = query.limit.clamp(1, MAX_NEWS);
    Ok(Json(state.pool.run(state.provider.get_news(&symbol, limit)).await?))
}

/// Persisted raw or clean series
#[utoipa::path(
    get,
    path = "/api/v1/series/{symbol}",
    tag = "Series",
    params(("symbol" = String, Path, description = "Ticker symbol"), SeriesQuery),
    responses(
        (status = 200, description = "Stored rows", body = SeriesResponse),
        (status = 400, description = "Invalid resolution or kind", body = crate::api::responses::ErrorResponse),
        (status = 404, description = "Nothing stored yet", body = crate::api::responses::ErrorResponse)
    )
)]
pub async fn get_series(
    State(state): State<MarketState>,
    Path(symbol): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let symbol = normalize_symbol(&symbol);
    let resolution = parse_resolution(&query.resolution)?;
    let kind = SeriesKind::from_str(&query.kind)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown kind '{}' (use raw or clean)", query.kind)))?;

    let store = state.store.clone();
    let sym = symbol.clone();
    let response = tokio::task::spawn_blocking(move || {
        let response = match kind {
            SeriesKind::Raw => {
                let raw = store.read_raw(&sym, resolution)?;
                SeriesResponse {
                    symbol: sym,
                    resolution,
                    count: raw.len(),
                    raw: Some(raw),
                    clean: None,
                }
            }
            SeriesKind::Clean => {
                let clean = store.read_clean(&sym, resolution)?;
                SeriesResponse {
                    symbol: sym,
                    resolution,
                    count: clean.len(),
                    raw: None,
                    clean: Some(clean),
                }
            }
        };
        Ok::<_, crate::errors::ServiceError>(response)
    })
    .await
    .map_err(crate::errors::ServiceError::from)??;

    if response.count == 0 {
        return Err(ApiError::NotFound(format!(
            "No {} {} series stored for {}",
            query.kind, resolution, symbol
        )));
    }
    Ok(Json(response))
}
