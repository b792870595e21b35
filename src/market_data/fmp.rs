//! Financial Modeling Prep (FMP) market data provider
//!
//! Uses the v3 REST API:
//! - Intraday bars via /historical-chart/{interval}/{symbol}
//! - Daily bars via /historical-price-full/{symbol}
//! - Quotes, search, movers, profiles and news
//!
//! FMP reports bar times as exchange-local wall clock strings without an
//! offset; they are resolved against America/New_York here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::provider::MarketDataProvider;
use crate::errors::ServiceError;
use crate::models::{
    Bar, CompanyProfile, MoverDirection, MoverEntry, NewsArticle, Quote, Resolution,
    SymbolSearchResult,
};
use crate::timeseries::EXCHANGE_TZ;

pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
const PROVIDER_ID: &str = "FMP";
const CLIENT_TIMEOUT_SECS: u64 = 30;
const LOOKUP_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// API Response Structures
// ============================================================================

/// Row of /historical-chart and /historical-price-full
#[derive(Debug, Deserialize)]
struct ChartRow {
    date: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
}

/// Response from /historical-price-full
#[derive(Debug, Deserialize)]
struct DailyHistoryResponse {
    #[serde(default)]
    historical: Vec<ChartRow>,
}

/// Response item from /quote
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRow {
    symbol: String,
    name: Option<String>,
    price: Option<f64>,
    change: Option<f64>,
    changes_percentage: Option<f64>,
    day_high: Option<f64>,
    day_low: Option<f64>,
    volume: Option<f64>,
    /// Unix seconds
    timestamp: Option<i64>,
}

/// Response item from /search
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRow {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exchange_short_name: Option<String>,
    #[serde(default)]
    stock_exchange: Option<String>,
}

/// Response item from /stock_market/{gainers,losers,actives}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoverRow {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    change: Option<f64>,
    #[serde(default)]
    changes_percentage: Option<f64>,
}

/// Response item from /profile
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRow {
    symbol: Option<String>,
    company_name: Option<String>,
    exchange_short_name: Option<String>,
    industry: Option<String>,
    sector: Option<String>,
    ceo: Option<String>,
    mkt_cap: Option<f64>,
    website: Option<String>,
    description: Option<String>,
}

/// Response item from /stock_news
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsRow {
    symbol: Option<String>,
    published_date: Option<String>,
    title: Option<String>,
    image: Option<String>,
    site: Option<String>,
    text: Option<String>,
    url: Option<String>,
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Resolve an FMP local timestamp ("2024-01-02 09:30:00" or "2024-01-02")
fn parse_exchange_time(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    EXCHANGE_TZ
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert chart rows to bars, dropping rows with unparseable times or missing prices
fn rows_to_bars(rows: Vec<ChartRow>) -> Vec<Bar> {
    let total = rows.len();
    let bars: Vec<Bar> = rows
        .into_iter()
        .filter_map(|row| {
            let timestamp = parse_exchange_time(&row.date)?;
            Some(Bar::new(
                timestamp,
                row.open?,
                row.high?,
                row.low?,
                row.close?,
                row.volume.unwrap_or(0.0),
            ))
        })
        .collect();

    if bars.len() < total {
        debug!("Dropped {} malformed FMP rows", total - bars.len());
    }
    bars
}

impl From<ProfileRow> for CompanyProfile {
    fn from(row: ProfileRow) -> Self {
        let symbol = row.symbol.unwrap_or_default();
        CompanyProfile {
            company_name: row.company_name.unwrap_or_else(|| symbol.clone()),
            symbol,
            exchange: row.exchange_short_name.unwrap_or_default(),
            industry: row.industry.unwrap_or_default(),
            sector: row.sector.unwrap_or_default(),
            ceo: row.ceo.unwrap_or_default(),
            market_cap: row.mkt_cap.unwrap_or(0.0),
            website: row.website.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
        }
    }
}

// ============================================================================
// FmpProvider
// ============================================================================

/// Financial Modeling Prep market data provider
pub struct FmpProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FmpProvider {
    /// Create a new FMP provider with the given API key and base URL
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        if api_key.is_empty() {
            warn!("⚠️  FMP_API_KEY is empty, market data requests will be rejected");
        }

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Make a GET request and decode the JSON body
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<T, ServiceError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())]);
        for (key, value) in params {
            request = request.query(&[(key, value.as_str())]);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        debug!("FMP request: {} with {} params", endpoint, params.len());

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::provider(PROVIDER_ID, format!("Request to {} timed out", endpoint))
            } else {
                ServiceError::provider(PROVIDER_ID, format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::provider(PROVIDER_ID, "Rate limited"));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ServiceError::provider(PROVIDER_ID, "Invalid or missing API key"));
        }
        if !status.is_success() {
            return Err(ServiceError::provider(
                PROVIDER_ID,
                format!("HTTP {} from {}", status.as_u16(), endpoint),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::provider(PROVIDER_ID, format!("Invalid response body: {}", e)))
    }
}

#[async_trait]
impl MarketDataProvider for FmpProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, ServiceError> {
        let rows: Vec<QuoteRow> = self
            .fetch(
                &format!("/quote/{}", symbol),
                &[],
                Some(Duration::from_secs(LOOKUP_TIMEOUT_SECS)),
            )
            .await?;

        Ok(rows.into_iter().next().and_then(|row| {
            Some(Quote {
                price: row.price?,
                symbol: row.symbol,
                name: row.name,
                change: row.change,
                change_percent: row.changes_percentage,
                day_high: row.day_high,
                day_low: row.day_low,
                volume: row.volume,
                timestamp: row.timestamp.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            })
        }))
    }

    async fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, ServiceError> {
        let params = [
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
        ];

        let rows = if resolution.is_intraday() {
            let endpoint = format!(
                "/historical-chart/{}/{}",
                resolution.provider_interval(),
                symbol
            );
            self.fetch::<Vec<ChartRow>>(&endpoint, &params, None).await?
        } else {
            let endpoint = format!("/historical-price-full/{}", symbol);
            self.fetch::<DailyHistoryResponse>(&endpoint, &params, None)
                .await?
                .historical
        };

        Ok(rows_to_bars(rows))
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolSearchResult>, ServiceError> {
        let rows: Vec<SearchRow> = self
            .fetch(
                "/search",
                &[("query", query.to_string()), ("limit", "10".to_string())],
                Some(Duration::from_secs(LOOKUP_TIMEOUT_SECS)),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SymbolSearchResult {
                name: row.name.unwrap_or_else(|| row.symbol.clone()),
                exchange: row
                    .exchange_short_name
                    .or(row.stock_exchange)
                    .unwrap_or_default(),
                symbol: row.symbol,
            })
            .collect())
    }

    async fn get_movers(&self, direction: MoverDirection) -> Result<Vec<MoverEntry>, ServiceError> {
        let endpoint = match direction {
            MoverDirection::Gainers => "/stock_market/gainers",
            MoverDirection::Losers => "/stock_market/losers",
            MoverDirection::Actives => "/stock_market/actives",
        };

        let rows: Vec<MoverRow> = self
            .fetch(endpoint, &[], Some(Duration::from_secs(LOOKUP_TIMEOUT_SECS)))
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| MoverEntry {
                name: row.name.unwrap_or_else(|| row.symbol.clone()),
                symbol: row.symbol,
                price: row.price.unwrap_or(0.0),
                change: row.change.unwrap_or(0.0),
                change_percent: row.changes_percentage.unwrap_or(0.0),
            })
            .collect())
    }

    async fn get_company_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>, ServiceError> {
        let rows: Vec<ProfileRow> = self
            .fetch(
                &format!("/profile/{}", symbol),
                &[],
                Some(Duration::from_secs(LOOKUP_TIMEOUT_SECS)),
            )
            .await?;

        Ok(rows.into_iter().next().map(|row| {
            let mut profile = CompanyProfile::from(row);
            if profile.symbol.is_empty() {
                profile.symbol = symbol.to_string();
            }
            if profile.company_name.is_empty() {
                profile.company_name = symbol.to_string();
            }
            profile
        }))
    }

    async fn get_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, ServiceError> {
        let rows: Vec<NewsRow> = self
            .fetch(
                "/stock_news",
                &[("tickers", symbol.to_string()), ("limit", limit.to_string())],
                Some(Duration::from_secs(LOOKUP_TIMEOUT_SECS)),
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(NewsArticle {
                    symbol: row.symbol.unwrap_or_else(|| symbol.to_string()),
                    title: row.title?,
                    url: row.url?,
                    site: row.site.unwrap_or_default(),
                    text: row.text.unwrap_or_default(),
                    image: row.image,
                    published_at: row.published_date.as_deref().and_then(parse_exchange_time),
                })
            })
            .collect())
    }
}
